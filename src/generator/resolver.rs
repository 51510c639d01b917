//! Schema resolution for table and column references
//!
//! Resolution ladder, first hit wins:
//! 1. exact case-insensitive physical name
//! 2. exact comment / alias
//! 3. substring containment in either direction (name, then comment / alias)

use strsim::jaro_winkler;

use crate::entity::{EntityTag, ATTR_TABLE};
use crate::schema::{ColumnInfo, SchemaProvider, TableInfo};

/// Minimum similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub table: String,
    pub column: String,
}

impl ResolvedColumn {
    /// `column` for single-table queries, `table.column` otherwise
    pub fn render(&self, qualify: bool) -> String {
        if qualify {
            format!("{}.{}", self.table, self.column)
        } else {
            self.column.clone()
        }
    }
}

fn eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn contains_either(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

fn table_exact<'s>(schema: &'s dyn SchemaProvider, term: &str) -> Option<&'s TableInfo> {
    let tables = schema.tables();
    tables
        .iter()
        .find(|t| eq(&t.name, term))
        .or_else(|| tables.iter().find(|t| t.business_names().any(|n| eq(n, term))))
}

fn table_fuzzy<'s>(schema: &'s dyn SchemaProvider, term: &str) -> Option<&'s TableInfo> {
    let tables = schema.tables();
    tables
        .iter()
        .find(|t| contains_either(&t.name, term))
        .or_else(|| tables.iter().find(|t| t.business_names().any(|n| contains_either(n, term))))
}

/// Resolve a TABLE entity. The physical name carried by metadata entities is
/// tried before the surface text.
pub fn resolve_table<'s>(schema: &'s dyn SchemaProvider, tag: &EntityTag) -> Option<&'s TableInfo> {
    let terms = candidate_terms(tag);
    terms
        .iter()
        .find_map(|term| table_exact(schema, term))
        .or_else(|| terms.iter().find_map(|term| table_fuzzy(schema, term)))
}

fn candidate_terms(tag: &EntityTag) -> Vec<&str> {
    let mut terms = vec![tag.value()];
    if tag.text != tag.value() {
        terms.push(tag.text.as_str());
    }
    terms
}

fn column_exact<'t>(table: &'t TableInfo, term: &str) -> Option<&'t ColumnInfo> {
    table
        .columns
        .iter()
        .find(|c| eq(&c.name, term))
        .or_else(|| table.columns.iter().find(|c| c.business_names().any(|n| eq(n, term))))
}

fn column_fuzzy<'t>(table: &'t TableInfo, term: &str) -> Option<&'t ColumnInfo> {
    table
        .columns
        .iter()
        .find(|c| contains_either(&c.name, term))
        .or_else(|| table.columns.iter().find(|c| c.business_names().any(|n| contains_either(n, term))))
}

/// Resolve a column reference against the tables already in the FROM list.
///
/// `orders.amount` is validated as written; a bare term is searched across
/// the tables, exact matches over all tables before any fuzzy match.
pub fn resolve_column_term(tables: &[&TableInfo], term: &str) -> Option<ResolvedColumn> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }

    if let Some((table_part, column_part)) = term.split_once('.') {
        return tables
            .iter()
            .find(|t| eq(&t.name, table_part))
            .and_then(|t| t.get_column(column_part).map(|c| (t, c)))
            .map(|(t, c)| ResolvedColumn {
                table: t.name.clone(),
                column: c.name.clone(),
            });
    }

    let found = tables
        .iter()
        .find_map(|t| column_exact(t, term).map(|c| (t, c)))
        .or_else(|| tables.iter().find_map(|t| column_fuzzy(t, term).map(|c| (t, c))));
    found.map(|(t, c)| ResolvedColumn {
        table: t.name.clone(),
        column: c.name.clone(),
    })
}

/// Resolve a COLUMN entity against the FROM tables. A metadata entity's own
/// table attribute is honoured when that table is in the FROM list.
pub fn resolve_column(tables: &[&TableInfo], tag: &EntityTag) -> Option<ResolvedColumn> {
    if let Some(owner) = tag.attribute(ATTR_TABLE) {
        if let Some(table) = tables.iter().find(|t| eq(&t.name, owner)) {
            if let Some(column) = table.get_column(tag.value()) {
                return Some(ResolvedColumn {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }
        }
    }
    candidate_terms(tag)
        .iter()
        .find_map(|term| resolve_column_term(tables, term))
}

/// Owning table of a COLUMN entity searched across the whole schema; used to
/// infer the FROM list when the question names no table.
pub fn infer_owner_table<'s>(schema: &'s dyn SchemaProvider, tag: &EntityTag) -> Option<&'s TableInfo> {
    if let Some(table) = tag.attribute(ATTR_TABLE).and_then(|owner| table_exact(schema, owner)) {
        return Some(table);
    }
    let all: Vec<&TableInfo> = schema.tables().iter().collect();
    let resolved = resolve_column(&all, tag)?;
    schema.tables().iter().find(|t| t.name == resolved.table)
}

/// Closest table name or business name for an unresolved reference
pub fn suggest_table(schema: &dyn SchemaProvider, term: &str) -> Option<String> {
    let term = term.trim().to_lowercase();
    let mut best: Option<(f64, &str)> = None;
    for table in schema.tables() {
        let names = std::iter::once(table.name.as_str()).chain(table.business_names());
        for name in names {
            let score = jaro_winkler(&term, &name.to_lowercase());
            if score >= SUGGESTION_THRESHOLD && best.map(|(s, _)| score > s).unwrap_or(true) {
                best = Some((score, table.name.as_str()));
            }
        }
    }
    best.map(|(_, name)| name.to_string())
}

/// Closest column among the FROM tables for an unresolved reference
pub fn suggest_column(tables: &[&TableInfo], term: &str) -> Option<String> {
    let term = term.trim().to_lowercase();
    let mut best: Option<(f64, String)> = None;
    for table in tables {
        for column in &table.columns {
            let names = std::iter::once(column.name.as_str()).chain(column.business_names());
            for name in names {
                let score = jaro_winkler(&term, &name.to_lowercase());
                if score >= SUGGESTION_THRESHOLD && best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                    best = Some((score, format!("{}.{}", table.name, column.name)));
                }
            }
        }
    }
    best.map(|(_, name)| name)
}
