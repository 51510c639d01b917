//! Join hints for multi-table questions
//!
//! The generator never infers joins for the primary statement; hints only
//! feed an alternative SQL that a caller may offer instead of the cross join.

use crate::schema::SchemaProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinHint {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

impl JoinHint {
    pub fn on_clause(&self) -> String {
        format!(
            "{}.{} = {}.{}",
            self.left_table, self.left_column, self.right_table, self.right_column
        )
    }
}

/// Source of join conditions between two tables
pub trait JoinHintProvider {
    fn join_hint(&self, left: &str, right: &str) -> Option<JoinHint>;
}

/// Join hints read from declared foreign keys, in either direction
pub struct ForeignKeyHints<'a> {
    schema: &'a dyn SchemaProvider,
}

impl<'a> ForeignKeyHints<'a> {
    pub fn new(schema: &'a dyn SchemaProvider) -> Self {
        Self { schema }
    }
}

impl JoinHintProvider for ForeignKeyHints<'_> {
    fn join_hint(&self, left: &str, right: &str) -> Option<JoinHint> {
        let forward = self
            .schema
            .foreign_keys(left)
            .iter()
            .find(|fk| fk.referenced_table.eq_ignore_ascii_case(right))
            .map(|fk| JoinHint {
                left_table: left.to_string(),
                left_column: fk.column.clone(),
                right_table: right.to_string(),
                right_column: fk.referenced_column.clone(),
            });
        forward.or_else(|| {
            self.schema
                .foreign_keys(right)
                .iter()
                .find(|fk| fk.referenced_table.eq_ignore_ascii_case(left))
                .map(|fk| JoinHint {
                    left_table: left.to_string(),
                    left_column: fk.referenced_column.clone(),
                    right_table: right.to_string(),
                    right_column: fk.column.clone(),
                })
        })
    }
}

/// `a JOIN b ON ... JOIN c ON ...` when every table after the first links to
/// some table before it; `None` otherwise
pub fn join_chain(tables: &[String], hints: &dyn JoinHintProvider) -> Option<String> {
    let (first, rest) = tables.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut from = first.clone();
    for (i, table) in rest.iter().enumerate() {
        let hint = tables[..=i].iter().find_map(|joined| hints.join_hint(joined, table))?;
        from.push_str(&format!(" JOIN {} ON {}", table, hint.on_clause()));
    }
    Some(from)
}
