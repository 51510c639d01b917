//! SQL Generator - deterministic, schema-bound SQL from entities + intent
//!
//! Steps:
//! 1. Partition entities by type
//! 2. Resolve tables (or infer them from the referenced columns)
//! 3. Resolve columns against the FROM tables
//! 4. Walk conditions into parameterized WHERE predicates
//! 5. Build SELECT / FROM / GROUP BY / ORDER BY / LIMIT
//! 6. Score, add alternatives, syntax-check
//!
//! Unresolved references never fail the call: they are explained and lower
//! the confidence. Only a question with no usable table yields an empty SQL.

pub mod joins;
pub mod predicates;
pub mod resolver;
pub mod syntax;

pub use joins::{ForeignKeyHints, JoinHint, JoinHintProvider};
pub use predicates::Parameters;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::confidence;
use crate::entity::{EntityTag, EntityType};
use crate::intent::{LimitType, QueryIntent, QueryType};
use crate::schema::{SchemaProvider, TableInfo};
use joins::join_chain;
use predicates::build_where;
use resolver::{
    infer_owner_table, resolve_column, resolve_column_term, resolve_table, suggest_column,
    suggest_table, ResolvedColumn,
};
use syntax::check_syntax;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Offer a non-aggregated variant of aggregate queries
    pub alternatives: bool,
    /// Offer a JOIN variant when join hints link the FROM tables
    pub join_alternatives: bool,
    pub syntax_check: bool,
    pub max_explanations: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            alternatives: true,
            join_alternatives: true,
            syntax_check: true,
            max_explanations: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlGenerationResult {
    pub sql: String,
    pub parameters: Parameters,
    pub confidence: f64,
    pub explanations: Vec<String>,
    pub alternative_sqls: Vec<String>,
}

impl SqlGenerationResult {
    /// Empty SQL with zero confidence
    pub fn failed(explanations: Vec<String>) -> Self {
        Self {
            sql: String::new(),
            parameters: Parameters::new(),
            confidence: 0.0,
            explanations,
            alternative_sqls: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.sql.is_empty()
    }
}

/// Clause strings of one statement
#[derive(Debug, Clone, Default)]
struct Clauses {
    select: String,
    from: String,
    condition: String,
    group_by: Option<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl Clauses {
    fn render(&self) -> String {
        let mut sql_parts = vec![format!("SELECT {}", self.select), format!("FROM {}", self.from)];
        if !self.condition.is_empty() {
            sql_parts.push(format!("WHERE {}", self.condition));
        }
        if let Some(group_by) = &self.group_by {
            sql_parts.push(format!("GROUP BY {}", group_by));
        }
        if !self.order_by.is_empty() {
            sql_parts.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql_parts.push(format!("LIMIT {}", limit));
        }
        sql_parts.join(" ")
    }
}

fn push_unique<'s>(tables: &mut Vec<&'s TableInfo>, table: &'s TableInfo) {
    if !tables.iter().any(|t| t.name == table.name) {
        tables.push(table);
    }
}

#[derive(Default)]
pub struct SqlGenerator {
    config: GeneratorConfig,
}

impl SqlGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Generate with join hints taken from the schema's foreign keys
    pub fn generate(
        &self,
        entities: &[EntityTag],
        intent: &QueryIntent,
        schema: &dyn SchemaProvider,
    ) -> SqlGenerationResult {
        let hints = ForeignKeyHints::new(schema);
        self.generate_with_hints(entities, intent, schema, Some(&hints))
    }

    pub fn generate_with_hints(
        &self,
        entities: &[EntityTag],
        intent: &QueryIntent,
        schema: &dyn SchemaProvider,
        hints: Option<&dyn JoinHintProvider>,
    ) -> SqlGenerationResult {
        info!(
            "🔧 Generating SQL for {:?} query from {} entities",
            intent.query_type,
            entities.len()
        );
        let mut explanations = Vec::new();
        // per-entity score; unresolved tables and columns drop to 0
        let mut scores: Vec<f64> = entities.iter().map(|e| e.confidence).collect();

        // Step 1: partition
        let table_idx: Vec<usize> = indexes_of(entities, EntityType::Table);
        let column_idx: Vec<usize> = indexes_of(entities, EntityType::Column);

        // Step 2: tables
        let mut tables: Vec<&TableInfo> = Vec::new();
        for &i in &table_idx {
            let tag = &entities[i];
            match resolve_table(schema, tag) {
                Some(table) => {
                    debug!("Resolved table '{}' → {}", tag.text, table.name);
                    push_unique(&mut tables, table);
                }
                None => {
                    warn!("Unresolved table reference '{}'", tag.text);
                    scores[i] = 0.0;
                    explanations.push(with_suggestion(
                        format!("Unresolved table reference '{}'", tag.text),
                        suggest_table(schema, &tag.text),
                    ));
                }
            }
        }
        if table_idx.is_empty() {
            for &i in &column_idx {
                if let Some(table) = infer_owner_table(schema, &entities[i]) {
                    push_unique(&mut tables, table);
                }
            }
            if !tables.is_empty() {
                explanations.push(format!(
                    "No table named in the question; using {} from the referenced columns",
                    tables.iter().map(|t| t.name.as_str()).join(", ")
                ));
            }
        }
        if tables.is_empty() {
            warn!("❌ No table could be resolved, no SQL generated");
            explanations.push("No table could be resolved; no SQL generated".to_string());
            return SqlGenerationResult::failed(self.capped(explanations));
        }
        let qualify = tables.len() > 1;

        // Step 3: columns
        let mut resolved: Vec<Option<ResolvedColumn>> = vec![None; entities.len()];
        for &i in &column_idx {
            let tag = &entities[i];
            match resolve_column(&tables, tag) {
                Some(column) => resolved[i] = Some(column),
                None => {
                    warn!("Unresolved column reference '{}'", tag.text);
                    scores[i] = 0.0;
                    explanations.push(with_suggestion(
                        format!("Unresolved column reference '{}'", tag.text),
                        suggest_column(&tables, &tag.text),
                    ));
                }
            }
        }
        let resolved_columns: Vec<String> = resolved
            .iter()
            .flatten()
            .map(|c| c.render(qualify))
            .unique()
            .collect();

        // Step 4: WHERE, before projection so that predicate columns are known
        let mut parameters = Parameters::new();
        let where_clause = build_where(entities, &resolved, qualify, &mut parameters);
        explanations.extend(where_clause.explanations);

        let projected: Vec<String> = column_idx
            .iter()
            .filter(|&&i| !where_clause.consumed_columns.contains(&i))
            .filter_map(|&i| resolved[i].as_ref())
            .map(|c| c.render(qualify))
            .unique()
            .collect();

        // Step 5: SELECT
        let aggregate = intent.query_type.aggregate_function().map(|function| {
            let argument = match projected.first() {
                Some(column) => column.clone(),
                None if function == "COUNT" => "*".to_string(),
                None => {
                    explanations.push(format!("No column to apply {} to", function));
                    "0".to_string()
                }
            };
            format!("{}({})", function, argument)
        });
        let select = match &aggregate {
            Some(expr) => expr.clone(),
            None if projected.is_empty() => "*".to_string(),
            None => projected.join(", "),
        };

        // Step 6: FROM, no join inference
        let table_names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
        let from = table_names.join(", ");

        // Step 7: GROUP BY
        let group_by = if intent.query_type == QueryType::Group && resolved_columns.len() > 1 {
            resolved_columns.first().cloned()
        } else {
            None
        };

        // Step 8: ORDER BY
        let mut sorts = intent.sort_requirements.clone();
        sorts.sort_by_key(|s| s.priority);
        let mut order_by: Vec<String> = Vec::new();
        for sort in &sorts {
            let direction = sort.direction.as_sql();
            let item = if sort.field.trim().is_empty() {
                match &aggregate {
                    Some(expr) => format!("{} {}", expr, direction),
                    None => {
                        explanations.push(format!("Sort direction {} given without a field; ignored", direction));
                        continue;
                    }
                }
            } else {
                match resolve_column_term(&tables, &sort.field) {
                    Some(column) => format!("{} {}", column.render(qualify), direction),
                    None => {
                        explanations.push(with_suggestion(
                            format!("Unresolved sort field '{}'", sort.field),
                            suggest_column(&tables, &sort.field),
                        ));
                        continue;
                    }
                }
            };
            if !order_by.contains(&item) {
                order_by.push(item);
            }
        }

        // Step 9: LIMIT
        let limit_requirement = &intent.limit_requirement;
        let limit = match limit_requirement.limit_type {
            LimitType::TopN => {
                if limit_requirement.limit_value == 0 {
                    explanations.push("Row limit of 0 requested; the query returns no rows".to_string());
                }
                Some(limit_requirement.limit_value)
            }
            LimitType::Pagination => {
                explanations.push(format!(
                    "Pagination recognized (page size {}, offset {}) but not applied",
                    limit_requirement.limit_value, limit_requirement.offset
                ));
                None
            }
            _ => None,
        };

        if let Some(range) = &intent.time_range {
            explanations.push(format!(
                "Time range {:?} {} {:?} recognized; no time filter emitted",
                range.time_type,
                range.time_value,
                range.time_unit
            ));
        }

        let clauses = Clauses {
            select,
            from,
            condition: where_clause.condition,
            group_by,
            order_by,
            limit,
        };
        let sql = clauses.render();
        info!("✅ Generated SQL: {}", sql);

        // Step 10: confidence
        let entity_average = confidence::mean(scores.iter().copied());
        let confidence = confidence::combine(entity_average, intent.confidence);

        // Step 11: alternatives
        let mut alternative_sqls = Vec::new();
        if self.config.alternatives && aggregate.is_some() {
            let plain = Clauses {
                select: if projected.is_empty() { "*".to_string() } else { projected.join(", ") },
                group_by: None,
                order_by: Vec::new(),
                ..clauses.clone()
            };
            alternative_sqls.push(plain.render());
        }
        if self.config.join_alternatives && table_names.len() > 1 {
            if let Some(chain) = hints.and_then(|h| join_chain(&table_names, h)) {
                let joined = Clauses {
                    from: chain,
                    ..clauses.clone()
                };
                alternative_sqls.push(joined.render());
            }
        }
        alternative_sqls.retain(|alt| alt != &sql);

        // Step 12: syntax check
        if self.config.syntax_check {
            if let Some(problem) = check_syntax(&sql) {
                explanations.push(format!("Syntax check failed: {}", problem));
            }
        }

        SqlGenerationResult {
            sql,
            parameters,
            confidence,
            explanations: self.capped(explanations),
            alternative_sqls,
        }
    }

    fn capped(&self, mut explanations: Vec<String>) -> Vec<String> {
        explanations.truncate(self.config.max_explanations);
        explanations
    }
}

fn indexes_of(entities: &[EntityTag], entity_type: EntityType) -> Vec<usize> {
    entities
        .iter()
        .enumerate()
        .filter(|(_, e)| e.entity_type == entity_type)
        .map(|(i, _)| i)
        .collect()
}

fn with_suggestion(message: String, suggestion: Option<String>) -> String {
    match suggestion {
        Some(name) => format!("{}, did you mean '{}'?", message, name),
        None => message,
    }
}

/// Generate with the default configuration
pub fn generate_sql(
    entities: &[EntityTag],
    intent: &QueryIntent,
    schema: &dyn SchemaProvider,
) -> SqlGenerationResult {
    SqlGenerator::default().generate(entities, intent, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntitySource, ATTR_CONNECTOR, ATTR_TABLE};
    use crate::intent::{LimitRequirement, QueryPurpose, SortDirection, SortRequirement};
    use crate::schema::{ColumnInfo, SchemaInfo, TableInfo};
    use serde_json::json;

    fn shop() -> SchemaInfo {
        SchemaInfo::new(
            "shop",
            vec![
                TableInfo::new("orders")
                    .with_comment("订单")
                    .with_column(ColumnInfo::new("id", "bigint").primary())
                    .with_column(ColumnInfo::new("amount", "decimal").with_comment("金额"))
                    .with_column(ColumnInfo::new("region", "varchar").with_comment("地区"))
                    .with_column(ColumnInfo::new("user_id", "bigint"))
                    .with_foreign_key("user_id", "users", "id"),
                TableInfo::new("users")
                    .with_comment("用户")
                    .with_column(ColumnInfo::new("id", "bigint").primary())
                    .with_column(ColumnInfo::new("name", "varchar").with_comment("名字")),
            ],
        )
    }

    fn intent(query_type: QueryType) -> QueryIntent {
        QueryIntent {
            query_type,
            query_purpose: QueryPurpose::DataRetrieval,
            time_range: None,
            sort_requirements: Vec::new(),
            limit_requirement: LimitRequirement::none(),
            confidence: 0.8,
        }
    }

    fn meta_table(text: &str, name: &str, at: usize) -> EntityTag {
        EntityTag::new(text, EntityType::Table, at, at + text.chars().count(), 0.9, EntitySource::Metadata)
            .with_value(name)
    }

    fn meta_column(text: &str, table: &str, name: &str, at: usize) -> EntityTag {
        EntityTag::new(text, EntityType::Column, at, at + text.chars().count(), 0.9, EntitySource::Metadata)
            .with_value(name)
            .with_attribute(ATTR_TABLE, table)
    }

    fn rule(text: &str, entity_type: EntityType, at: usize, confidence: f64) -> EntityTag {
        EntityTag::new(text, entity_type, at, at + text.chars().count(), confidence, EntitySource::Rule)
    }

    #[test]
    fn test_count_star() {
        let schema = shop();
        let entities = vec![meta_table("订单", "orders", 2), rule("数量", EntityType::Function, 4, 0.85)];
        let result = generate_sql(&entities, &intent(QueryType::Count), &schema);
        assert_eq!(result.sql, "SELECT COUNT(*) FROM orders");
        assert!((result.confidence - 0.8375).abs() < 1e-9);
        assert!(result.parameters.is_empty());
        assert_eq!(result.alternative_sqls, vec!["SELECT * FROM orders".to_string()]);
    }

    #[test]
    fn test_where_consumes_column() {
        let schema = shop();
        let entities = vec![
            meta_table("用户", "users", 2),
            meta_column("名字", "users", "name", 6),
            rule("为", EntityType::Operator, 8, 0.85).with_value("="),
            rule("张三", EntityType::Value, 9, 0.85),
        ];
        let result = generate_sql(&entities, &intent(QueryType::Select), &schema);
        assert_eq!(result.sql, "SELECT * FROM users WHERE name = ?");
        assert_eq!(result.parameters.get("p1"), Some(&json!("张三")));
        assert!(result.alternative_sqls.is_empty());
        assert!(result.explanations.is_empty(), "{:?}", result.explanations);
    }

    #[test]
    fn test_hard_stop() {
        let schema = shop();
        let entities = vec![rule("飞船", EntityType::Table, 2, 0.8)];
        let result = generate_sql(&entities, &intent(QueryType::Select), &schema);
        assert_eq!(result.sql, "");
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_success());
        assert!(result.explanations.iter().any(|e| e.contains("飞船")));
    }

    #[test]
    fn test_tables_inferred_from_columns() {
        let schema = shop();
        let mut query = intent(QueryType::Select);
        query.sort_requirements = vec![SortRequirement {
            field: "金额".to_string(),
            direction: SortDirection::Desc,
            priority: 0,
        }];
        query.limit_requirement = LimitRequirement::top_n(10);
        let entities = vec![
            meta_column("金额", "orders", "amount", 1),
            rule("降序", EntityType::Order, 3, 0.8).with_value("DESC"),
            rule("10", EntityType::Number, 8, 0.9),
        ];
        let result = generate_sql(&entities, &query, &schema);
        assert_eq!(result.sql, "SELECT amount FROM orders ORDER BY amount DESC LIMIT 10");
        assert!(result.explanations[0].contains("orders"));
    }

    #[test]
    fn test_unresolved_column_lowers_confidence() {
        let schema = shop();
        let entities = vec![meta_table("订单", "orders", 0), rule("颜色", EntityType::Column, 2, 0.8)];
        let result = generate_sql(&entities, &intent(QueryType::Select), &schema);
        assert_eq!(result.sql, "SELECT * FROM orders");
        // mean(mean(0.9, 0.0), 0.8)
        assert!((result.confidence - 0.625).abs() < 1e-9);
        assert!(result.explanations.iter().any(|e| e.contains("颜色")));
    }

    #[test]
    fn test_group_by_first_column() {
        let schema = shop();
        let entities = vec![
            meta_table("订单", "orders", 0),
            meta_column("地区", "orders", "region", 3),
            meta_column("金额", "orders", "amount", 6),
        ];
        let result = generate_sql(&entities, &intent(QueryType::Group), &schema);
        assert_eq!(result.sql, "SELECT region, amount FROM orders GROUP BY region");
    }

    #[test]
    fn test_direction_only_sort_uses_aggregate() {
        let schema = shop();
        let mut query = intent(QueryType::Count);
        query.sort_requirements = vec![SortRequirement {
            field: String::new(),
            direction: SortDirection::Desc,
            priority: 0,
        }];
        let entities = vec![meta_table("订单", "orders", 0)];
        let result = generate_sql(&entities, &query, &schema);
        assert_eq!(result.sql, "SELECT COUNT(*) FROM orders ORDER BY COUNT(*) DESC");
    }

    #[test]
    fn test_zero_top_n_kept_verbatim() {
        let schema = shop();
        let mut query = intent(QueryType::Select);
        query.limit_requirement = LimitRequirement::top_n(0);
        let result = generate_sql(&[meta_table("订单", "orders", 2)], &query, &schema);
        assert_eq!(result.sql, "SELECT * FROM orders LIMIT 0");
        assert!(result.explanations.iter().any(|e| e.contains("limit of 0")));
    }

    #[test]
    fn test_pagination_not_emitted() {
        let schema = shop();
        let mut query = intent(QueryType::Select);
        query.limit_requirement = LimitRequirement::page(3, 10);
        let result = generate_sql(&[meta_table("订单", "orders", 0)], &query, &schema);
        assert_eq!(result.sql, "SELECT * FROM orders");
        assert!(result.explanations.iter().any(|e| e.contains("offset 20")));
    }

    #[test]
    fn test_multi_table_join_alternative() {
        let schema = shop();
        let entities = vec![
            meta_table("用户", "users", 0),
            meta_table("订单", "orders", 3),
            meta_column("名字", "users", "name", 6),
            rule("并且", EntityType::Condition, 8, 0.8).with_attribute(ATTR_CONNECTOR, "AND"),
            meta_column("金额", "orders", "amount", 10),
            rule("大于", EntityType::Operator, 12, 0.85).with_value(">"),
            rule("100", EntityType::Number, 14, 0.9),
        ];
        let result = generate_sql(&entities, &intent(QueryType::Select), &schema);
        assert_eq!(result.sql, "SELECT users.name FROM users, orders WHERE orders.amount > ?");
        assert_eq!(result.parameters.get("p1"), Some(&json!(100)));
        assert_eq!(
            result.alternative_sqls,
            vec!["SELECT users.name FROM users JOIN orders ON users.id = orders.user_id WHERE orders.amount > ?"
                .to_string()]
        );
    }

    #[test]
    fn test_deterministic() {
        let schema = shop();
        let entities = vec![meta_table("订单", "orders", 0), meta_column("金额", "orders", "amount", 2)];
        let a = generate_sql(&entities, &intent(QueryType::Sum), &schema);
        let b = generate_sql(&entities, &intent(QueryType::Sum), &schema);
        assert_eq!(a, b);
        assert_eq!(a.sql, "SELECT SUM(amount) FROM orders");
    }
}
