//! WHERE clause construction
//!
//! Condition entities are walked left to right. A resolved column followed by
//! an operator and a value becomes one predicate; `IS NULL` / `IS NOT NULL`
//! close a predicate without a value. Predicates are joined with the most
//! recent connector (AND when none was given). Values are never inlined: each
//! one becomes a `?` placeholder bound as `p1`, `p2`, ...

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::entity::{EntityTag, EntityType, ATTR_CONNECTOR};
use crate::generator::resolver::ResolvedColumn;
use crate::operators::SqlOperator;

/// Ordered `name → value` parameter map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(String, Value)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the next positional value and return its name
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.0.len() + 1);
        self.0.push((name.clone(), value));
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Values in placeholder order
    pub fn values(&self) -> Vec<Value> {
        self.0.iter().map(|(_, v)| v.clone()).collect()
    }
}

impl Serialize for Parameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Typed parameter value of a literal entity. Malformed numbers and dates are
/// kept as opaque strings.
pub fn parameter_value(tag: &EntityTag) -> Value {
    let raw = tag.value().trim();
    match tag.entity_type {
        EntityType::Number => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::Number(i.into())
            } else if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(raw.to_string())
            }
        }
        EntityType::Boolean => match raw.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}

fn pattern_value(value: Value) -> Value {
    match value {
        Value::String(s) if !s.contains('%') => Value::String(format!("%{}%", s)),
        Value::String(s) => Value::String(s),
        other => Value::String(format!("%{}%", other)),
    }
}

/// Outcome of the WHERE walk
#[derive(Debug, Default)]
pub struct WhereClause {
    /// Rendered predicate list without the `WHERE` keyword, empty when none
    pub condition: String,
    /// Indexes (into the entity list) of COLUMN entities used by predicates
    pub consumed_columns: Vec<usize>,
    pub explanations: Vec<String>,
}

/// Build the WHERE predicates. `columns[i]` is the resolution of `entities[i]`
/// when that entity is a resolved COLUMN.
pub fn build_where(
    entities: &[EntityTag],
    columns: &[Option<ResolvedColumn>],
    qualify: bool,
    parameters: &mut Parameters,
) -> WhereClause {
    let mut clause = WhereClause::default();
    let mut predicates: Vec<(Option<String>, String)> = Vec::new();
    let mut pending_column: Option<(usize, &ResolvedColumn)> = None;
    let mut pending_operator: Option<SqlOperator> = None;
    let mut connector: Option<String> = None;

    for (i, tag) in entities.iter().enumerate() {
        match tag.entity_type {
            EntityType::Column => {
                if let Some(Some(resolved)) = columns.get(i) {
                    pending_column = Some((i, resolved));
                    pending_operator = None;
                }
            }
            EntityType::Operator => {
                let Some(op) = SqlOperator::from_phrase(tag.value()) else {
                    clause
                        .explanations
                        .push(format!("Unknown operator '{}' ignored", tag.text));
                    continue;
                };
                match (op.is_unary(), pending_column) {
                    (true, Some((index, column))) => {
                        let joiner = if predicates.is_empty() { None } else { connector.take() };
                        predicates.push((joiner, format!("{} {}", column.render(qualify), op.as_sql())));
                        clause.consumed_columns.push(index);
                        pending_column = None;
                        pending_operator = None;
                    }
                    _ => pending_operator = Some(op),
                }
            }
            EntityType::Condition => {
                if let Some(c) = tag.attribute(ATTR_CONNECTOR) {
                    connector = Some(c.to_uppercase());
                }
            }
            t if t.is_value() => {
                let (Some((index, column)), Some(op)) = (pending_column, pending_operator) else {
                    continue;
                };
                let mut value = parameter_value(tag);
                if op.is_pattern() {
                    value = pattern_value(value);
                }
                parameters.bind(value);
                let rhs = match op {
                    SqlOperator::In | SqlOperator::NotIn => "(?)",
                    _ => "?",
                };
                let joiner = if predicates.is_empty() { None } else { connector.take() };
                predicates.push((joiner, format!("{} {} {}", column.render(qualify), op.as_sql(), rhs)));
                clause.consumed_columns.push(index);
                pending_column = None;
                pending_operator = None;
            }
            _ => {}
        }
    }

    if let (Some((_, column)), Some(op)) = (pending_column, pending_operator) {
        clause.explanations.push(format!(
            "Condition on '{}' with operator {} has no value and was dropped",
            column.column,
            op.as_sql()
        ));
    }

    let mut rendered = String::new();
    for (joiner, predicate) in predicates {
        if !rendered.is_empty() {
            rendered.push(' ');
            rendered.push_str(joiner.as_deref().unwrap_or("AND"));
            rendered.push(' ');
        }
        rendered.push_str(&predicate);
    }
    clause.condition = rendered;
    clause
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntitySource;
    use serde_json::json;

    fn tag(text: &str, entity_type: EntityType, at: usize) -> EntityTag {
        EntityTag::new(text, entity_type, at, at + text.chars().count(), 0.85, EntitySource::Rule)
    }

    fn col(table: &str, column: &str) -> Option<ResolvedColumn> {
        Some(ResolvedColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    #[test]
    fn test_single_equality() {
        let entities = vec![
            tag("名字", EntityType::Column, 6),
            tag("为", EntityType::Operator, 8).with_value("="),
            tag("张三", EntityType::Value, 9),
        ];
        let columns = vec![col("users", "name"), None, None];
        let mut params = Parameters::new();
        let clause = build_where(&entities, &columns, false, &mut params);
        assert_eq!(clause.condition, "name = ?");
        assert_eq!(clause.consumed_columns, vec![0]);
        assert_eq!(params.get("p1"), Some(&json!("张三")));
    }

    #[test]
    fn test_connectors_and_typed_values() {
        let entities = vec![
            tag("金额", EntityType::Column, 0),
            tag("大于", EntityType::Operator, 2),
            tag("100", EntityType::Number, 4),
            tag("或者", EntityType::Condition, 7).with_attribute(ATTR_CONNECTOR, "OR"),
            tag("备注", EntityType::Column, 9),
            tag("包含", EntityType::Operator, 11),
            tag("加急", EntityType::String, 14),
            tag("邮箱", EntityType::Column, 17),
            tag("不为空", EntityType::Operator, 19),
        ];
        let columns = vec![
            col("orders", "amount"),
            None,
            None,
            None,
            col("orders", "remark"),
            None,
            None,
            col("orders", "email"),
            None,
        ];
        let mut params = Parameters::new();
        let clause = build_where(&entities, &columns, true, &mut params);
        assert_eq!(
            clause.condition,
            "orders.amount > ? OR orders.remark LIKE ? AND orders.email IS NOT NULL"
        );
        assert_eq!(params.values(), vec![json!(100), json!("%加急%")]);
        assert_eq!(clause.consumed_columns, vec![0, 4, 7]);
    }

    #[test]
    fn test_value_without_column_is_ignored() {
        let entities = vec![tag("最近7天", EntityType::Date, 0), tag("金额", EntityType::Column, 4)];
        let columns = vec![None, col("orders", "amount")];
        let mut params = Parameters::new();
        let clause = build_where(&entities, &columns, false, &mut params);
        assert!(clause.condition.is_empty());
        assert!(params.is_empty());
        assert!(clause.consumed_columns.is_empty());
    }

    #[test]
    fn test_dangling_operator_explained() {
        let entities = vec![tag("金额", EntityType::Column, 0), tag("大于", EntityType::Operator, 2)];
        let columns = vec![col("orders", "amount"), None];
        let mut params = Parameters::new();
        let clause = build_where(&entities, &columns, false, &mut params);
        assert!(clause.condition.is_empty());
        assert_eq!(clause.explanations.len(), 1);
    }

    #[test]
    fn test_parameter_values() {
        assert_eq!(parameter_value(&tag("42", EntityType::Number, 0)), json!(42));
        assert_eq!(parameter_value(&tag("3.5", EntityType::Number, 0)), json!(3.5));
        assert_eq!(parameter_value(&tag("1.2.3", EntityType::Number, 0)), json!("1.2.3"));
        assert_eq!(parameter_value(&tag("真", EntityType::Boolean, 0).with_value("true")), json!(true));
        assert_eq!(
            parameter_value(&tag("2024-1-5", EntityType::Date, 0).with_value("2024-01-05")),
            json!("2024-01-05")
        );
        assert_eq!(parameter_value(&tag("2024-13-45", EntityType::Date, 0)), json!("2024-13-45"));
    }

    #[test]
    fn test_parameters_serialize_in_order() {
        let mut params = Parameters::new();
        params.bind(json!("b"));
        params.bind(json!(1));
        assert_eq!(serde_json::to_string(&params).unwrap(), r#"{"p1":"b","p2":1}"#);
    }
}
