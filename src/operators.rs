//! Comparison operators and aggregate functions as they appear in questions.
//!
//! The phrase tables are shared by the rule extractor (which tags the phrases)
//! and the SQL generator (which maps them back to SQL).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlOperator {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl SqlOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlOperator::Eq => "=",
            SqlOperator::NotEq => "!=",
            SqlOperator::Gt => ">",
            SqlOperator::Lt => "<",
            SqlOperator::GtEq => ">=",
            SqlOperator::LtEq => "<=",
            SqlOperator::Like => "LIKE",
            SqlOperator::NotLike => "NOT LIKE",
            SqlOperator::In => "IN",
            SqlOperator::NotIn => "NOT IN",
            SqlOperator::IsNull => "IS NULL",
            SqlOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// `IS NULL` / `IS NOT NULL` take no right-hand side
    pub fn is_unary(&self) -> bool {
        matches!(self, SqlOperator::IsNull | SqlOperator::IsNotNull)
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, SqlOperator::Like | SqlOperator::NotLike)
    }

    /// Look up an operator phrase (Chinese, English or symbolic)
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        let phrase = phrase.trim().to_lowercase();
        let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        OPERATOR_PHRASES
            .iter()
            .find(|(p, _)| *p == phrase)
            .map(|(_, op)| *op)
    }
}

/// Operator phrases, longest first so an alternation built from them prefers
/// "大于等于" over "大于" and "不为空" over "为空".
pub const OPERATOR_PHRASES: &[(&str, SqlOperator)] = &[
    ("is not null", SqlOperator::IsNotNull),
    ("not like", SqlOperator::NotLike),
    ("大于等于", SqlOperator::GtEq),
    ("小于等于", SqlOperator::LtEq),
    ("不少于", SqlOperator::GtEq),
    ("不多于", SqlOperator::LtEq),
    ("is null", SqlOperator::IsNull),
    ("not in", SqlOperator::NotIn),
    ("不等于", SqlOperator::NotEq),
    ("不包含", SqlOperator::NotLike),
    ("不为空", SqlOperator::IsNotNull),
    ("等于", SqlOperator::Eq),
    ("不是", SqlOperator::NotEq),
    ("大于", SqlOperator::Gt),
    ("高于", SqlOperator::Gt),
    ("超过", SqlOperator::Gt),
    ("小于", SqlOperator::Lt),
    ("低于", SqlOperator::Lt),
    ("包含", SqlOperator::Like),
    ("不在", SqlOperator::NotIn),
    ("为空", SqlOperator::IsNull),
    ("like", SqlOperator::Like),
    (">=", SqlOperator::GtEq),
    ("<=", SqlOperator::LtEq),
    ("!=", SqlOperator::NotEq),
    ("<>", SqlOperator::NotEq),
    ("是", SqlOperator::Eq),
    ("为", SqlOperator::Eq),
    ("在", SqlOperator::In),
    ("in", SqlOperator::In),
    ("=", SqlOperator::Eq),
    (">", SqlOperator::Gt),
    ("<", SqlOperator::Lt),
];

/// Aggregate function words mapped to the SQL function name
pub const FUNCTION_PHRASES: &[(&str, &str)] = &[
    ("平均值", "AVG"),
    ("最大值", "MAX"),
    ("最小值", "MIN"),
    ("average", "AVG"),
    ("总和", "SUM"),
    ("总额", "SUM"),
    ("合计", "SUM"),
    ("求和", "SUM"),
    ("平均", "AVG"),
    ("最大", "MAX"),
    ("最高", "MAX"),
    ("最小", "MIN"),
    ("最低", "MIN"),
    ("计数", "COUNT"),
    ("数量", "COUNT"),
    ("个数", "COUNT"),
    ("总数", "COUNT"),
    ("count", "COUNT"),
    ("sum", "SUM"),
    ("avg", "AVG"),
    ("max", "MAX"),
    ("min", "MIN"),
];

pub fn function_for_phrase(phrase: &str) -> Option<&'static str> {
    let phrase = phrase.trim().to_lowercase();
    FUNCTION_PHRASES
        .iter()
        .find(|(p, _)| *p == phrase)
        .map(|(_, f)| *f)
}
