//! Syntax check of generated statements with `sqlparser`
//!
//! The check is advisory: a parse failure is reported, the statement is
//! returned unchanged.

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::warn;

/// `None` when `sql` parses as exactly one query, the problem otherwise
pub fn check_syntax(sql: &str) -> Option<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => match statements.as_slice() {
            [Statement::Query(_)] => None,
            [_] => Some("generated statement is not a query".to_string()),
            _ => Some(format!("expected one statement, parsed {}", statements.len())),
        },
        Err(e) => {
            warn!("Generated SQL failed to parse: {}", e);
            Some(e.to_string())
        }
    }
}
