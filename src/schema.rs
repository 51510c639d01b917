//! Schema snapshot consumed by the entity extractor and the SQL generator.
//!
//! The snapshot is produced elsewhere (metadata sync) and handed in read-only.
//! Tables and columns carry the database comment and optional business aliases
//! ("订单" for `orders`); both take part in name matching.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NlSqlError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    #[serde(default)]
    pub data_source_id: String,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKeyInfo {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Business names this table answers to: comment first, then aliases
    pub fn business_names(&self) -> impl Iterator<Item = &str> {
        self.comment
            .iter()
            .map(|s| s.as_str())
            .chain(self.aliases.iter().map(|s| s.as_str()))
            .filter(|s| !s.trim().is_empty())
    }
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn business_names(&self) -> impl Iterator<Item = &str> {
        self.comment
            .iter()
            .map(|s| s.as_str())
            .chain(self.aliases.iter().map(|s| s.as_str()))
            .filter(|s| !s.trim().is_empty())
    }
}

impl SchemaInfo {
    pub fn new(data_source_id: impl Into<String>, tables: Vec<TableInfo>) -> Self {
        Self {
            data_source_id: data_source_id.into(),
            tables,
        }
    }

    /// Load a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let schema: SchemaInfo = serde_json::from_str(&content)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Table and column names must be non-empty and unique per scope
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for table in &self.tables {
            if table.name.trim().is_empty() {
                return Err(NlSqlError::Schema("table with empty name".to_string()));
            }
            if !seen.insert(table.name.to_lowercase()) {
                return Err(NlSqlError::Schema(format!("duplicate table: {}", table.name)));
            }
            let mut columns = std::collections::HashSet::new();
            for column in &table.columns {
                if column.name.trim().is_empty() {
                    return Err(NlSqlError::Schema(format!(
                        "column with empty name in table {}",
                        table.name
                    )));
                }
                if !columns.insert(column.name.to_lowercase()) {
                    return Err(NlSqlError::Schema(format!(
                        "duplicate column {}.{}",
                        table.name, column.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Read-only schema lookup used by extraction and generation
pub trait SchemaProvider {
    fn tables(&self) -> &[TableInfo];

    fn columns(&self, table: &str) -> &[ColumnInfo] {
        self.tables()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .map(|t| t.columns.as_slice())
            .unwrap_or(&[])
    }

    fn foreign_keys(&self, table: &str) -> &[ForeignKeyInfo] {
        self.tables()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(table))
            .map(|t| t.foreign_keys.as_slice())
            .unwrap_or(&[])
    }
}

impl SchemaProvider for SchemaInfo {
    fn tables(&self) -> &[TableInfo] {
        &self.tables
    }
}
