//! nl2sql - compiles Chinese / English questions into parameterized SQL
//!
//! Stages, leaf first: `normalizer`, `tokenizer`, `intent`, `entity`,
//! `generator`. `pipeline` wires them together behind one call.

pub mod confidence;
pub mod config;
pub mod entity;
pub mod error;
pub mod generator;
pub mod intent;
pub mod normalizer;
pub mod numerals;
pub mod operators;
pub mod pipeline;
pub mod schema;
pub mod tokenizer;

pub use config::PipelineConfig;
pub use entity::{extract_entities, EntitySource, EntityTag, EntityType};
pub use error::{NlSqlError, Result};
pub use generator::{generate_sql, JoinHintProvider, Parameters, SqlGenerationResult, SqlGenerator};
pub use intent::recognizer::recognize_intent;
pub use intent::{QueryIntent, QueryPurpose, QueryType};
pub use normalizer::{normalize, Language, NormalizedText, NormalizerProfile};
pub use pipeline::{Pipeline, PipelineTrace};
pub use schema::{ColumnInfo, ForeignKeyInfo, SchemaInfo, SchemaProvider, TableInfo};
pub use tokenizer::{tokenize, Token, TokenKind, TokenizerLanguage};
