//! End-to-end pipeline: normalize → tokenize → intent → entities → SQL
//!
//! Stages are built once from a `PipelineConfig` and reused for every
//! question. `run` never fails; internal errors surface as a zero-confidence
//! result.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::entity::{EntityRules, EntityTag, HybridExtractor, MetadataExtractor, RuleBasedExtractor, DEFAULT_ENTITY_RULES};
use crate::error::Result;
use crate::generator::{SqlGenerationResult, SqlGenerator};
use crate::intent::patterns::{IntentPatterns, DEFAULT_INTENT_PATTERNS};
use crate::intent::recognizer::IntentRecognizer;
use crate::intent::QueryIntent;
use crate::normalizer::{NormalizedText, Normalizer};
use crate::schema::SchemaProvider;
use crate::tokenizer::{Token, Tokenizer};

/// Output of every stage for one question
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    pub normalized: NormalizedText,
    pub tokens: Vec<Token>,
    pub intent: QueryIntent,
    pub entities: Vec<EntityTag>,
    pub result: SqlGenerationResult,
}

pub struct Pipeline {
    normalizer: Normalizer,
    tokenizer: Tokenizer,
    recognizer: IntentRecognizer,
    extractor: HybridExtractor,
    generator: SqlGenerator,
}

impl Pipeline {
    /// Compile the configured pattern sets. The built-in sets are shared
    /// when the config leaves them untouched.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let patterns = if config.intent == Default::default() {
            Arc::clone(&DEFAULT_INTENT_PATTERNS)
        } else {
            Arc::new(IntentPatterns::compile(&config.intent)?)
        };
        let rules = if config.entity == Default::default() {
            Arc::clone(&DEFAULT_ENTITY_RULES)
        } else {
            Arc::new(EntityRules::compile(&config.entity)?)
        };

        Ok(Self {
            normalizer: Normalizer::new(config.normalizer),
            tokenizer: Tokenizer::new(config.tokenizer),
            recognizer: IntentRecognizer::new(patterns),
            extractor: HybridExtractor::new(
                Box::new(MetadataExtractor::default()),
                Box::new(RuleBasedExtractor::new(rules)),
            ),
            generator: SqlGenerator::new(config.generator),
        })
    }

    /// Run every stage and keep the intermediate outputs
    pub fn trace(&self, question: &str, schema: &dyn SchemaProvider) -> Result<PipelineTrace> {
        info!("🔍 Compiling question: {}", question);
        let normalized = self.normalizer.normalize(question);
        let tokens = self.tokenizer.tokenize(&normalized);
        let intent = self.recognizer.recognize(&normalized, &tokens);
        let entities = self.extractor.extract(&normalized, &tokens, Some(schema))?;
        let result = self.generator.generate(&entities, &intent, schema);
        Ok(PipelineTrace {
            normalized,
            tokens,
            intent,
            entities,
            result,
        })
    }

    pub fn run(&self, question: &str, schema: &dyn SchemaProvider) -> SqlGenerationResult {
        match self.trace(question, schema) {
            Ok(trace) => trace.result,
            Err(e) => {
                warn!("❌ Pipeline failed: {}", e);
                SqlGenerationResult::failed(vec![e.to_string()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NlSqlError;
    use crate::intent::QueryType;
    use crate::schema::{ColumnInfo, SchemaInfo, TableInfo};

    fn orders() -> SchemaInfo {
        SchemaInfo::new(
            "shop",
            vec![TableInfo::new("orders")
                .with_comment("订单")
                .with_column(ColumnInfo::new("id", "bigint").primary())
                .with_column(ColumnInfo::new("amount", "decimal").with_comment("金额"))
                .with_column(ColumnInfo::new("created_at", "datetime").with_comment("创建时间"))],
        )
    }

    #[test]
    fn test_trace_keeps_stages() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let trace = pipeline.trace("统计订单数量", &orders()).unwrap();
        assert_eq!(trace.normalized.normalized, "统计订单数量");
        assert!(!trace.tokens.is_empty());
        assert_eq!(trace.intent.query_type, QueryType::Count);
        assert!(trace.entities.iter().any(|e| e.value() == "orders"));
        assert_eq!(trace.result.sql, "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_empty_question() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let result = pipeline.run("   ", &orders());
        assert_eq!(result.sql, "");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut config = PipelineConfig::default();
        config.intent.avg = vec!["(".to_string()];
        assert!(matches!(Pipeline::new(config), Err(NlSqlError::Pattern(_))));
    }
}
