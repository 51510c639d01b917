//! Entity extraction - tags spans of the normalized question
//!
//! Two strategies run side by side:
//! - `RuleBasedExtractor`: regex batteries per entity type (literals, markers,
//!   "X表" / "X字段" reference forms)
//! - `MetadataExtractor`: table and column names, comments and aliases looked
//!   up in the schema snapshot
//!
//! Their outputs are combined by the pure `merge` function so that the final
//! list never contains two entities sharing a character.

pub mod hybrid;
pub mod merge;
pub mod metadata;
pub mod rules;

pub use hybrid::{extract_entities, HybridExtractor};
pub use merge::merge;
pub use metadata::MetadataExtractor;
pub use rules::{EntityRuleConfig, EntityRules, RuleBasedExtractor, RuleConfidences, DEFAULT_ENTITY_RULES};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{NlSqlError, Result};
use crate::normalizer::NormalizedText;
use crate::schema::SchemaProvider;
use crate::tokenizer::Token;

/// Attribute holding the owning table of a COLUMN entity
pub const ATTR_TABLE: &str = "table";
/// Attribute holding `AND` / `OR` on CONDITION entities
pub const ATTR_CONNECTOR: &str = "connector";
/// Attribute recording what a metadata entity matched on (`name`, `comment`, `alias`)
pub const ATTR_MATCHED_ON: &str = "matched_on";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Table,
    Column,
    Value,
    Number,
    String,
    Date,
    Boolean,
    Function,
    Operator,
    Condition,
    Order,
    Group,
    Limit,
    Other,
}

impl EntityType {
    /// Entity types that can sit on the right-hand side of a predicate
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            EntityType::Value
                | EntityType::Number
                | EntityType::String
                | EntityType::Date
                | EntityType::Boolean
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntitySource {
    Rule,
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTag {
    pub text: String,
    pub entity_type: EntityType,
    /// Inclusive, in characters of the normalized text
    pub start_offset: usize,
    /// Exclusive, in characters of the normalized text
    pub end_offset: usize,
    pub normalized_value: Option<String>,
    pub confidence: f64,
    pub fuzzy_match: bool,
    pub fuzzy_score: f64,
    pub attributes: BTreeMap<String, String>,
    pub source: EntitySource,
}

impl EntityTag {
    pub fn new(
        text: impl Into<String>,
        entity_type: EntityType,
        start_offset: usize,
        end_offset: usize,
        confidence: f64,
        source: EntitySource,
    ) -> Self {
        Self {
            text: text.into(),
            entity_type,
            start_offset,
            end_offset,
            normalized_value: None,
            confidence: crate::confidence::clamp(confidence),
            fuzzy_match: false,
            fuzzy_score: 0.0,
            attributes: BTreeMap::new(),
            source,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.normalized_value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_fuzzy(mut self, score: f64) -> Self {
        self.fuzzy_match = true;
        self.fuzzy_score = crate::confidence::clamp(score);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// `normalized_value` when set, the surface text otherwise
    pub fn value(&self) -> &str {
        self.normalized_value.as_deref().unwrap_or(&self.text)
    }

    pub fn len(&self) -> usize {
        self.end_offset.saturating_sub(self.start_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &EntityTag) -> bool {
        self.start_offset < other.end_offset && other.start_offset < self.end_offset
    }

    /// Offsets must describe a non-empty span inside a text of `text_len` chars
    pub fn check_span(&self, text_len: usize) -> Result<()> {
        if self.start_offset >= self.end_offset || self.end_offset > text_len {
            return Err(NlSqlError::Invariant(format!(
                "entity '{}' has invalid span {}..{} (text length {})",
                self.text, self.start_offset, self.end_offset, text_len
            )));
        }
        Ok(())
    }
}

/// One way of finding entities in a question
pub trait EntityExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        text: &NormalizedText,
        tokens: &[Token],
        schema: Option<&dyn SchemaProvider>,
    ) -> Result<Vec<EntityTag>>;
}

/// Character offset of a byte offset in `text`
pub(crate) fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_checks() {
        let tag = EntityTag::new("订单", EntityType::Table, 2, 4, 0.9, EntitySource::Metadata);
        assert!(tag.check_span(4).is_ok());
        assert!(matches!(tag.check_span(3), Err(NlSqlError::Invariant(_))));

        let empty = EntityTag::new("", EntityType::Other, 3, 3, 0.5, EntitySource::Rule);
        assert!(empty.check_span(10).is_err());
    }

    #[test]
    fn test_confidence_clamped() {
        let tag = EntityTag::new("x", EntityType::Other, 0, 1, 1.7, EntitySource::Rule);
        assert_eq!(tag.confidence, 1.0);
    }

    #[test]
    fn test_overlap() {
        let a = EntityTag::new("最近7天", EntityType::Date, 0, 4, 0.9, EntitySource::Rule);
        let b = EntityTag::new("7", EntityType::Number, 2, 3, 0.9, EntitySource::Rule);
        let c = EntityTag::new("订单", EntityType::Table, 4, 6, 0.9, EntitySource::Metadata);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_char_offset() {
        assert_eq!(char_offset("查询orders", "查询".len()), 2);
    }
}
