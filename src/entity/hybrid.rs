//! Hybrid extractor: metadata strategy + rule strategy + merge

use tracing::debug;

use crate::entity::{merge, EntityExtractionStrategy, EntityTag, MetadataExtractor, RuleBasedExtractor};
use crate::error::Result;
use crate::normalizer::NormalizedText;
use crate::schema::SchemaProvider;
use crate::tokenizer::Token;

pub struct HybridExtractor {
    metadata: Box<dyn EntityExtractionStrategy>,
    rules: Box<dyn EntityExtractionStrategy>,
}

impl Default for HybridExtractor {
    fn default() -> Self {
        Self::new(
            Box::new(MetadataExtractor::default()),
            Box::new(RuleBasedExtractor::default()),
        )
    }
}

impl HybridExtractor {
    pub fn new(metadata: Box<dyn EntityExtractionStrategy>, rules: Box<dyn EntityExtractionStrategy>) -> Self {
        Self { metadata, rules }
    }

    /// Run both strategies and merge. Any span outside the text is an internal
    /// error, not a user error.
    pub fn extract(
        &self,
        text: &NormalizedText,
        tokens: &[Token],
        schema: Option<&dyn SchemaProvider>,
    ) -> Result<Vec<EntityTag>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let text_len = text.char_len();
        let from_metadata = self.metadata.extract(text, tokens, schema)?;
        let from_rules = self.rules.extract(text, tokens, schema)?;
        for tag in from_metadata.iter().chain(from_rules.iter()) {
            tag.check_span(text_len)?;
        }

        debug!(
            "Merging {} {} entities with {} {} entities",
            from_metadata.len(),
            self.metadata.name(),
            from_rules.len(),
            self.rules.name()
        );
        merge(from_metadata, from_rules)
    }
}

/// Extract with the built-in rule battery and default metadata confidences
pub fn extract_entities(
    text: &NormalizedText,
    tokens: &[Token],
    schema: Option<&dyn SchemaProvider>,
) -> Result<Vec<EntityTag>> {
    HybridExtractor::default().extract(text, tokens, schema)
}
