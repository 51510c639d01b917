//! Metadata-based entity extraction
//!
//! Looks the question up against the schema snapshot:
//! - Latin physical names match whole tokens, case-insensitively
//!   (`orders`, `orders.amount`)
//! - Business names (comments and aliases, usually Chinese) match as
//!   substrings of the normalized text
//!
//! Longer matches win over shorter ones, so "订单金额" as a column alias beats
//! "订单" as a table comment. The returned entities never overlap.

use tracing::debug;

use crate::entity::{
    EntityExtractionStrategy, EntitySource, EntityTag, EntityType, ATTR_MATCHED_ON, ATTR_TABLE,
};
use crate::error::Result;
use crate::normalizer::{is_cjk, NormalizedText};
use crate::schema::SchemaProvider;
use crate::tokenizer::Token;

/// Confidence for a physical name match
pub const NAME_MATCH_CONFIDENCE: f64 = 0.95;
/// Confidence for a comment or alias match
pub const BUSINESS_NAME_CONFIDENCE: f64 = 0.9;

pub struct MetadataExtractor {
    name_confidence: f64,
    business_confidence: f64,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self {
            name_confidence: NAME_MATCH_CONFIDENCE,
            business_confidence: BUSINESS_NAME_CONFIDENCE,
        }
    }
}

/// What a schema term refers to
#[derive(Debug, Clone)]
struct Term {
    entity_type: EntityType,
    /// Physical table or column name
    target: String,
    /// Owning table for columns
    table: Option<String>,
    matched_on: &'static str,
    confidence: f64,
}

impl MetadataExtractor {
    pub fn new(name_confidence: f64, business_confidence: f64) -> Self {
        Self {
            name_confidence,
            business_confidence,
        }
    }

    fn tag(&self, text: &str, start: usize, end: usize, term: &Term) -> EntityTag {
        let mut tag = EntityTag::new(text, term.entity_type, start, end, term.confidence, EntitySource::Metadata)
            .with_value(term.target.clone())
            .with_attribute(ATTR_MATCHED_ON, term.matched_on);
        if let Some(table) = &term.table {
            tag = tag.with_attribute(ATTR_TABLE, table.clone());
        }
        tag
    }

    /// Physical-name matches against tokens
    fn match_tokens(&self, tokens: &[Token], schema: &dyn SchemaProvider) -> Vec<EntityTag> {
        let mut found = Vec::new();
        for token in tokens {
            let word = token.text.as_str();

            if let Some((table_part, column_part)) = word.split_once('.') {
                if let Some(table) = schema.tables().iter().find(|t| t.name.eq_ignore_ascii_case(table_part)) {
                    if let Some(column) = table.get_column(column_part) {
                        let term = Term {
                            entity_type: EntityType::Column,
                            target: column.name.clone(),
                            table: Some(table.name.clone()),
                            matched_on: "name",
                            confidence: self.name_confidence,
                        };
                        found.push(self.tag(word, token.start, token.end, &term));
                    }
                }
                continue;
            }

            if let Some(table) = schema.tables().iter().find(|t| t.name.eq_ignore_ascii_case(word)) {
                let term = Term {
                    entity_type: EntityType::Table,
                    target: table.name.clone(),
                    table: None,
                    matched_on: "name",
                    confidence: self.name_confidence,
                };
                found.push(self.tag(word, token.start, token.end, &term));
            }

            // first owning table in schema order
            for table in schema.tables() {
                if let Some(column) = table.get_column(word) {
                    let term = Term {
                        entity_type: EntityType::Column,
                        target: column.name.clone(),
                        table: Some(table.name.clone()),
                        matched_on: "name",
                        confidence: self.name_confidence,
                    };
                    found.push(self.tag(word, token.start, token.end, &term));
                    break;
                }
            }
        }
        found
    }

    /// Comment and alias matches as substrings
    fn match_business_names(&self, chars: &[char], schema: &dyn SchemaProvider) -> Vec<EntityTag> {
        let matched_on = |i: usize, has_comment: bool| if i == 0 && has_comment { "comment" } else { "alias" };
        let mut terms: Vec<(String, Term)> = Vec::new();
        for table in schema.tables() {
            for (i, label) in table.business_names().enumerate() {
                terms.push((
                    label.to_string(),
                    Term {
                        entity_type: EntityType::Table,
                        target: table.name.clone(),
                        table: None,
                        matched_on: matched_on(i, table.comment.is_some()),
                        confidence: self.business_confidence,
                    },
                ));
            }
            for column in &table.columns {
                for (i, label) in column.business_names().enumerate() {
                    terms.push((
                        label.to_string(),
                        Term {
                            entity_type: EntityType::Column,
                            target: column.name.clone(),
                            table: Some(table.name.clone()),
                            matched_on: matched_on(i, column.comment.is_some()),
                            confidence: self.business_confidence,
                        },
                    ));
                }
            }
        }

        let mut found = Vec::new();
        for (label, term) in terms {
            let needle: Vec<char> = label.trim().chars().collect();
            if needle.is_empty() {
                continue;
            }
            let latin = !needle.iter().any(|c| is_cjk(*c));
            for start in find_all(chars, &needle) {
                let end = start + needle.len();
                // Latin labels must stand as whole words
                if latin && !(word_boundary(chars, start) && word_boundary(chars, end)) {
                    continue;
                }
                let text: String = chars[start..end].iter().collect();
                found.push(self.tag(&text, start, end, &term));
            }
        }
        found
    }
}

fn same_char(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn find_all(haystack: &[char], needle: &[char]) -> Vec<usize> {
    if needle.len() > haystack.len() {
        return Vec::new();
    }
    (0..=haystack.len() - needle.len())
        .filter(|&i| needle.iter().zip(&haystack[i..]).all(|(n, h)| same_char(*n, *h)))
        .collect()
}

fn word_boundary(chars: &[char], at: usize) -> bool {
    let is_word = |c: &char| c.is_ascii_alphanumeric() || *c == '_';
    let before = at.checked_sub(1).and_then(|i| chars.get(i)).map(is_word).unwrap_or(false);
    let after = chars.get(at).map(is_word).unwrap_or(false);
    !(before && after)
}

/// Keep the longest, then most confident, then earliest non-overlapping matches.
/// Tables win over columns on identical spans.
fn select_non_overlapping(mut candidates: Vec<EntityTag>) -> Vec<EntityTag> {
    candidates.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(b.confidence.total_cmp(&a.confidence))
            .then(a.entity_type.cmp(&b.entity_type))
            .then(a.start_offset.cmp(&b.start_offset))
    });

    let mut accepted: Vec<EntityTag> = Vec::new();
    for candidate in candidates {
        if accepted.iter().all(|held| !held.overlaps(&candidate)) {
            accepted.push(candidate);
        }
    }
    accepted.sort_by_key(|t| t.start_offset);
    accepted
}

impl EntityExtractionStrategy for MetadataExtractor {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn extract(
        &self,
        text: &NormalizedText,
        tokens: &[Token],
        schema: Option<&dyn SchemaProvider>,
    ) -> Result<Vec<EntityTag>> {
        let Some(schema) = schema else {
            return Ok(Vec::new());
        };
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let chars: Vec<char> = text.normalized.chars().collect();
        let mut candidates = self.match_tokens(tokens, schema);
        candidates.extend(self.match_business_names(&chars, schema));

        let entities = select_non_overlapping(candidates);
        debug!("Metadata extractor matched {} schema entities", entities.len());
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{normalize, NormalizerProfile};
    use crate::schema::{ColumnInfo, SchemaInfo, TableInfo};
    use crate::tokenizer::Tokenizer;

    fn shop() -> SchemaInfo {
        SchemaInfo::new(
            "shop",
            vec![
                TableInfo::new("orders")
                    .with_comment("订单")
                    .with_column(ColumnInfo::new("id", "bigint").primary())
                    .with_column(ColumnInfo::new("amount", "decimal").with_comment("金额").with_alias("订单金额"))
                    .with_column(ColumnInfo::new("created_at", "timestamp").with_comment("创建时间")),
                TableInfo::new("users")
                    .with_comment("用户")
                    .with_column(ColumnInfo::new("id", "bigint").primary())
                    .with_column(ColumnInfo::new("name", "varchar").with_comment("名字")),
            ],
        )
    }

    fn extract(question: &str) -> Vec<EntityTag> {
        let text = normalize(question, NormalizerProfile::Default);
        let tokens = Tokenizer::default().tokenize(&text);
        let schema = shop();
        MetadataExtractor::default().extract(&text, &tokens, Some(&schema)).unwrap()
    }

    #[test]
    fn test_comment_matches() {
        let entities = extract("查询用户表中名字为张三的记录");
        assert_eq!(entities.len(), 2);

        assert_eq!(entities[0].entity_type, EntityType::Table);
        assert_eq!(entities[0].value(), "users");
        assert_eq!((entities[0].start_offset, entities[0].end_offset), (2, 4));
        assert_eq!(entities[0].confidence, BUSINESS_NAME_CONFIDENCE);
        assert_eq!(entities[0].attribute(ATTR_MATCHED_ON), Some("comment"));

        assert_eq!(entities[1].entity_type, EntityType::Column);
        assert_eq!(entities[1].value(), "name");
        assert_eq!(entities[1].attribute(ATTR_TABLE), Some("users"));
    }

    #[test]
    fn test_longest_alias_wins() {
        let entities = extract("最近7天订单金额总和");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::Column);
        assert_eq!(entities[0].text, "订单金额");
        assert_eq!(entities[0].attribute(ATTR_MATCHED_ON), Some("alias"));
    }

    #[test]
    fn test_physical_names() {
        let entities = extract("show orders.amount and name from users");
        let summary: Vec<_> = entities
            .iter()
            .map(|e| (e.entity_type, e.value().to_string(), e.confidence))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EntityType::Column, "amount".to_string(), NAME_MATCH_CONFIDENCE),
                (EntityType::Column, "name".to_string(), NAME_MATCH_CONFIDENCE),
                (EntityType::Table, "users".to_string(), NAME_MATCH_CONFIDENCE),
            ]
        );
        assert_eq!(entities[0].attribute(ATTR_TABLE), Some("orders"));
    }

    #[test]
    fn test_no_schema_no_entities() {
        let text = normalize("统计订单数量", NormalizerProfile::Default);
        let entities = MetadataExtractor::default().extract(&text, &[], None).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_latin_alias_needs_word_boundary() {
        let schema = SchemaInfo::new(
            "db",
            vec![TableInfo {
                aliases: vec!["user".to_string()],
                ..TableInfo::new("accounts")
            }],
        );
        let text = normalize("list users", NormalizerProfile::Default);
        let tokens = Tokenizer::default().tokenize(&text);
        let entities = MetadataExtractor::default().extract(&text, &tokens, Some(&schema)).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn test_comment_and_alias_are_told_apart() {
        let entities = extract("金额大于100");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].value(), "amount");
        assert_eq!(entities[0].attribute(ATTR_MATCHED_ON), Some("comment"));
        assert_eq!(entities[0].confidence, BUSINESS_NAME_CONFIDENCE);

        let entities = extract("订单金额大于100");
        assert_eq!(entities[0].attribute(ATTR_MATCHED_ON), Some("alias"));
    }

    #[test]
    fn test_shared_column_goes_to_first_table() {
        let entities = extract("id");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::Column);
        assert_eq!(entities[0].attribute(ATTR_TABLE), Some("orders"));
    }

    #[test]
    fn test_table_wins_identical_span() {
        let schema = SchemaInfo::new(
            "db",
            vec![
                TableInfo::new("orders").with_column(ColumnInfo::new("region", "varchar")),
                TableInfo::new("region").with_column(ColumnInfo::new("code", "varchar")),
            ],
        );
        let text = normalize("region", NormalizerProfile::Default);
        let tokens = Tokenizer::default().tokenize(&text);
        let entities = MetadataExtractor::default().extract(&text, &tokens, Some(&schema)).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_type, EntityType::Table);
        assert_eq!(entities[0].value(), "region");
    }

    #[test]
    fn test_physical_name_ignores_case() {
        let text = normalize("统计ORDERS数量", NormalizerProfile::ExactMatch);
        let tokens = Tokenizer::default().tokenize(&text);
        let schema = shop();
        let entities = MetadataExtractor::default().extract(&text, &tokens, Some(&schema)).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].text, "ORDERS");
        assert_eq!(entities[0].value(), "orders");
        assert_eq!((entities[0].start_offset, entities[0].end_offset), (2, 8));
    }

    #[test]
    fn test_every_mention_is_tagged() {
        let entities = extract("订单和订单");
        let spans: Vec<_> = entities.iter().map(|e| (e.start_offset, e.end_offset)).collect();
        assert_eq!(spans, vec![(0, 2), (3, 5)]);
        assert!(entities.iter().all(|e| e.value() == "orders"));
    }

    #[test]
    fn test_custom_confidences() {
        let text = normalize("用户 users", NormalizerProfile::Default);
        let tokens = Tokenizer::default().tokenize(&text);
        let schema = shop();
        let entities = MetadataExtractor::new(0.7, 0.6).extract(&text, &tokens, Some(&schema)).unwrap();
        let confidences: Vec<_> = entities.iter().map(|e| e.confidence).collect();
        assert_eq!(confidences, vec![0.6, 0.7]);
    }

    #[test]
    fn test_unknown_dotted_column_is_skipped() {
        let entities = extract("show orders.discount");
        assert!(entities.is_empty());
    }
}
