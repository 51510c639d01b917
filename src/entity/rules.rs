//! Rule-based entity extraction
//!
//! One regex battery per entity type. Literals (numbers, dates, quoted
//! strings) are the most trusted, reference forms like "用户表" the least.
//! Matches may overlap each other; `merge` sorts that out.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::entity::{
    char_offset, EntityExtractionStrategy, EntitySource, EntityTag, EntityType, ATTR_CONNECTOR,
};
use crate::error::Result;
use crate::normalizer::NormalizedText;
use crate::numerals::parse_count;
use crate::operators::{function_for_phrase, SqlOperator, FUNCTION_PHRASES, OPERATOR_PHRASES};
use crate::schema::SchemaProvider;
use crate::tokenizer::Token;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfidences {
    /// NUMBER, DATE, STRING
    pub literal: f64,
    /// VALUE, BOOLEAN, OPERATOR, FUNCTION
    pub marker: f64,
    /// TABLE, COLUMN, CONDITION, ORDER, GROUP, LIMIT
    pub reference: f64,
}

impl Default for RuleConfidences {
    fn default() -> Self {
        Self {
            literal: 0.9,
            marker: 0.85,
            reference: 0.8,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRuleConfig {
    /// Verbs peeled off the front of "X表" / "X字段" captures
    pub lead_words: Vec<String>,
    pub and_words: Vec<String>,
    pub or_words: Vec<String>,
    pub order_markers: Vec<String>,
    pub group_markers: Vec<String>,
    pub true_words: Vec<String>,
    pub false_words: Vec<String>,
    pub confidences: RuleConfidences,
}

impl Default for EntityRuleConfig {
    fn default() -> Self {
        Self {
            lead_words: strings(&[
                "请", "帮我", "查询", "查看", "查找", "统计", "显示", "列出", "获取", "所有", "全部",
            ]),
            and_words: strings(&["并且", "而且", "同时", "且", "and"]),
            or_words: strings(&["或者", "或", "or"]),
            order_markers: strings(&[
                "降序", "升序", "倒序", "正序", "排序", "排列", "排名", "order by", "sort by", "asc",
                "desc",
            ]),
            group_markers: strings(&["分组", "每个", "各个", "group by"]),
            true_words: strings(&["true", "真", "是的"]),
            false_words: strings(&["false", "假", "否"]),
            confidences: RuleConfidences::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    TableZh,
    TableEn,
    ColumnZh,
    ColumnEn,
    Value,
    Number,
    Date,
    Str,
    Boolean,
    Operator,
    Condition,
    Order,
    Group,
    Limit,
    Function,
}

impl RuleKind {
    fn entity_type(&self) -> EntityType {
        match self {
            RuleKind::TableZh | RuleKind::TableEn => EntityType::Table,
            RuleKind::ColumnZh | RuleKind::ColumnEn => EntityType::Column,
            RuleKind::Value => EntityType::Value,
            RuleKind::Number => EntityType::Number,
            RuleKind::Date => EntityType::Date,
            RuleKind::Str => EntityType::String,
            RuleKind::Boolean => EntityType::Boolean,
            RuleKind::Operator => EntityType::Operator,
            RuleKind::Condition => EntityType::Condition,
            RuleKind::Order => EntityType::Order,
            RuleKind::Group => EntityType::Group,
            RuleKind::Limit => EntityType::Limit,
            RuleKind::Function => EntityType::Function,
        }
    }
}

#[derive(Debug)]
struct Rule {
    kind: RuleKind,
    regex: Regex,
    confidence: f64,
}

/// Compiled rule battery. Immutable, shared behind an `Arc`.
#[derive(Debug)]
pub struct EntityRules {
    rules: Vec<Rule>,
    lead_words: Vec<String>,
    and_words: Vec<String>,
    true_words: Vec<String>,
}

/// Characters that end a "X表" / "X字段" capture on the left
const REFERENCE_CHARS: &str = r"[\w--[的中在从和与及表列]]";

/// Characters allowed in a Chinese number word
const CN_NUM: &str = "零〇一二两三四五六七八九十百千万";

/// Build a case-insensitive alternation, longest phrase first. ASCII words get
/// word boundaries and inner spaces match any whitespace run.
pub(crate) fn phrase_alternation<S: AsRef<str>>(phrases: &[S]) -> String {
    let mut phrases: Vec<&str> = phrases
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect();
    if phrases.is_empty() {
        return r"\b\B".to_string();
    }
    phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));

    let parts: Vec<String> = phrases
        .iter()
        .map(|p| {
            let body = p
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+");
            let starts_word = p.chars().next().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
            let ends_word = p.chars().last().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false);
            format!(
                "{}{}{}",
                if starts_word { r"\b" } else { "" },
                body,
                if ends_word { r"\b" } else { "" }
            )
        })
        .collect();
    format!("(?i)(?:{})", parts.join("|"))
}

impl EntityRules {
    pub fn compile(config: &EntityRuleConfig) -> Result<Self> {
        let c = &config.confidences;
        let mut rules = Vec::new();
        let mut add = |kind: RuleKind, pattern: &str, confidence: f64| -> Result<()> {
            rules.push(Rule {
                kind,
                regex: Regex::new(pattern)?,
                confidence,
            });
            Ok(())
        };

        // references
        add(RuleKind::TableZh, &format!(r"({}{{1,10}}?)表", REFERENCE_CHARS), c.reference)?;
        add(RuleKind::TableEn, r"(?i)\b(?:from|table|into)\s+([a-z_][a-z0-9_]*)", c.reference)?;
        add(RuleKind::TableEn, r"(?i)\b([a-z_][a-z0-9_]*)\s+table\b", c.reference)?;
        add(RuleKind::ColumnZh, &format!(r"({}{{1,10}}?)(?:字段|列)", REFERENCE_CHARS), c.reference)?;
        add(RuleKind::ColumnEn, r"(?i)\b(?:column|field)\s+([a-z_][a-z0-9_.]*)", c.reference)?;

        // literals
        add(RuleKind::Number, r"\d+(?:\.\d+)?", c.literal)?;
        add(RuleKind::Date, r"\d{4}[-/年]\d{1,2}[-/月]\d{1,2}日?", c.literal)?;
        add(
            RuleKind::Date,
            &format!(
                r"(?:最近|近|过去|前)\s*(?:\d+|[{cn}]+|几)?\s*个?\s*(?:小时|天|日|周|星期|礼拜|月|季度|季|年)",
                cn = CN_NUM
            ),
            c.literal,
        )?;
        add(
            RuleKind::Date,
            "今天|今日|昨天|明天|本周|上周|这周|本月|上个?月|这个月|本季度|今年|去年|本年",
            c.literal,
        )?;
        add(
            RuleKind::Date,
            r"(?i)\b(?:today|yesterday|(?:last|past)\s+\d*\s*(?:hours?|days?|weeks?|months?|quarters?|years?))\b",
            c.literal,
        )?;
        add(RuleKind::Str, r#""([^"]*)"|'([^']*)'"#, c.literal)?;

        // values after a copula, up to a particle, connector or separator
        let mut stops: Vec<String> = strings(&["的"]);
        stops.extend(config.and_words.iter().cloned());
        stops.extend(config.or_words.iter().cloned());
        add(
            RuleKind::Value,
            &format!(
                r"(?:等于|是|为|=)\s*([^\s,的]+?)(?:{}|,|\s|$)",
                phrase_alternation(&stops).trim_start_matches("(?i)")
            ),
            c.marker,
        )?;

        let mut booleans = config.true_words.clone();
        booleans.extend(config.false_words.iter().cloned());
        add(RuleKind::Boolean, &phrase_alternation(&booleans), c.marker)?;

        let operators: Vec<&str> = OPERATOR_PHRASES.iter().map(|(p, _)| *p).collect();
        add(RuleKind::Operator, &phrase_alternation(&operators), c.marker)?;

        let functions: Vec<&str> = FUNCTION_PHRASES.iter().map(|(p, _)| *p).collect();
        add(RuleKind::Function, &phrase_alternation(&functions), c.marker)?;

        // markers
        let mut connectors = config.and_words.clone();
        connectors.extend(config.or_words.iter().cloned());
        connectors.push("where".to_string());
        add(RuleKind::Condition, &phrase_alternation(&connectors), c.reference)?;
        add(RuleKind::Order, &phrase_alternation(&config.order_markers), c.reference)?;
        add(RuleKind::Group, &phrase_alternation(&config.group_markers), c.reference)?;
        add(
            RuleKind::Limit,
            &format!(
                r"(?i)(?:前|头)\s*(?:\d+|[{cn}]+)\s*(?:条|个|名|行|位)?|\btop\s*\d+|\blimit\s+\d+|第\s*(?:\d+|[{cn}]+)\s*页",
                cn = CN_NUM
            ),
            c.reference,
        )?;

        let mut lead_words = config.lead_words.clone();
        lead_words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));

        Ok(Self {
            rules,
            lead_words,
            and_words: config.and_words.iter().map(|w| w.to_lowercase()).collect(),
            true_words: config.true_words.iter().map(|w| w.to_lowercase()).collect(),
        })
    }
}

lazy_static! {
    /// Built-in Chinese + English rule battery
    pub static ref DEFAULT_ENTITY_RULES: Arc<EntityRules> = Arc::new(
        EntityRules::compile(&EntityRuleConfig::default()).expect("built-in entity rules compile")
    );
}

pub struct RuleBasedExtractor {
    rules: Arc<EntityRules>,
}

impl Default for RuleBasedExtractor {
    fn default() -> Self {
        Self::new(Arc::clone(&DEFAULT_ENTITY_RULES))
    }
}

impl RuleBasedExtractor {
    pub fn new(rules: Arc<EntityRules>) -> Self {
        Self { rules }
    }

    fn build(&self, rule: &Rule, caps: &Captures<'_>, input: &str) -> Option<EntityTag> {
        let whole = caps.get(0)?;
        let span = caps.get(1).or_else(|| caps.get(2)).unwrap_or(whole);
        let mut start = span.start();
        let mut text = span.as_str();
        let after_whole = input[whole.end()..].chars().next();

        match rule.kind {
            RuleKind::TableZh | RuleKind::ColumnZh => {
                // "表示" / "表格" / "列出" / "列表" are not references
                if rule.kind == RuleKind::TableZh
                    && matches!(after_whole, Some('示' | '格' | '达' | '明' | '现'))
                {
                    return None;
                }
                if rule.kind == RuleKind::ColumnZh
                    && whole.as_str().ends_with('列')
                    && matches!(after_whole, Some('出' | '表' | '举'))
                {
                    return None;
                }
                let (skipped, rest) = self.strip_lead_words(text);
                if rest.is_empty() {
                    return None;
                }
                start += skipped;
                text = rest;
            }
            RuleKind::Value => {
                let lower = text.to_lowercase();
                if text.starts_with('空') || text.starts_with('否') || lower == "null" || lower == "not" {
                    return None;
                }
            }
            RuleKind::Number => {
                let before = input[..start].chars().last();
                if before.map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
                    || after_whole.map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
                {
                    return None;
                }
                // a leading minus sign that is not a hyphen inside a word
                if before == Some('-') {
                    let prev = input[..start - 1].chars().last();
                    if !prev.map(|c| c.is_ascii_alphanumeric()).unwrap_or(false) {
                        start -= 1;
                        text = &input[start..span.end()];
                    }
                }
            }
            _ => {}
        }
        if text.is_empty() {
            return None;
        }

        let char_start = char_offset(input, start);
        let char_end = char_start + text.chars().count();
        let mut tag = EntityTag::new(
            text,
            rule.kind.entity_type(),
            char_start,
            char_end,
            rule.confidence,
            EntitySource::Rule,
        );

        match rule.kind {
            RuleKind::Date => {
                if let Some(date) = parse_literal_date(text) {
                    tag = tag.with_value(date);
                }
            }
            RuleKind::Boolean => {
                let truthy = self.rules.true_words.contains(&text.to_lowercase());
                tag = tag.with_value(if truthy { "true" } else { "false" });
            }
            RuleKind::Operator => {
                if let Some(op) = SqlOperator::from_phrase(text) {
                    tag = tag.with_value(op.as_sql());
                }
            }
            RuleKind::Function => {
                if let Some(function) = function_for_phrase(text) {
                    tag = tag.with_value(function);
                }
            }
            RuleKind::Condition => {
                let lower = text.to_lowercase();
                if lower != "where" {
                    let connector = if self.rules.and_words.contains(&lower) { "AND" } else { "OR" };
                    tag = tag.with_attribute(ATTR_CONNECTOR, connector);
                }
            }
            RuleKind::Order => {
                let lower = text.to_lowercase();
                if ["降序", "倒序", "desc"].contains(&lower.as_str()) {
                    tag = tag.with_value("DESC");
                } else if ["升序", "正序", "asc"].contains(&lower.as_str()) {
                    tag = tag.with_value("ASC");
                }
            }
            RuleKind::Limit => {
                let digits: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || CN_NUM.contains(*c))
                    .collect();
                if let Some(n) = parse_count(&digits) {
                    tag = tag.with_value(n.to_string());
                }
            }
            _ => {}
        }

        Some(tag)
    }

    /// Byte length stripped and the remainder
    fn strip_lead_words<'a>(&self, mut text: &'a str) -> (usize, &'a str) {
        let mut skipped = 0;
        'outer: loop {
            for word in &self.rules.lead_words {
                if let Some(rest) = text.strip_prefix(word.as_str()) {
                    skipped += word.len();
                    text = rest;
                    continue 'outer;
                }
            }
            return (skipped, text);
        }
    }
}

/// `2024-1-5`, `2024/01/05`, `2024年1月5日` → `2024-01-05`. Impossible dates
/// stay unparsed.
fn parse_literal_date(text: &str) -> Option<String> {
    let parts: Vec<u32> = text
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.len() != 3 || parts[0] < 1000 {
        return None;
    }
    NaiveDate::from_ymd_opt(parts[0] as i32, parts[1], parts[2]).map(|d| d.format("%Y-%m-%d").to_string())
}

impl EntityExtractionStrategy for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn extract(
        &self,
        text: &NormalizedText,
        _tokens: &[Token],
        _schema: Option<&dyn SchemaProvider>,
    ) -> Result<Vec<EntityTag>> {
        let input = text.normalized.as_str();
        let mut entities = Vec::new();

        for rule in &self.rules.rules {
            for caps in rule.regex.captures_iter(input) {
                if let Some(tag) = self.build(rule, &caps, input) {
                    entities.push(tag);
                }
            }
        }

        entities.sort_by(|a, b| {
            a.start_offset
                .cmp(&b.start_offset)
                .then(b.end_offset.cmp(&a.end_offset))
                .then(a.entity_type.cmp(&b.entity_type))
        });
        debug!("Rule extractor produced {} candidate entities", entities.len());
        Ok(entities)
    }
}
