//! Intent Recognizer - single-pass classification of a normalized question
//!
//! Query type is decided by an ordered cascade (AVG → SUM → MAX → MIN → GROUP
//! → COUNT → SELECT); the first pattern that fires wins, SELECT is the default.
//! Purpose, time range, sort and limit are extracted independently. Nothing in
//! here fails: an unmatched question degrades to defaults.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::sync::Arc;
use tracing::debug;

use crate::confidence::INTENT_CONFIDENCE;
use crate::intent::patterns::{IntentPatterns, DEFAULT_INTENT_PATTERNS};
use crate::intent::{
    LimitRequirement, QueryIntent, QueryPurpose, QueryType, SortDirection, SortRequirement,
    TimeRange, TimeUnit,
};
use crate::normalizer::NormalizedText;
use crate::numerals::parse_count;
use crate::tokenizer::Token;

pub struct IntentRecognizer {
    patterns: Arc<IntentPatterns>,
}

impl Default for IntentRecognizer {
    fn default() -> Self {
        Self::new(Arc::clone(&DEFAULT_INTENT_PATTERNS))
    }
}

impl IntentRecognizer {
    pub fn new(patterns: Arc<IntentPatterns>) -> Self {
        Self { patterns }
    }

    pub fn recognize(&self, text: &NormalizedText, tokens: &[Token]) -> QueryIntent {
        if text.is_empty() || tokens.is_empty() {
            return QueryIntent::unknown();
        }

        let input = text.normalized.as_str();
        let intent = QueryIntent {
            query_type: self.query_type(input),
            query_purpose: self.query_purpose(input),
            time_range: self.time_range(input),
            sort_requirements: self.sort_requirements(input),
            limit_requirement: self.limit_requirement(input),
            confidence: INTENT_CONFIDENCE,
        };

        debug!(
            query_type = ?intent.query_type,
            purpose = ?intent.query_purpose,
            sorts = intent.sort_requirements.len(),
            limit = ?intent.limit_requirement.limit_type,
            "recognized intent"
        );
        intent
    }

    fn query_type(&self, input: &str) -> QueryType {
        self.patterns
            .query_types
            .iter()
            .find(|(_, re)| re.is_match(input))
            .map(|(query_type, _)| *query_type)
            .unwrap_or(QueryType::Select)
    }

    fn query_purpose(&self, input: &str) -> QueryPurpose {
        self.patterns
            .purposes
            .iter()
            .find(|(_, re)| re.is_match(input))
            .map(|(purpose, _)| *purpose)
            .unwrap_or(QueryPurpose::DataRetrieval)
    }

    /// Absolute ranges first, then "最近N天" style windows, then calendar words
    fn time_range(&self, input: &str) -> Option<TimeRange> {
        if let Some(caps) = self.patterns.absolute_range.captures(input) {
            if let Some(range) = absolute_from(&caps) {
                return Some(range);
            }
        }

        if let Some(caps) = self.patterns.relative_time_zh.captures(input) {
            if let Some(unit) = caps.get(2).and_then(|m| TimeUnit::from_word(m.as_str())) {
                return Some(TimeRange::relative(unit, self.relative_value(caps.get(1).map(|m| m.as_str()))));
            }
        }

        if let Some(caps) = self.patterns.relative_time_en.captures(input) {
            if let Some(unit) = caps.get(2).and_then(|m| TimeUnit::from_word(m.as_str())) {
                return Some(TimeRange::relative(unit, self.relative_value(caps.get(1).map(|m| m.as_str()))));
            }
        }

        self.patterns.current_period.find(input).and_then(|m| {
            let word = m.as_str().to_lowercase();
            let unit = if word.contains('天') || word.contains('日') || word == "today" {
                TimeUnit::Day
            } else if word.contains('周') || word.ends_with("week") {
                TimeUnit::Week
            } else if word.contains("季") || word.ends_with("quarter") {
                TimeUnit::Quarter
            } else if word.contains('月') || word.ends_with("month") {
                TimeUnit::Month
            } else {
                TimeUnit::Year
            };
            Some(TimeRange::relative(unit, 0))
        })
    }

    fn relative_value(&self, number: Option<&str>) -> i64 {
        number
            .and_then(parse_count)
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(self.patterns.default_relative_value)
    }

    /// Explicitly stated sort requirements, in order of appearance
    fn sort_requirements(&self, input: &str) -> Vec<SortRequirement> {
        // (start offset, field, explicit direction)
        let mut found: Vec<(usize, String, Option<SortDirection>)> = Vec::new();
        let mut taken: Vec<(usize, usize)> = Vec::new();

        for caps in self.patterns.sort_with_direction.captures_iter(input) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
            let field = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let direction = caps.get(2).map(|m| self.direction_of(m.as_str()));
            taken.push(whole);
            found.push((whole.0, field, direction));
        }

        for caps in self.patterns.sort_plain.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            if taken.iter().any(|(s, e)| whole.start() < *e && *s < whole.end()) {
                continue;
            }
            let field = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            // "按降序排列": the field slot caught a direction word
            let (field, direction) = match self.explicit_direction(&field) {
                Some(direction) => (String::new(), Some(direction)),
                None => (field, self.trailing_direction(&input[whole.end()..])),
            };
            found.push((whole.start(), field, direction));
        }

        for caps in self.patterns.sort_en.captures_iter(input) {
            let Some(list) = caps.get(1) else { continue };
            for (i, item) in list.as_str().split(',').enumerate() {
                let mut parts = item.split_whitespace();
                let Some(field) = parts.next() else { continue };
                let direction = parts.next().map(|d| self.direction_of(d));
                found.push((list.start() + i, field.to_string(), direction));
            }
        }

        found.sort_by_key(|(start, _, _)| *start);

        let mut requirements: Vec<SortRequirement> = Vec::new();
        for (_, field, direction) in found {
            if requirements.iter().any(|r| r.field == field) {
                continue;
            }
            requirements.push(SortRequirement {
                field,
                direction: direction.unwrap_or(SortDirection::Asc),
                priority: requirements.len() as u32,
            });
        }
        requirements
    }

    fn explicit_direction(&self, word: &str) -> Option<SortDirection> {
        if self.patterns.direction_desc.is_match(word) {
            Some(SortDirection::Desc)
        } else if self.patterns.direction_asc.is_match(word) {
            Some(SortDirection::Asc)
        } else {
            None
        }
    }

    fn direction_of(&self, word: &str) -> SortDirection {
        self.explicit_direction(word).unwrap_or(SortDirection::Asc)
    }

    /// Direction word directly after a sort clause ("按金额排序, 降序")
    fn trailing_direction(&self, rest: &str) -> Option<SortDirection> {
        let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        let starts_with = |regex: &Regex| regex.find(rest).map(|m| m.start() == 0).unwrap_or(false);
        if starts_with(&self.patterns.direction_desc) {
            Some(SortDirection::Desc)
        } else if starts_with(&self.patterns.direction_asc) {
            Some(SortDirection::Asc)
        } else {
            None
        }
    }

    fn limit_requirement(&self, input: &str) -> LimitRequirement {
        for caps in self.patterns.top_n.captures_iter(input) {
            let Some(number) = caps.get(1) else { continue };
            // "前3天" is a time window, not a row limit
            if followed_by_time_unit(&input[number.end()..]) {
                continue;
            }
            if let Some(n) = parse_count(number.as_str()) {
                return LimitRequirement::top_n(n);
            }
        }

        if let Some(caps) = self.patterns.pagination.captures(input) {
            let page = caps
                .get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| parse_count(m.as_str()))
                .unwrap_or(1);
            let page_size = self
                .patterns
                .page_size
                .captures(input)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .and_then(|m| parse_count(m.as_str()))
                .filter(|n| *n > 0)
                .unwrap_or(self.patterns.default_page_size);
            return LimitRequirement::page(page, page_size);
        }

        LimitRequirement::none()
    }
}

fn followed_by_time_unit(rest: &str) -> bool {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('个').unwrap_or(rest);
    ["小时", "天", "日", "周", "星期", "月", "季", "年"]
        .iter()
        .any(|unit| rest.starts_with(unit))
}

fn absolute_from(caps: &Captures<'_>) -> Option<TimeRange> {
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let start = NaiveDate::from_ymd_opt(num(1)? as i32, num(2)?, num(3)?)?;
    let end = NaiveDate::from_ymd_opt(num(4)? as i32, num(5)?, num(6)?)?;
    Some(TimeRange::absolute(
        start.and_hms_opt(0, 0, 0)?,
        end.and_hms_opt(23, 59, 59)?,
    ))
}

/// Recognize with the built-in pattern set
pub fn recognize_intent(text: &NormalizedText, tokens: &[Token]) -> QueryIntent {
    IntentRecognizer::default().recognize(text, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{LimitType, TimeType};
    use crate::normalizer::{normalize, NormalizerProfile};
    use crate::tokenizer::Tokenizer;

    fn intent_of(question: &str) -> QueryIntent {
        let text = normalize(question, NormalizerProfile::Default);
        let tokens = Tokenizer::default().tokenize(&text);
        recognize_intent(&text, &tokens)
    }

    #[test]
    fn test_count_question() {
        let intent = intent_of("统计订单数量");
        assert_eq!(intent.query_type, QueryType::Count);
        assert_eq!(intent.query_purpose, QueryPurpose::StatisticalAnalysis);
        assert_eq!(intent.confidence, 0.8);
        assert!(intent.time_range.is_none());
    }

    #[test]
    fn test_priority_order_resolves_ambiguity() {
        // both AVG and COUNT fire; AVG has priority
        assert_eq!(intent_of("平均每单的商品数量").query_type, QueryType::Avg);
        // SUM beats GROUP
        assert_eq!(intent_of("按地区统计销售额总和").query_type, QueryType::Sum);
        assert_eq!(intent_of("按地区统计订单数量").query_type, QueryType::Group);
        assert_eq!(intent_of("how many orders").query_type, QueryType::Count);
    }

    #[test]
    fn test_default_select() {
        let intent = intent_of("订单明细");
        assert_eq!(intent.query_type, QueryType::Select);
        assert_eq!(intent.query_purpose, QueryPurpose::DataRetrieval);
    }

    #[test]
    fn test_empty_question_is_unknown() {
        let intent = intent_of("   ");
        assert_eq!(intent.query_type, QueryType::Unknown);
        assert_eq!(intent.limit_requirement.limit_type, LimitType::None);
        assert_eq!(intent.confidence, 0.0);
    }

    #[test]
    fn test_relative_time_range() {
        let range = intent_of("最近7天订单金额总和").time_range.unwrap();
        assert_eq!(range.time_type, TimeType::Relative);
        assert_eq!(range.time_unit, Some(TimeUnit::Day));
        assert_eq!(range.time_value, 7);

        let range = intent_of("近三个月的销售趋势").time_range.unwrap();
        assert_eq!(range.time_unit, Some(TimeUnit::Month));
        assert_eq!(range.time_value, 3);

        let range = intent_of("最近几周的订单").time_range.unwrap();
        assert_eq!(range.time_unit, Some(TimeUnit::Week));
        assert_eq!(range.time_value, 30);

        let range = intent_of("orders in the last 2 years").time_range.unwrap();
        assert_eq!(range.time_unit, Some(TimeUnit::Year));
        assert_eq!(range.time_value, 2);
    }

    #[test]
    fn test_absolute_and_calendar_ranges() {
        let range = intent_of("2024-01-01到2024-03-31的订单").time_range.unwrap();
        assert_eq!(range.time_type, TimeType::Absolute);
        assert_eq!(range.start_time.unwrap().date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end_time.unwrap().date(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());

        let range = intent_of("本月订单数量").time_range.unwrap();
        assert_eq!(range.time_unit, Some(TimeUnit::Month));
        assert_eq!(range.time_value, 0);
    }

    #[test]
    fn test_sort_with_direction() {
        let intent = intent_of("按金额降序排序前10条");
        assert_eq!(
            intent.sort_requirements,
            vec![SortRequirement {
                field: "金额".to_string(),
                direction: SortDirection::Desc,
                priority: 0,
            }]
        );
        assert_eq!(intent.limit_requirement, LimitRequirement::top_n(10));
    }

    #[test]
    fn test_sort_defaults_to_asc() {
        let intent = intent_of("按创建时间排序");
        assert_eq!(intent.sort_requirements.len(), 1);
        assert_eq!(intent.sort_requirements[0].field, "创建时间");
        assert_eq!(intent.sort_requirements[0].direction, SortDirection::Asc);
    }

    #[test]
    fn test_direction_only_sort() {
        let intent = intent_of("最近7天订单数量按降序排列前10条");
        assert_eq!(intent.query_type, QueryType::Count);
        assert_eq!(intent.sort_requirements.len(), 1);
        assert_eq!(intent.sort_requirements[0].field, "");
        assert_eq!(intent.sort_requirements[0].direction, SortDirection::Desc);
        assert_eq!(intent.limit_requirement.limit_value, 10);
    }

    #[test]
    fn test_multiple_sorts_keep_priority() {
        let intent = intent_of("按地区升序排列, 按金额降序排列");
        let fields: Vec<_> = intent.sort_requirements.iter().map(|s| (s.field.as_str(), s.direction, s.priority)).collect();
        assert_eq!(
            fields,
            vec![("地区", SortDirection::Asc, 0), ("金额", SortDirection::Desc, 1)]
        );
    }

    #[test]
    fn test_english_order_by() {
        let intent = intent_of("list orders order by amount desc, id");
        let fields: Vec<_> = intent.sort_requirements.iter().map(|s| (s.field.as_str(), s.direction)).collect();
        assert_eq!(fields, vec![("amount", SortDirection::Desc), ("id", SortDirection::Asc)]);
    }

    #[test]
    fn test_direction_does_not_leak_between_sorts() {
        let intent = intent_of("按地区排序, 按金额降序排列");
        let fields: Vec<_> = intent.sort_requirements.iter().map(|s| (s.field.as_str(), s.direction, s.priority)).collect();
        assert_eq!(
            fields,
            vec![("地区", SortDirection::Asc, 0), ("金额", SortDirection::Desc, 1)]
        );
    }

    #[test]
    fn test_trailing_direction_attaches_to_clause() {
        let intent = intent_of("按金额排序, 降序");
        let fields: Vec<_> = intent.sort_requirements.iter().map(|s| (s.field.as_str(), s.direction)).collect();
        assert_eq!(fields, vec![("金额", SortDirection::Desc)]);
    }

    #[test]
    fn test_limits() {
        assert_eq!(intent_of("top 5 customers").limit_requirement, LimitRequirement::top_n(5));
        assert_eq!(intent_of("前十条订单").limit_requirement, LimitRequirement::top_n(10));
        assert_eq!(intent_of("查询订单 limit 20").limit_requirement, LimitRequirement::top_n(20));

        let page = intent_of("订单列表第3页").limit_requirement;
        assert_eq!(page.limit_type, LimitType::Pagination);
        assert_eq!(page.limit_value, 10);
        assert_eq!(page.offset, 20);

        let page = intent_of("订单第二页每页20条").limit_requirement;
        assert_eq!(page.limit_value, 20);
        assert_eq!(page.offset, 20);
    }

    #[test]
    fn test_huge_page_number_does_not_overflow() {
        let page = intent_of("订单第9999999999999999999页").limit_requirement;
        assert_eq!(page.limit_type, LimitType::Pagination);
        assert_eq!(page.limit_value, 10);
        assert_eq!(page.offset, u64::MAX);
    }

    #[test]
    fn test_time_window_is_not_a_limit() {
        let intent = intent_of("前3天的订单");
        assert_eq!(intent.limit_requirement.limit_type, LimitType::None);
        assert_eq!(intent.time_range.unwrap().time_value, 3);
    }

    #[test]
    fn test_purposes() {
        assert_eq!(intent_of("订单增长趋势").query_purpose, QueryPurpose::TrendAnalysis);
        assert_eq!(intent_of("今年和去年的订单对比").query_purpose, QueryPurpose::ComparisonAnalysis);
        assert_eq!(intent_of("找出异常订单").query_purpose, QueryPurpose::AnomalyDetection);
    }
}
