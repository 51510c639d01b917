//! Query intent - what kind of query the user wants
//!
//! `QueryIntent` is built once per question by the `IntentRecognizer` and is
//! never mutated afterwards. All defaults are explicit constants below.

pub mod patterns;
pub mod recognizer;

pub use patterns::{IntentPatternConfig, IntentPatterns, DEFAULT_INTENT_PATTERNS};
pub use recognizer::{recognize_intent, IntentRecognizer};

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Page size used for "第N页" when the question does not say "每页M条"
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Window used for "最近几天" style expressions without a number
pub const DEFAULT_RELATIVE_VALUE: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Select,
    Count,
    Sum,
    Avg,
    Max,
    Min,
    Group,
    Unknown,
}

impl QueryType {
    /// SQL aggregate function this query type wraps the projection in
    pub fn aggregate_function(&self) -> Option<&'static str> {
        match self {
            QueryType::Count => Some("COUNT"),
            QueryType::Sum => Some("SUM"),
            QueryType::Avg => Some("AVG"),
            QueryType::Max => Some("MAX"),
            QueryType::Min => Some("MIN"),
            QueryType::Select | QueryType::Group | QueryType::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPurpose {
    DataRetrieval,
    StatisticalAnalysis,
    TrendAnalysis,
    ComparisonAnalysis,
    AnomalyDetection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeType {
    Absolute,
    Relative,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    /// Map a Chinese or English unit word ("天", "weeks", "季度") to a unit
    pub fn from_word(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        let unit = match word.trim_end_matches('s') {
            "小时" | "hour" => TimeUnit::Hour,
            "天" | "日" | "day" => TimeUnit::Day,
            "周" | "星期" | "礼拜" | "week" => TimeUnit::Week,
            "月" | "month" => TimeUnit::Month,
            "季" | "季度" | "quarter" => TimeUnit::Quarter,
            "年" | "year" => TimeUnit::Year,
            _ => return None,
        };
        Some(unit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub time_type: TimeType,
    pub time_unit: Option<TimeUnit>,
    /// Number of units for relative ranges; `0` means "the current unit so far"
    pub time_value: i64,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn relative(unit: TimeUnit, value: i64) -> Self {
        Self {
            time_type: TimeType::Relative,
            time_unit: Some(unit),
            time_value: value,
            start_time: None,
            end_time: None,
        }
    }

    pub fn absolute(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            time_type: TimeType::Absolute,
            time_unit: None,
            time_value: 0,
            start_time: Some(start),
            end_time: Some(end),
        }
    }

    /// Concrete `[start, end]` window relative to `now`.
    ///
    /// Relative ranges count back `time_value` units from `now`; a value of 0
    /// starts at the beginning of the current unit (today, this week, ...).
    pub fn resolve(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match self.time_type {
            TimeType::Absolute => Some((self.start_time?, self.end_time?)),
            TimeType::Unspecified => None,
            TimeType::Relative => {
                let unit = self.time_unit?;
                let value = self.time_value.max(0);
                let start = if value == 0 {
                    period_start(now, unit)
                } else {
                    shift_back(now, unit, value)?
                };
                Some((start, now))
            }
        }
    }
}

fn shift_back(now: NaiveDateTime, unit: TimeUnit, value: i64) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Hour => now.checked_sub_signed(Duration::try_hours(value)?),
        TimeUnit::Day => now.checked_sub_signed(Duration::try_days(value)?),
        TimeUnit::Week => now.checked_sub_signed(Duration::try_weeks(value)?),
        TimeUnit::Month => now.checked_sub_months(Months::new(u32::try_from(value).ok()?)),
        TimeUnit::Quarter => now.checked_sub_months(Months::new(u32::try_from(value.checked_mul(3)?).ok()?)),
        TimeUnit::Year => now.checked_sub_months(Months::new(u32::try_from(value.checked_mul(12)?).ok()?)),
    }
}

fn period_start(now: NaiveDateTime, unit: TimeUnit) -> NaiveDateTime {
    let date = now.date();
    let day = match unit {
        TimeUnit::Hour => return date.and_hms_opt(now.hour(), 0, 0).unwrap_or(now),
        TimeUnit::Day => date,
        TimeUnit::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        TimeUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
        TimeUnit::Quarter => {
            let first_month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
        }
        TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    };
    day.and_hms_opt(0, 0, 0).unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRequirement {
    /// Field text as written by the user. Empty when only a direction was
    /// given ("按降序排列"), meaning "sort by the measure being computed".
    pub field: String,
    pub direction: SortDirection,
    /// Lower sorts first
    pub priority: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitType {
    TopN,
    Pagination,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRequirement {
    pub limit_type: LimitType,
    pub limit_value: u64,
    pub offset: u64,
}

impl LimitRequirement {
    pub fn none() -> Self {
        Self {
            limit_type: LimitType::None,
            limit_value: 0,
            offset: 0,
        }
    }

    pub fn top_n(n: u64) -> Self {
        Self {
            limit_type: LimitType::TopN,
            limit_value: n,
            offset: 0,
        }
    }

    /// Page numbers start at 1; page 0 is treated as page 1
    pub fn page(page: u64, page_size: u64) -> Self {
        Self {
            limit_type: LimitType::Pagination,
            limit_value: page_size,
            offset: page.saturating_sub(1).saturating_mul(page_size),
        }
    }
}

impl Default for LimitRequirement {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query_type: QueryType,
    pub query_purpose: QueryPurpose,
    pub time_range: Option<TimeRange>,
    pub sort_requirements: Vec<SortRequirement>,
    pub limit_requirement: LimitRequirement,
    pub confidence: f64,
}

impl QueryIntent {
    /// Intent for a question nothing could be recognized in
    pub fn unknown() -> Self {
        Self {
            query_type: QueryType::Unknown,
            query_purpose: QueryPurpose::DataRetrieval,
            time_range: None,
            sort_requirements: Vec::new(),
            limit_requirement: LimitRequirement::none(),
            confidence: 0.0,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        self.query_type.aggregate_function().is_some()
    }
}
