//! Intent pattern tables
//!
//! Keyword lists are plain configuration (`IntentPatternConfig`, loadable from
//! JSON per language or tenant) and are compiled once into `IntentPatterns`.
//! The built-in Chinese + English set is compiled lazily into
//! `DEFAULT_INTENT_PATTERNS` and shared by every recognizer that does not get
//! its own set injected.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::intent::{QueryPurpose, QueryType, DEFAULT_PAGE_SIZE, DEFAULT_RELATIVE_VALUE};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Keyword regexes per query type and purpose. Each list is OR-ed into one
/// case-insensitive regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentPatternConfig {
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub max: Vec<String>,
    pub min: Vec<String>,
    pub group: Vec<String>,
    pub count: Vec<String>,
    pub select: Vec<String>,

    pub statistical: Vec<String>,
    pub trend: Vec<String>,
    pub comparison: Vec<String>,
    pub anomaly: Vec<String>,

    pub default_page_size: u64,
    pub default_relative_value: i64,
}

impl Default for IntentPatternConfig {
    fn default() -> Self {
        Self {
            avg: strings(&["平均", "均值", r"\bavg\b", r"\baverage\b", r"\bmean\b"]),
            sum: strings(&[
                "总和", "总额", "合计", "总计", "求和", "累计", r"\bsum\b", r"\btotal\b",
            ]),
            max: strings(&[
                "最大", "最高", "最多", "峰值", r"\bmax\b", r"\bmaximum\b", r"\bhighest\b", r"\blargest\b",
            ]),
            min: strings(&[
                "最小", "最低", "最少", r"\bmin\b", r"\bminimum\b", r"\blowest\b", r"\bsmallest\b",
            ]),
            group: strings(&[
                "分组",
                "按.{1,10}?(?:统计|汇总|分类)",
                "每个",
                "每一个",
                "各个",
                r"\bgroup\s+by\b",
                r"\bper\b",
                r"\bfor each\b",
            ]),
            count: strings(&[
                "数量", "多少", "个数", "总数", "计数", "几个", "几条", r"\bcount\b", r"\bhow many\b",
                r"\bnumber of\b",
            ]),
            select: strings(&[
                "查询", "查看", "显示", "列出", "找出", "获取", r"\bselect\b", r"\bshow\b", r"\blist\b",
                r"\bfind\b", r"\bget\b",
            ]),
            statistical: strings(&[
                "统计", "汇总", "总和", "平均", "合计", "数量", "多少", r"\bcount\b", r"\bsum\b",
                r"\baverage\b", r"\bstatistic",
            ]),
            trend: strings(&[
                "趋势", "变化", "走势", "增长", "下降", r"\btrend", r"\bover time\b", r"\bgrowth\b",
            ]),
            comparison: strings(&[
                "对比", "比较", "相比", "同比", "环比", r"\bcompare", r"\bversus\b", r"\bvs\b",
            ]),
            anomaly: strings(&["异常", "突增", "突降", "离群", "波动", r"\banomal", r"\boutlier"]),
            default_page_size: DEFAULT_PAGE_SIZE,
            default_relative_value: DEFAULT_RELATIVE_VALUE,
        }
    }
}

/// Compiled intent patterns. Immutable, cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct IntentPatterns {
    /// Fixed priority order: AVG → SUM → MAX → MIN → GROUP → COUNT → SELECT
    pub query_types: Vec<(QueryType, Regex)>,
    /// STATISTICAL → TREND → COMPARISON → ANOMALY
    pub purposes: Vec<(QueryPurpose, Regex)>,

    pub relative_time_zh: Regex,
    pub relative_time_en: Regex,
    pub absolute_range: Regex,
    pub current_period: Regex,

    pub sort_with_direction: Regex,
    pub sort_plain: Regex,
    pub sort_en: Regex,
    pub direction_desc: Regex,
    pub direction_asc: Regex,

    pub top_n: Regex,
    pub pagination: Regex,
    pub page_size: Regex,

    pub default_page_size: u64,
    pub default_relative_value: i64,
}

/// Characters allowed in a Chinese number word
const CN_NUM: &str = "零〇一二两三四五六七八九十百千万";

/// Direction words; the first group sorts descending
const DESC_WORDS: &str = "降序|倒序|从高到低|从大到小|由高到低|由大到小";
const ASC_WORDS: &str = "升序|正序|从低到高|从小到大|由低到高|由小到大";

fn alternation(items: &[String]) -> Result<Regex> {
    let body = if items.is_empty() {
        // never matches
        r"\b\B".to_string()
    } else {
        items.iter().map(|p| format!("(?:{})", p)).collect::<Vec<_>>().join("|")
    };
    Ok(Regex::new(&format!("(?i){}", body))?)
}

impl IntentPatterns {
    pub fn compile(config: &IntentPatternConfig) -> Result<Self> {
        let query_types = vec![
            (QueryType::Avg, alternation(&config.avg)?),
            (QueryType::Sum, alternation(&config.sum)?),
            (QueryType::Max, alternation(&config.max)?),
            (QueryType::Min, alternation(&config.min)?),
            (QueryType::Group, alternation(&config.group)?),
            (QueryType::Count, alternation(&config.count)?),
            (QueryType::Select, alternation(&config.select)?),
        ];

        let purposes = vec![
            (QueryPurpose::StatisticalAnalysis, alternation(&config.statistical)?),
            (QueryPurpose::TrendAnalysis, alternation(&config.trend)?),
            (QueryPurpose::ComparisonAnalysis, alternation(&config.comparison)?),
            (QueryPurpose::AnomalyDetection, alternation(&config.anomaly)?),
        ];

        let relative_time_zh = Regex::new(&format!(
            r"(?:最近|近|过去|前)\s*(\d+|[{cn}]+|几)?\s*个?\s*(小时|天|日|周|星期|礼拜|月|季度|季|年)",
            cn = CN_NUM
        ))?;
        let relative_time_en = Regex::new(
            r"(?i)\b(?:last|past|recent|previous)\s+(\d+)?\s*(hours?|days?|weeks?|months?|quarters?|years?)\b",
        )?;
        let absolute_range = Regex::new(
            r"(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})日?\s*(?:到|至|~|-|to|and)\s*(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})日?",
        )?;
        let current_period = Regex::new(
            r"(?i)(今天|今日|本周|这周|本月|这个月|本季度|今年|本年|\btoday\b|\bthis\s+(?:week|month|quarter|year)\b)",
        )?;

        let sort_with_direction = Regex::new(&format!(
            r"按照?(?:([^\s按,并且]+?)的?)?({desc}|{asc})(?:排序|排列|排名)?",
            desc = DESC_WORDS,
            asc = ASC_WORDS
        ))?;
        let sort_plain = Regex::new(r"按照?([^\s按,并且]+?)的?(?:排序|排列|排名)")?;
        let sort_en = Regex::new(
            r"(?i)\b(?:order|sort|rank)(?:ed)?\s+by\s+([\w.]+(?:\s+(?:asc|desc|ascending|descending))?(?:\s*,\s*[\w.]+(?:\s+(?:asc|desc|ascending|descending))?)*)",
        )?;
        let direction_desc = Regex::new(&format!(r"(?i)(?:{}|\bdesc\b|\bdescending\b)", DESC_WORDS))?;
        let direction_asc = Regex::new(&format!(r"(?i)(?:{}|\basc\b|\bascending\b)", ASC_WORDS))?;

        let top_n = Regex::new(&format!(
            r"(?i)(?:前|头|\btop\s*|\blimit\s*|\bfirst\s+)(\d+|[{cn}]+)",
            cn = CN_NUM
        ))?;
        let pagination = Regex::new(&format!(
            r"(?i)(?:第\s*(\d+|[{cn}]+)\s*页|\bpage\s+(\d+)\b)",
            cn = CN_NUM
        ))?;
        let page_size = Regex::new(&format!(
            r"(?i)(?:每页\s*(\d+|[{cn}]+)|(\d+)\s*(?:条|行|rows?|items?)?\s*(?:每页|/页|per\s+page))",
            cn = CN_NUM
        ))?;

        Ok(Self {
            query_types,
            purposes,
            relative_time_zh,
            relative_time_en,
            absolute_range,
            current_period,
            sort_with_direction,
            sort_plain,
            sort_en,
            direction_desc,
            direction_asc,
            top_n,
            pagination,
            page_size,
            default_page_size: config.default_page_size.max(1),
            default_relative_value: config.default_relative_value,
        })
    }
}

lazy_static! {
    /// Built-in Chinese + English pattern set
    pub static ref DEFAULT_INTENT_PATTERNS: Arc<IntentPatterns> = Arc::new(
        IntentPatterns::compile(&IntentPatternConfig::default())
            .expect("built-in intent patterns compile")
    );
}
