//! Text Normalizer - first stage of the NL→SQL pipeline
//!
//! Produces a canonical form of the user's question so that every later stage
//! can work with a single spelling of punctuation, width and whitespace:
//! 1. Lower-casing (configurable, never applied by `exact-match`)
//! 2. Full-width → half-width conversion (`，` → `,`, `１０` → `10`)
//! 3. Whitespace runs collapsed to one space
//! 4. Punctuation stripped or canonicalized depending on the profile
//!
//! Normalization is a pure function and never fails; empty input produces an
//! empty `NormalizedText` with `Language::Unknown`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NlSqlError;

/// Detected script mix of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    Zh,
    En,
    Mixed,
    Unknown,
}

/// Output of the normalizer. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub original: String,
    pub normalized: String,
    pub language: Language,
}

impl NormalizedText {
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Length of the normalized text in characters (the unit of every offset)
    pub fn char_len(&self) -> usize {
        self.normalized.chars().count()
    }
}

/// Normalization profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizerProfile {
    #[default]
    Default,
    /// Keeps partial SQL intact: keywords upper-cased, operators padded
    SqlAware,
    /// Removes the spaces users sometimes type between CJK characters
    Chinese,
    /// Width and whitespace only
    ExactMatch,
}

impl FromStr for NormalizerProfile {
    type Err = NlSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "sql-aware" | "sql_aware" => Ok(Self::SqlAware),
            "chinese" | "zh" => Ok(Self::Chinese),
            "exact-match" | "exact_match" | "exact" => Ok(Self::ExactMatch),
            other => Err(NlSqlError::Config(format!(
                "Unknown normalizer profile: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for NormalizerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::SqlAware => "sql-aware",
            Self::Chinese => "chinese",
            Self::ExactMatch => "exact-match",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub profile: NormalizerProfile,
    pub lowercase: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            profile: NormalizerProfile::Default,
            lowercase: true,
        }
    }
}

/// Keywords and functions kept verbatim (upper-cased) by the `sql-aware` profile
const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "group", "by", "order", "limit", "offset", "and", "or", "not",
    "in", "like", "is", "null", "between", "having", "distinct", "as", "asc", "desc", "count",
    "sum", "avg", "max", "min",
];

/// Operator spellings padded with spaces by the `sql-aware` profile, longest first
const SQL_OPERATORS: &[&str] = &[">=", "<=", "!=", "<>", "=", ">", "<", ",", "(", ")", "*"];

/// True for characters of the CJK unified ideograph blocks
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Detect the language of an already-normalized string
pub fn detect_language(text: &str) -> Language {
    let has_cjk = text.chars().any(is_cjk);
    let has_latin = text.chars().any(|c| c.is_ascii_alphabetic());
    match (has_cjk, has_latin) {
        (true, true) => Language::Mixed,
        (true, false) => Language::Zh,
        (false, true) => Language::En,
        (false, false) => Language::Unknown,
    }
}

pub struct Normalizer {
    config: NormalizerConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn with_profile(profile: NormalizerProfile) -> Self {
        Self::new(NormalizerConfig {
            profile,
            ..NormalizerConfig::default()
        })
    }

    pub fn profile(&self) -> NormalizerProfile {
        self.config.profile
    }

    pub fn normalize(&self, raw: &str) -> NormalizedText {
        if raw.trim().is_empty() {
            return NormalizedText {
                original: raw.to_string(),
                normalized: String::new(),
                language: Language::Unknown,
            };
        }

        let profile = self.config.profile;

        let mut text = if self.config.lowercase && profile != NormalizerProfile::ExactMatch {
            raw.to_lowercase()
        } else {
            raw.to_string()
        };

        text = to_half_width(&text);
        text = collapse_whitespace(&text);

        text = match profile {
            NormalizerProfile::ExactMatch => text,
            NormalizerProfile::Default => strip_sentence_punctuation(&canonicalize_punctuation(&text)),
            NormalizerProfile::Chinese => {
                join_cjk_runs(&strip_sentence_punctuation(&canonicalize_punctuation(&text)))
            }
            NormalizerProfile::SqlAware => {
                let padded = pad_operators(&strip_sentence_punctuation(&canonicalize_punctuation(&text)));
                uppercase_sql_keywords(&padded)
            }
        };

        let normalized = collapse_whitespace(&text);
        let language = detect_language(&normalized);

        NormalizedText {
            original: raw.to_string(),
            normalized,
            language,
        }
    }
}

/// Convenience wrapper for the default config of a profile
pub fn normalize(raw: &str, profile: NormalizerProfile) -> NormalizedText {
    Normalizer::with_profile(profile).normalize(raw)
}

fn to_half_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map the CJK punctuation that has no full-width ASCII twin
fn canonicalize_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '。' => '.',
            '、' => ',',
            '“' | '”' | '「' | '」' | '《' | '》' => '"',
            '‘' | '’' => '\'',
            '【' => '[',
            '】' => ']',
            '～' => '~',
            '…' => ' ',
            _ => c,
        })
        .collect()
}

/// Drop `? ! ;` and any `.` that is not inside a token like `orders.id` or `3.5`
fn strip_sentence_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '?' | '!' | ';' => out.push(' '),
            '.' => {
                let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
                let next = chars.get(i + 1).copied();
                let inner = |ch: Option<char>| ch.map(|ch| ch.is_ascii_alphanumeric() || ch == '_').unwrap_or(false);
                if inner(prev) && inner(next) {
                    out.push('.');
                } else {
                    out.push(' ');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Remove a single space sitting between two CJK characters
fn join_cjk_runs(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' && i > 0 && i + 1 < chars.len() && is_cjk(chars[i - 1]) && is_cjk(chars[i + 1]) {
            continue;
        }
        out.push(c);
    }
    out
}

fn pad_operators(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;
    'outer: while !rest.is_empty() {
        for op in SQL_OPERATORS {
            if let Some(tail) = rest.strip_prefix(op) {
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Upper-case ASCII words that are SQL keywords. Works on ASCII letter runs so
/// a keyword glued to CJK text ("统计count") is still recognized.
fn uppercase_sql_keywords(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        if SQL_KEYWORDS.contains(&word.to_lowercase().as_str()) {
            out.push_str(&word.to_uppercase());
        } else {
            out.push_str(word);
        }
        word.clear();
    };

    let mut prev_ident = false;
    for c in text.chars() {
        if c.is_ascii_alphabetic() && !(word.is_empty() && prev_ident) {
            word.push(c);
            continue;
        }
        let in_ident = c.is_ascii_alphanumeric() || c == '_';
        if in_ident && !word.is_empty() {
            // letters followed by digits/underscore: an identifier, not a keyword
            out.push_str(&word);
            word.clear();
        } else {
            flush(&mut word, &mut out);
        }
        out.push(c);
        prev_ident = in_ident;
    }
    flush(&mut word, &mut out);
    out
}
