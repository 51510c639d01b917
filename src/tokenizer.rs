//! Tokenizer - splits normalized text into offset-carrying tokens
//!
//! Two strategies:
//! - `en`: whitespace split, punctuation peeled off into symbol tokens
//! - `zh`: script-run segmentation, so `查询orders前10条` yields
//!   `查询` / `orders` / `前` ... split wherever the script changes
//!
//! Offsets are character offsets into `NormalizedText::normalized`. The same
//! input always produces the same token sequence.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::NlSqlError;
use crate::normalizer::{is_cjk, Language, NormalizedText};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    /// Run of CJK ideographs
    Cjk,
    /// Latin identifier-like word (may contain digits, `_` and inner dots)
    Word,
    Number,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// Inclusive start, in characters
    pub start: usize,
    /// Exclusive end, in characters
    pub end: usize,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerLanguage {
    Zh,
    En,
    #[default]
    Auto,
}

impl FromStr for TokenizerLanguage {
    type Err = NlSqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" | "chinese" => Ok(Self::Zh),
            "en" | "english" => Ok(Self::En),
            "auto" => Ok(Self::Auto),
            other => Err(NlSqlError::Config(format!("Unknown tokenizer language: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub language: TokenizerLanguage,
}

/// Multi-character operators kept as one symbol token
const COMPOUND_SYMBOLS: &[&str] = &[">=", "<=", "!=", "<>"];

#[derive(Default)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    pub fn tokenize(&self, text: &NormalizedText) -> Vec<Token> {
        let language = match self.config.language {
            TokenizerLanguage::Auto => match text.language {
                Language::Zh | Language::Mixed => TokenizerLanguage::Zh,
                Language::En | Language::Unknown => TokenizerLanguage::En,
            },
            fixed => fixed,
        };
        scan(&text.normalized, language == TokenizerLanguage::Zh)
    }
}

/// Tokenize with an explicit language choice
pub fn tokenize(text: &NormalizedText, language: TokenizerLanguage) -> Vec<Token> {
    Tokenizer::new(TokenizerConfig { language }).tokenize(text)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Space,
    Cjk,
    Alnum,
    Symbol,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if is_cjk(c) {
        CharClass::Cjk
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Alnum
    } else {
        CharClass::Symbol
    }
}

/// Shared scanner. With `split_scripts` CJK and Latin runs become separate
/// tokens; without it only whitespace and symbols separate tokens.
fn scan(text: &str, split_scripts: bool) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let class = classify(chars[i]);
        match class {
            CharClass::Space => {
                i += 1;
            }
            CharClass::Symbol => {
                let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let len = if COMPOUND_SYMBOLS.contains(&two.as_str()) { 2 } else { 1 };
                tokens.push(Token {
                    text: chars[i..i + len].iter().collect(),
                    start: i,
                    end: i + len,
                    kind: TokenKind::Symbol,
                });
                i += len;
            }
            CharClass::Cjk | CharClass::Alnum => {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let next = classify(chars[i]);
                    let same_run = if split_scripts {
                        next == class
                    } else {
                        matches!(next, CharClass::Cjk | CharClass::Alnum)
                    };
                    // an inner dot belongs to the word: orders.id, 3.5
                    let inner_dot = chars[i] == '.'
                        && class == CharClass::Alnum
                        && classify(chars[i - 1]) == CharClass::Alnum
                        && chars.get(i + 1).map(|c| classify(*c) == CharClass::Alnum).unwrap_or(false);
                    if same_run || inner_dot {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().collect();
                let kind = if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    TokenKind::Number
                } else if word.chars().any(is_cjk) {
                    TokenKind::Cjk
                } else {
                    TokenKind::Word
                };
                tokens.push(Token {
                    text: word,
                    start,
                    end: i,
                    kind,
                });
            }
        }
    }

    tokens
}
