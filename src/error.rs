use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlSqlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    /// Internal state that should never be reachable from user input,
    /// e.g. an entity span that is empty or runs past the text.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NlSqlError>;
