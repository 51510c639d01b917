//! Pipeline configuration
//!
//! One JSON document with a section per stage; every field has a default so a
//! partial file (or none at all) is valid. `NL2SQL_PROFILE` and
//! `NL2SQL_LANGUAGE` override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::entity::EntityRuleConfig;
use crate::error::Result;
use crate::generator::GeneratorConfig;
use crate::intent::patterns::IntentPatternConfig;
use crate::normalizer::NormalizerConfig;
use crate::tokenizer::TokenizerConfig;

pub const PROFILE_ENV: &str = "NL2SQL_PROFILE";
pub const LANGUAGE_ENV: &str = "NL2SQL_LANGUAGE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    pub tokenizer: TokenizerConfig,
    pub intent: IntentPatternConfig,
    pub entity: EntityRuleConfig,
    pub generator: GeneratorConfig,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading pipeline config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Apply `NL2SQL_PROFILE` / `NL2SQL_LANGUAGE` when set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(
            std::env::var(PROFILE_ENV).ok().as_deref(),
            std::env::var(LANGUAGE_ENV).ok().as_deref(),
        )
    }

    /// Override the normalizer profile and tokenizer language by name
    pub fn with_overrides(mut self, profile: Option<&str>, language: Option<&str>) -> Result<Self> {
        if let Some(profile) = profile.filter(|p| !p.trim().is_empty()) {
            self.normalizer.profile = profile.parse()?;
        }
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            self.tokenizer.language = language.parse()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NlSqlError;
    use crate::normalizer::NormalizerProfile;
    use crate::tokenizer::TokenizerLanguage;

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json(
            r#"{"normalizer": {"profile": "sql-aware"}, "generator": {"alternatives": false}}"#,
        )
        .unwrap();
        assert_eq!(config.normalizer.profile, NormalizerProfile::SqlAware);
        assert!(config.normalizer.lowercase);
        assert!(!config.generator.alternatives);
        assert!(config.generator.syntax_check);
        assert_eq!(config.intent, IntentPatternConfig::default());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = PipelineConfig::default()
            .with_overrides(Some("chinese"), Some("zh"))
            .unwrap();
        assert_eq!(config.normalizer.profile, NormalizerProfile::Chinese);
        assert_eq!(config.tokenizer.language, TokenizerLanguage::Zh);

        let unchanged = PipelineConfig::default().with_overrides(None, Some("  ")).unwrap();
        assert_eq!(unchanged, PipelineConfig::default());

        let err = PipelineConfig::default().with_overrides(Some("klingon"), None);
        assert!(matches!(err, Err(NlSqlError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/nl2sql.json");
        assert!(matches!(err, Err(NlSqlError::Io(_))));
    }
}
