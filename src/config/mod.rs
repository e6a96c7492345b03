pub mod loader;

use crate::cache::{NoopCache, ResultCache, TtlCache};
use crate::extractor::{ExtractionResult, ExtractionSettings};
use crate::filter::Strictness;
use crate::ordering::OrderingMode;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub use loader::{load_config, load_config_or_default};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub collaborator: CollaboratorConfig,
    pub extraction: ExtractionConfig,
    pub cache: CacheConfig,
    pub defaults: RequestDefaults,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub chunk_max_tokens: u32,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_seconds: 20,
            temperature: 0.0,
            max_tokens: 1800,
            chunk_max_tokens: 1500,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub single_call_threshold: usize,
    pub chunk_size: usize,
    pub concurrency: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let settings = ExtractionSettings::default();
        Self {
            single_call_threshold: settings.single_call_threshold,
            chunk_size: settings.chunk_size,
            concurrency: settings.concurrency,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 60,
        }
    }
}

/// Values used when a request leaves a field out.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RequestDefaults {
    pub filtering_strictness: Strictness,
    pub ordering: OrderingMode,
    pub compact: bool,
    pub use_chunking: bool,
    pub use_intelligent_selection: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            filtering_strictness: Strictness::Moderate,
            ordering: OrderingMode::Hybrid,
            compact: true,
            use_chunking: false,
            use_intelligent_selection: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.collaborator.endpoint).with_context(|| {
            format!(
                "collaborator.endpoint is not a valid URL: {}",
                self.collaborator.endpoint
            )
        })?;
        if self.collaborator.timeout_seconds == 0 {
            bail!("collaborator.timeout_seconds must be greater than zero");
        }
        if self.extraction.chunk_size == 0 {
            bail!("extraction.chunk_size must be greater than zero");
        }
        if self.extraction.concurrency == 0 {
            bail!("extraction.concurrency must be greater than zero");
        }
        Ok(())
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            single_call_threshold: self.extraction.single_call_threshold,
            chunk_size: self.extraction.chunk_size,
            concurrency: self.extraction.concurrency,
            call_timeout: Duration::from_secs(self.collaborator.timeout_seconds),
        }
    }

    pub fn build_cache(&self) -> Arc<dyn ResultCache<ExtractionResult>> {
        if self.cache.enabled {
            Arc::new(TtlCache::<ExtractionResult>::new(Duration::from_secs(
                self.cache.ttl_seconds,
            )))
        } else {
            Arc::new(NoopCache)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "collaborator:\n  model: gpt-4o\nextraction:\n  concurrency: 5\ndefaults:\n  ordering: rules\n  filtering_strictness: strict\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.collaborator.model, "gpt-4o");
        assert_eq!(config.collaborator.timeout_seconds, 20);
        assert_eq!(config.extraction.concurrency, 5);
        assert_eq!(config.extraction.chunk_size, 2500);
        assert_eq!(config.defaults.ordering, OrderingMode::Rules);
        assert_eq!(config.defaults.filtering_strictness, Strictness::Strict);
        assert!(config.cache.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.collaborator.endpoint = "::nope::".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_extraction_settings_follow_config() {
        let mut config = Config::default();
        config.collaborator.timeout_seconds = 7;
        config.extraction.single_call_threshold = 100;

        let settings = config.extraction_settings();
        assert_eq!(settings.call_timeout, Duration::from_secs(7));
        assert_eq!(settings.single_call_threshold, 100);
        assert_eq!(settings.concurrency, 3);
    }

    #[test]
    fn test_log_level_parsing() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        logging.level = "debug".to_string();
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
        logging.level = "chatty".to_string();
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }
}
