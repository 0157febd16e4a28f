use super::schema::CanvassConfig;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid error pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./canvass.yaml
    /// 2. ~/.canvass/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<CanvassConfig, ConfigError> {
        let local_config = PathBuf::from("./canvass.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".canvass").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(CanvassConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<CanvassConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<CanvassConfig, ConfigError> {
        let config: CanvassConfig = serde_yaml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &CanvassConfig) -> Result<(), ConfigError> {
        for pattern in &config.dispatch.error_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }

        let weight = config.scoring.inference_weight;
        if !(0.0..=1.0).contains(&weight) {
            return Err(ConfigError::Invalid {
                field: "scoring.inference_weight".into(),
                message: format!("{} is outside [0, 1]", weight),
            });
        }

        let similarity = config.learning.label_similarity;
        if !(0.0..=1.0).contains(&similarity) {
            return Err(ConfigError::Invalid {
                field: "learning.label_similarity".into(),
                message: format!("{} is outside [0, 1]", similarity),
            });
        }

        for def in &config.strategies {
            let threshold = def.criteria.threshold;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Invalid {
                    field: format!("strategies.{}.criteria.threshold", def.name),
                    message: format!("{} is outside [0, 1]", threshold),
                });
            }
        }

        Ok(())
    }
}
