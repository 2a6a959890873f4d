use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::{DetectOptions, DetectOptionsError};
use crate::draw::{DrawError, OverlayStyle};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Style(#[from] DrawError),

    #[error(transparent)]
    Detect(#[from] DetectOptionsError),
}

/// Runtime knobs the shell may override. Every field has a default, so a
/// partial JSON object is fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: OverlayStyle,
    pub detect: DetectOptions,
    /// Keep the loaded detector around between scans.
    pub cache_detector: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: OverlayStyle::default(),
            detect: DetectOptions::default(),
            cache_detector: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.style.validate()?;
        self.detect.validate()?;
        Ok(())
    }
}
