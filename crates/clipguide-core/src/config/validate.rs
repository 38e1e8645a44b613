//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::model::{Device, ModelName};

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.model.name.parse::<ModelName>() {
            return Err(ConfigError::ValidationError(format!("model.name: {e}")));
        }
        if let Err(e) = self.model.device.parse::<Device>() {
            return Err(ConfigError::ValidationError(format!("model.device: {e}")));
        }
        if self.model.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "model.cache_capacity must be > 0".into(),
            ));
        }
        if self.cutouts.cut_size == 0 {
            return Err(ConfigError::ValidationError(
                "cutouts.cut_size must be > 0".into(),
            ));
        }
        if self.cutouts.num_cutouts == 0 {
            return Err(ConfigError::ValidationError(
                "cutouts.num_cutouts must be > 0".into(),
            ));
        }
        let power = self.cutouts.cutout_size_power;
        if !power.is_finite() || power <= 0.0 {
            return Err(ConfigError::ValidationError(
                "cutouts.cutout_size_power must be a positive number".into(),
            ));
        }
        if !self.ranking.prompt_template.contains("{label}") {
            return Err(ConfigError::ValidationError(
                "ranking.prompt_template must contain {label}".into(),
            ));
        }
        let scale = self.ranking.logit_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::ValidationError(
                "ranking.logit_scale must be a positive number".into(),
            ));
        }
        if self.ranking.top_n == Some(0) {
            return Err(ConfigError::ValidationError(
                "ranking.top_n must be > 0 when set".into(),
            ));
        }
        if !matches!(
            self.logging.level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(ConfigError::ValidationError(
                "logging.level must be one of error, warn, info, debug, trace".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(
                "logging.format must be \"pretty\" or \"json\"".into(),
            ));
        }
        Ok(())
    }
}
