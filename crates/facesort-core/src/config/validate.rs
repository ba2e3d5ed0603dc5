//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.parallel == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel must be > 0".into(),
            ));
        }
        if self.limits.max_payload_mb <= 0.0 {
            return Err(ConfigError::ValidationError(
                "limits.max_payload_mb must be > 0".into(),
            ));
        }
        if self.limits.max_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_dimension must be > 0".into(),
            ));
        }
        if self.limits.vision_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.vision_timeout_ms must be > 0".into(),
            ));
        }
        if self.vision.t_exact_seconds <= 0 {
            return Err(ConfigError::ValidationError(
                "vision.t_exact_seconds must be > 0".into(),
            ));
        }
        if self.vision.t_high_seconds <= 0 {
            return Err(ConfigError::ValidationError(
                "vision.t_high_seconds must be > 0".into(),
            ));
        }
        if self.vision.t_exact_seconds > self.vision.t_high_seconds {
            return Err(ConfigError::ValidationError(
                "vision.t_exact_seconds must be <= vision.t_high_seconds".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vision.cluster_threshold) {
            return Err(ConfigError::ValidationError(
                "vision.cluster_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vision.match_threshold) {
            return Err(ConfigError::ValidationError(
                "vision.match_threshold must be between 0.0 and 1.0".into(),
            ));
        }
        if self.cache.flush_interval == 0 {
            return Err(ConfigError::ValidationError(
                "cache.flush_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel() {
        let mut config = Config::default();
        config.processing.parallel = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel"));
    }

    #[test]
    fn test_validate_rejects_inverted_timestamp_windows() {
        let mut config = Config::default();
        config.vision.t_exact_seconds = 40;
        config.vision.t_high_seconds = 30;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("t_exact_seconds"));
    }

    #[test]
    fn test_validate_rejects_invalid_match_threshold() {
        let mut config = Config::default();
        config.vision.match_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("match_threshold"));

        config.vision.match_threshold = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("match_threshold"));
    }

    #[test]
    fn test_validate_rejects_zero_flush_interval() {
        let mut config = Config::default();
        config.cache.flush_interval = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flush_interval"));
    }
}
