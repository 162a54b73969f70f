use thiserror::Error;

use super::types::Config;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file does not exist.
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// Config file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Config parsed but contains invalid values.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Validate cross-field constraints that serde defaults cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.max_concurrent_tasks == 0 {
        return Err(ConfigError::Invalid(
            "engine.max_concurrent_tasks must be at least 1".to_string(),
        ));
    }

    if config.engine.temp_dir == config.engine.results_dir {
        return Err(ConfigError::Invalid(
            "engine.temp_dir and engine.results_dir must differ: the janitor owns the temp root"
                .to_string(),
        ));
    }

    let mem = config.resources.max_memory_percent;
    if !(0.0..=100.0).contains(&mem) || mem == 0.0 {
        return Err(ConfigError::Invalid(format!(
            "resources.max_memory_percent must be in (0, 100], got {}",
            mem
        )));
    }

    if config.ffmpeg.timeout_per_duration_factor <= 0.0 {
        return Err(ConfigError::Invalid(
            "ffmpeg.timeout_per_duration_factor must be positive".to_string(),
        ));
    }

    if config.subtitle.min_cue_secs <= 0.0
        || config.subtitle.min_cue_secs > config.subtitle.max_cue_secs
    {
        return Err(ConfigError::Invalid(format!(
            "subtitle cue bounds invalid: min {} max {}",
            config.subtitle.min_cue_secs, config.subtitle.max_cue_secs
        )));
    }

    if config.resolver.max_remote_duration_secs <= 0.0
        || config.resolver.max_local_duration_secs <= 0.0
    {
        return Err(ConfigError::Invalid(
            "resolver duration ceilings must be positive".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = Config::default();
        config.engine.max_concurrent_tasks = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_shared_roots_rejected() {
        let mut config = Config::default();
        config.engine.results_dir = config.engine.temp_dir.clone();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cue_bounds_rejected() {
        let mut config = Config::default();
        config.subtitle.min_cue_secs = 10.0;
        config.subtitle.max_cue_secs = 2.0;
        assert!(validate_config(&config).is_err());
    }
}
