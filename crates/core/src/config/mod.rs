//! Configuration: typed TOML file with `MIXDOWN_` environment overrides.

mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    Config, EngineConfig, FfmpegConfig, ResolverConfig, ResourceConfig, SanitizedConfig,
    ServerConfig, SubtitleConfig, TranscriberConfig,
};
pub use validate::{validate_config, ConfigError};
