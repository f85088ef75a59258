// Configuration management module
// Handles TOML configuration loading, validation, and derived paths

pub mod settings;

#[cfg(test)]
mod tests;

pub use settings::{ChatConfig, Config, ConfigError, EmbeddingsConfig, RetrievalConfig};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_config_dir()
}
