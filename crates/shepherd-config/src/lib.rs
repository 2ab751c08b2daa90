mod model;
mod raw;

use std::path::{Path, PathBuf};

pub use model::{Config, LogSinkConfig, Settings};

/// File names probed, in order, when no path is given.
pub const DEFAULT_FILENAMES: [&str; 2] = ["shepherd.toml", ".shepherd.toml"];

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "toml")]
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error(s): {0}")]
    Validation(String),

    #[error("no configuration file found in {0}")]
    NotFound(PathBuf),
}

/// Find the first default configuration file inside `dir`.
///
/// # Errors
///
/// Returns `ConfigError::NotFound` if none of [`DEFAULT_FILENAMES`] exists.
pub fn discover(dir: &Path) -> Result<PathBuf, ConfigError> {
    DEFAULT_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound(dir.to_path_buf()))
}

/// Load a configuration from a file path.
///
/// Relative working directories are resolved against the file's directory.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration file cannot be read or parsed.
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    tracing::debug!("Loading configuration from {}", path.display());

    let text = std::fs::read_to_string(path)?;
    let config = parse_auto(&text, path)?;

    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    Ok(config.with_base_dir(&base))
}

/// Parse a configuration from a string, picking the format by extension.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
pub fn parse_auto(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml")]
        "toml" => parse_toml(text),
        _ => Err(ConfigError::Validation("unknown config extension".into())),
    }
}

/// Parse a TOML configuration.
///
/// # Errors
///
/// Returns a `ConfigError` if the configuration string cannot be parsed.
#[cfg(feature = "toml")]
pub fn parse_toml(config: &str) -> Result<Config, ConfigError> {
    let raw_config = toml::from_str::<raw::RawConfig>(config)?;
    raw_config.try_into()
}
