//! User configuration.
//!
//! Settings are read from `~/.imagerylayer/config.ini`. Missing files and
//! missing keys fall back to the defaults; present values are validated and
//! rejected with [`ConfigFileError::InvalidValue`] when out of range.
//!
//! # Example
//!
//! ```
//! use imagerylayer::config::{ConfigFile, SchemeKind};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.provider.scheme, SchemeKind::WebMercator);
//!
//! let options = config.layer_options();
//! assert!(options.validate().is_ok());
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, FailureSettings, LayerSettings, NetworkSettings, ProviderSettings, SchemeKind,
    DEFAULT_FAILED_TILE_RETRY_SECS, DEFAULT_PROVIDER_MAX_LEVEL,
};
