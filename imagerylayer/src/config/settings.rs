//! Configuration structs and their defaults.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::admission::DEFAULT_MAX_REQUESTS_PER_HOST;
use crate::geo::{Extent, GeographicTilingScheme, TilingScheme, WebMercatorTilingScheme};
use crate::layer::{
    FailurePolicy, LayerOptions, DEFAULT_MAX_SCREEN_SPACE_ERROR, DEFAULT_MAX_TILE_FAIL_COUNT,
    DEFAULT_PER_TILE_MAX_FAIL_COUNT,
};
use crate::provider::{ARCGIS_TEMPLATE, DEFAULT_TILE_SIZE, DEFAULT_TIMEOUT_SECS};

/// Default finest level for the configured provider.
pub const DEFAULT_PROVIDER_MAX_LEVEL: u32 = 19;

/// Default seconds before a failed tile is retried.
pub const DEFAULT_FAILED_TILE_RETRY_SECS: u64 = 5;

/// Tiling scheme a provider's tiles are laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemeKind {
    Geographic,
    #[default]
    WebMercator,
}

impl SchemeKind {
    pub fn tiling_scheme(&self) -> Arc<dyn TilingScheme> {
        match self {
            SchemeKind::Geographic => Arc::new(GeographicTilingScheme::new()),
            SchemeKind::WebMercator => Arc::new(WebMercatorTilingScheme::new()),
        }
    }
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geographic" => Ok(SchemeKind::Geographic),
            "webmercator" | "web_mercator" | "mercator" => Ok(SchemeKind::WebMercator),
            other => Err(format!("unknown tiling scheme '{}'", other)),
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeKind::Geographic => write!(f, "geographic"),
            SchemeKind::WebMercator => write!(f, "webmercator"),
        }
    }
}

/// `[provider]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    /// URL template with `{x}`, `{y}`, `{z}`, `{reverseY}` and `{s}`.
    pub url: String,
    pub scheme: SchemeKind,
    pub max_level: u32,
    pub tile_width: u32,
    pub subdomains: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            url: ARCGIS_TEMPLATE.to_string(),
            scheme: SchemeKind::WebMercator,
            max_level: DEFAULT_PROVIDER_MAX_LEVEL,
            tile_width: DEFAULT_TILE_SIZE,
            subdomains: Vec::new(),
        }
    }
}

/// `[layer]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSettings {
    /// Optional bound on the imagery shown. `None` means the whole globe.
    pub extent: Option<Extent>,
    pub max_screen_space_error: f64,
    pub alpha: f64,
}

impl Default for LayerSettings {
    fn default() -> Self {
        Self {
            extent: None,
            max_screen_space_error: DEFAULT_MAX_SCREEN_SPACE_ERROR,
            alpha: 1.0,
        }
    }
}

/// `[failure]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureSettings {
    pub max_tile_fail_count: u32,
    pub per_tile_max_fail_count: u32,
    pub failed_tile_retry_secs: u64,
}

impl Default for FailureSettings {
    fn default() -> Self {
        Self {
            max_tile_fail_count: DEFAULT_MAX_TILE_FAIL_COUNT,
            per_tile_max_fail_count: DEFAULT_PER_TILE_MAX_FAIL_COUNT,
            failed_tile_retry_secs: DEFAULT_FAILED_TILE_RETRY_SECS,
        }
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    pub max_requests_per_host: usize,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_requests_per_host: DEFAULT_MAX_REQUESTS_PER_HOST,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub provider: ProviderSettings,
    pub layer: LayerSettings,
    pub failure: FailureSettings,
    pub network: NetworkSettings,
}

impl ConfigFile {
    /// Layer options described by the `[layer]` and `[failure]` sections.
    pub fn layer_options(&self) -> LayerOptions {
        LayerOptions::new()
            .with_extent(self.layer.extent.unwrap_or(Extent::MAX_VALUE))
            .with_max_screen_space_error(self.layer.max_screen_space_error)
            .with_alpha(self.layer.alpha)
            .with_failure_policy(FailurePolicy {
                max_tile_fail_count: self.failure.max_tile_fail_count,
                per_tile_max_fail_count: self.failure.per_tile_max_fail_count,
                failed_tile_retry_time: Duration::from_secs(self.failure.failed_tile_retry_secs),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.provider.url, ARCGIS_TEMPLATE);
        assert_eq!(config.provider.scheme, SchemeKind::WebMercator);
        assert_eq!(config.provider.max_level, 19);
        assert!(config.layer.extent.is_none());
        assert_eq!(config.network.max_requests_per_host, 6);
    }

    #[test]
    fn test_default_layer_options_match_layer_defaults() {
        assert_eq!(ConfigFile::default().layer_options(), LayerOptions::default());
    }

    #[test]
    fn test_scheme_kind_parsing() {
        assert_eq!("Geographic".parse(), Ok(SchemeKind::Geographic));
        assert_eq!("webmercator".parse(), Ok(SchemeKind::WebMercator));
        assert_eq!("web_mercator".parse(), Ok(SchemeKind::WebMercator));
        assert!("polar".parse::<SchemeKind>().is_err());
        assert_eq!(SchemeKind::Geographic.to_string(), "geographic");
    }

    #[test]
    fn test_scheme_kind_builds_matching_scheme() {
        assert!(SchemeKind::Geographic.tiling_scheme().is_geographic());
        assert!(!SchemeKind::WebMercator.tiling_scheme().is_geographic());
    }
}
