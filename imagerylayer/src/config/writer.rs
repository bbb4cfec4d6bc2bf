//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`, and the flat
//! `key = value` listing shown by `imagerylayer config list`.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let extent = format_extent(config);
    let subdomains = config.provider.subdomains.join(",");

    format!(
        r#"[provider]
; Tile URL template. Placeholders:
;   {{x}}, {{y}}, {{z}}  - tile column, row (north origin) and level
;   {{reverseY}}       - tile row counted from the south edge
;   {{s}}              - one of the configured subdomains
url = {}
; Tiling scheme of the provider's tiles:
;   webmercator - EPSG:3857 square tiles (most web map services)
;   geographic  - EPSG:4326 with two root tiles
scheme = {}
; Finest level the provider serves
max_level = {}
; Tile width in pixels (tiles are square)
tile_width = {}
; Comma-separated subdomains substituted for {{s}} (e.g. a,b,c)
subdomains = {}

[layer]
; Bound on the imagery shown: west,south,east,north in degrees
; Leave empty to cover the whole globe
extent = {}
; Target texels per unit of terrain geometric error (default: 1.0)
; Larger values select coarser imagery
max_screen_space_error = {}
; Layer opacity between 0 and 1
alpha = {}

[failure]
; Consecutive failed requests before the layer stops requesting
max_tile_fail_count = {}
; Attempts per tile before it is given up
per_tile_max_fail_count = {}
; Seconds before a failed tile or an open circuit is retried
failed_tile_retry_secs = {}

[network]
; Concurrent requests allowed against a single host
max_requests_per_host = {}
; Request timeout in seconds
timeout = {}
"#,
        config.provider.url,
        config.provider.scheme,
        config.provider.max_level,
        config.provider.tile_width,
        subdomains,
        extent,
        config.layer.max_screen_space_error,
        config.layer.alpha,
        config.failure.max_tile_fail_count,
        config.failure.per_tile_max_fail_count,
        config.failure.failed_tile_retry_secs,
        config.network.max_requests_per_host,
        config.network.timeout,
    )
}

/// Flatten a `ConfigFile` into `(section.key, value)` pairs in file order.
pub(super) fn config_entries(config: &ConfigFile) -> Vec<(String, String)> {
    let entry = |key: &str, value: String| (key.to_string(), value);

    vec![
        entry("provider.url", config.provider.url.clone()),
        entry("provider.scheme", config.provider.scheme.to_string()),
        entry("provider.max_level", config.provider.max_level.to_string()),
        entry("provider.tile_width", config.provider.tile_width.to_string()),
        entry("provider.subdomains", config.provider.subdomains.join(",")),
        entry("layer.extent", format_extent(config)),
        entry(
            "layer.max_screen_space_error",
            config.layer.max_screen_space_error.to_string(),
        ),
        entry("layer.alpha", config.layer.alpha.to_string()),
        entry(
            "failure.max_tile_fail_count",
            config.failure.max_tile_fail_count.to_string(),
        ),
        entry(
            "failure.per_tile_max_fail_count",
            config.failure.per_tile_max_fail_count.to_string(),
        ),
        entry(
            "failure.failed_tile_retry_secs",
            config.failure.failed_tile_retry_secs.to_string(),
        ),
        entry(
            "network.max_requests_per_host",
            config.network.max_requests_per_host.to_string(),
        ),
        entry("network.timeout", config.network.timeout.to_string()),
    ]
}

fn format_extent(config: &ConfigFile) -> String {
    config
        .layer
        .extent
        .map(|extent| {
            let (west, south, east, north) = extent.to_degrees();
            format!("{},{},{},{}", west, south, east, north)
        })
        .unwrap_or_default()
}

impl ConfigFile {
    /// Every setting as a `(section.key, value)` pair.
    pub fn entries(&self) -> Vec<(String, String)> {
        config_entries(self)
    }
}
