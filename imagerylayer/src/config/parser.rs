//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::{ConfigFile, SchemeKind};
use crate::geo::{Extent, MAX_TILE_LEVEL};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [provider] section
    if let Some(section) = ini.section(Some("provider")) {
        if let Some(v) = section.get("url") {
            let v = v.trim();
            if !v.is_empty() {
                if !v.contains("{x}") || !(v.contains("{y}") || v.contains("{reverseY}")) {
                    return Err(invalid(
                        "provider",
                        "url",
                        v,
                        "must contain {x} and {y} or {reverseY} placeholders",
                    ));
                }
                config.provider.url = v.to_string();
            }
        }
        if let Some(v) = section.get("scheme") {
            config.provider.scheme = SchemeKind::from_str(v)
                .map_err(|_| invalid("provider", "scheme", v, "must be 'geographic' or 'webmercator'"))?;
        }
        if let Some(max_level) = parse_number::<u32>(section, "provider", "max_level", "must be a level between 0 and 30")? {
            if max_level > MAX_TILE_LEVEL {
                return Err(invalid(
                    "provider",
                    "max_level",
                    &max_level.to_string(),
                    "must be a level between 0 and 30",
                ));
            }
            config.provider.max_level = max_level;
        }
        if let Some(width) = parse_number::<u32>(section, "provider", "tile_width", "must be a positive integer (pixels)")? {
            if width == 0 {
                return Err(invalid("provider", "tile_width", "0", "must be a positive integer (pixels)"));
            }
            config.provider.tile_width = width;
        }
        if let Some(v) = section.get("subdomains") {
            config.provider.subdomains = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    // [layer] section
    if let Some(section) = ini.section(Some("layer")) {
        if let Some(v) = section.get("extent") {
            let v = v.trim();
            if !v.is_empty() {
                config.layer.extent = Some(parse_extent(v)?);
            }
        }
        if let Some(error) = parse_number::<f64>(section, "layer", "max_screen_space_error", "must be a positive number")? {
            if !(error.is_finite() && error > 0.0) {
                return Err(invalid(
                    "layer",
                    "max_screen_space_error",
                    &error.to_string(),
                    "must be a positive number",
                ));
            }
            config.layer.max_screen_space_error = error;
        }
        if let Some(alpha) = parse_number::<f64>(section, "layer", "alpha", "must be a number between 0 and 1")? {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(invalid(
                    "layer",
                    "alpha",
                    &alpha.to_string(),
                    "must be a number between 0 and 1",
                ));
            }
            config.layer.alpha = alpha;
        }
    }

    // [failure] section
    if let Some(section) = ini.section(Some("failure")) {
        if let Some(count) = parse_positive(section, "failure", "max_tile_fail_count")? {
            config.failure.max_tile_fail_count = count;
        }
        if let Some(count) = parse_positive(section, "failure", "per_tile_max_fail_count")? {
            config.failure.per_tile_max_fail_count = count;
        }
        if let Some(secs) = parse_number(section, "failure", "failed_tile_retry_secs", "must be a non-negative integer (seconds)")? {
            config.failure.failed_tile_retry_secs = secs;
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(max) = parse_number::<usize>(section, "network", "max_requests_per_host", "must be a positive integer")? {
            if max == 0 {
                return Err(invalid("network", "max_requests_per_host", "0", "must be a positive integer"));
            }
            config.network.max_requests_per_host = max;
        }
        if let Some(timeout) = parse_number(section, "network", "timeout", "must be a positive integer (seconds)")? {
            config.network.timeout = timeout;
        }
    }

    Ok(config)
}

/// Parses `w,s,e,n` in degrees.
pub(super) fn parse_extent(value: &str) -> Result<Extent, ConfigFileError> {
    let reason = "expected 'west,south,east,north' in degrees";
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid("layer", "extent", value, reason))?;

    let [west, south, east, north] = parts[..] else {
        return Err(invalid("layer", "extent", value, reason));
    };

    Extent::from_degrees(west, south, east, north)
        .map_err(|e| invalid("layer", "extent", value, &e.to_string()))
}

fn parse_number<N: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    reason: &str,
) -> Result<Option<N>, ConfigFileError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section_name, key, v, reason)),
        None => Ok(None),
    }
}

fn parse_positive(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<u32>, ConfigFileError> {
    let reason = "must be a positive integer";
    match parse_number::<u32>(section, section_name, key, reason)? {
        Some(0) => Err(invalid(section_name, key, "0", reason)),
        other => Ok(other),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
