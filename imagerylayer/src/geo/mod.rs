//! Geometry collaborators for imagery resolution.
//!
//! Provides geographic extents, the reference ellipsoid, and the two tiling
//! schemes imagery providers are laid out in: equirectangular geographic
//! tiles and Web Mercator tiles.
//!
//! All angles are radians. "Native" coordinates are whatever the tiling
//! scheme works in internally: radians for [`GeographicTilingScheme`],
//! metres for [`WebMercatorTilingScheme`].

mod ellipsoid;
mod extent;
mod tiling;

pub use ellipsoid::Ellipsoid;
pub use extent::{Cartographic, Extent};
pub use tiling::{
    GeographicTilingScheme, NativeExtent, TilingScheme, WebMercatorTilingScheme,
};

use thiserror::Error;

/// Maximum latitude representable in Web Mercator, in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Deepest tile level supported. Two level-zero columns doubled this many
/// times still fit a `u32` tile index.
pub const MAX_TILE_LEVEL: u32 = 30;

/// Tolerance used when comparing tile edges against extent edges.
pub const EPSILON10: f64 = 1e-10;

/// Errors raised for malformed geometric input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// An extent's bounds are out of range or inverted.
    #[error("Invalid extent {extent}: {reason}")]
    InvalidExtent {
        extent: Extent,
        reason: &'static str,
    },
}

/// Projects a latitude onto the Web Mercator Y axis of a unit sphere.
///
/// Latitudes beyond [`MAX_MERCATOR_LAT`] are clamped first.
#[inline]
pub fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
    let max = MAX_MERCATOR_LAT.to_radians();
    let latitude = latitude.clamp(-max, max);
    let sin_latitude = latitude.sin();
    0.5 * ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln()
}

/// Inverse of [`geodetic_latitude_to_mercator_angle`].
#[inline]
pub fn mercator_angle_to_geodetic_latitude(mercator_angle: f64) -> f64 {
    std::f64::consts::FRAC_PI_2 - 2.0 * (-mercator_angle).exp().atan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_equator_is_zero() {
        assert!(geodetic_latitude_to_mercator_angle(0.0).abs() < 1e-15);
    }

    #[test]
    fn test_mercator_max_latitude_is_pi() {
        let angle = geodetic_latitude_to_mercator_angle(MAX_MERCATOR_LAT.to_radians());
        assert!(
            (angle - std::f64::consts::PI).abs() < 1e-9,
            "Max mercator latitude should project to pi, got {}",
            angle
        );
    }

    #[test]
    fn test_mercator_clamps_poles() {
        let pole = geodetic_latitude_to_mercator_angle(std::f64::consts::FRAC_PI_2);
        assert!(pole.is_finite());
    }

    #[test]
    fn test_mercator_roundtrip_at_different_latitudes() {
        for degrees in [-80.0, -45.0, -1.0, 0.0, 12.5, 51.5074, 85.0] {
            let latitude = f64::to_radians(degrees);
            let angle = geodetic_latitude_to_mercator_angle(latitude);
            let back = mercator_angle_to_geodetic_latitude(angle);
            assert!(
                (back - latitude).abs() < 1e-12,
                "Latitude {} should roundtrip, got {}",
                degrees,
                back.to_degrees()
            );
        }
    }

    #[test]
    fn test_geo_error_display() {
        let err = Extent::from_degrees(0.0, 10.0, 5.0, -10.0).unwrap_err();
        assert!(err.to_string().contains("south must not exceed north"));
    }
}
