//! Tiling schemes: how a provider's imagery is cut into tiles per level.

use std::f64::consts::PI;
use std::fmt;

use super::{
    geodetic_latitude_to_mercator_angle, mercator_angle_to_geodetic_latitude, Cartographic,
    Ellipsoid, Extent, MAX_MERCATOR_LAT,
};

/// An extent expressed in a tiling scheme's native coordinates.
///
/// Units depend on the scheme (radians or metres), so it is deliberately a
/// separate type from [`Extent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl NativeExtent {
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

/// Describes how the globe is divided into tiles at each level.
///
/// Tile `x` grows eastward, tile `y` grows southward, and each level doubles
/// the number of tiles along both axes.
pub trait TilingScheme: Send + Sync + fmt::Debug {
    /// The geographic extent covered by the scheme.
    fn extent(&self) -> &Extent;

    /// The ellipsoid the scheme is defined on.
    fn ellipsoid(&self) -> &Ellipsoid;

    fn number_of_level_zero_tiles_x(&self) -> u32;

    fn number_of_level_zero_tiles_y(&self) -> u32;

    /// # Panics
    ///
    /// Panics if the tile count at `level` does not fit a tile index.
    fn number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.number_of_level_zero_tiles_x(), level)
    }

    /// # Panics
    ///
    /// Panics if the tile count at `level` does not fit a tile index.
    fn number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.number_of_level_zero_tiles_y(), level)
    }

    /// Tile counts along x and y at `level`, or `None` if either overflows
    /// a tile index.
    fn checked_tile_counts(&self, level: u32) -> Option<(u32, u32)> {
        Some((
            checked_tiles_at_level(self.number_of_level_zero_tiles_x(), level)?,
            checked_tiles_at_level(self.number_of_level_zero_tiles_y(), level)?,
        ))
    }

    /// True if native coordinates are geographic, so no reprojection is
    /// needed to drape the imagery on geographic terrain.
    fn is_geographic(&self) -> bool;

    /// Converts a geographic extent into native coordinates.
    fn extent_to_native_extent(&self, extent: &Extent) -> NativeExtent;

    /// Native extent of the tile at `(x, y, level)`.
    fn tile_xy_to_native_extent(&self, x: u32, y: u32, level: u32) -> NativeExtent;

    /// Geographic extent of the tile at `(x, y, level)`.
    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent;

    /// Finds the tile containing `position` at `level`.
    ///
    /// Returns `None` when the position lies outside the scheme's extent or
    /// `level` is too deep to index.
    /// Positions on the scheme's east or south border resolve to the last
    /// tile rather than one past it.
    fn position_to_tile_xy(&self, position: Cartographic, level: u32) -> Option<(u32, u32)>;
}

fn checked_tiles_at_level(level_zero: u32, level: u32) -> Option<u32> {
    level_zero
        .checked_shl(level)
        .filter(|count| count >> level == level_zero)
}

fn tiles_at_level(level_zero: u32, level: u32) -> u32 {
    checked_tiles_at_level(level_zero, level).unwrap_or_else(|| {
        panic!(
            "level {} overflows the tile index ({} level-zero tiles)",
            level, level_zero
        )
    })
}

fn contains(extent: &Extent, position: &Cartographic) -> bool {
    position.longitude >= extent.west
        && position.longitude <= extent.east
        && position.latitude >= extent.south
        && position.latitude <= extent.north
}

fn clamp_index(value: f64, count: u32) -> u32 {
    if value <= 0.0 {
        0
    } else {
        (value as u32).min(count - 1)
    }
}

/// Equirectangular tiling where native coordinates are radians.
#[derive(Debug, Clone)]
pub struct GeographicTilingScheme {
    ellipsoid: Ellipsoid,
    extent: Extent,
    level_zero_tiles_x: u32,
    level_zero_tiles_y: u32,
}

impl GeographicTilingScheme {
    /// Creates the conventional 2×1 whole-globe scheme on WGS84.
    pub fn new() -> Self {
        Self::with_tiles(2, 1)
    }

    /// Creates a whole-globe scheme with a custom level-zero grid.
    ///
    /// # Panics
    ///
    /// Panics if either tile count is zero.
    pub fn with_tiles(level_zero_tiles_x: u32, level_zero_tiles_y: u32) -> Self {
        assert!(
            level_zero_tiles_x > 0 && level_zero_tiles_y > 0,
            "level-zero tile counts must be > 0"
        );
        Self {
            ellipsoid: Ellipsoid::WGS84,
            extent: Extent::MAX_VALUE,
            level_zero_tiles_x,
            level_zero_tiles_y,
        }
    }

    /// Restricts the scheme to a sub-extent of the globe.
    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    /// Uses a different ellipsoid.
    pub fn with_ellipsoid(mut self, ellipsoid: Ellipsoid) -> Self {
        self.ellipsoid = ellipsoid;
        self
    }
}

impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl TilingScheme for GeographicTilingScheme {
    fn extent(&self) -> &Extent {
        &self.extent
    }

    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn number_of_level_zero_tiles_x(&self) -> u32 {
        self.level_zero_tiles_x
    }

    fn number_of_level_zero_tiles_y(&self) -> u32 {
        self.level_zero_tiles_y
    }

    fn is_geographic(&self) -> bool {
        true
    }

    fn extent_to_native_extent(&self, extent: &Extent) -> NativeExtent {
        NativeExtent {
            west: extent.west,
            south: extent.south,
            east: extent.east,
            north: extent.north,
        }
    }

    fn tile_xy_to_native_extent(&self, x: u32, y: u32, level: u32) -> NativeExtent {
        let extent = self.tile_xy_to_extent(x, y, level);
        self.extent_to_native_extent(&extent)
    }

    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent {
        let x_tiles = self.number_of_x_tiles_at_level(level) as f64;
        let y_tiles = self.number_of_y_tiles_at_level(level) as f64;

        let tile_width = self.extent.width() / x_tiles;
        let west = self.extent.west + x as f64 * tile_width;
        let east = west + tile_width;

        let tile_height = self.extent.height() / y_tiles;
        let north = self.extent.north - y as f64 * tile_height;
        let south = north - tile_height;

        Extent {
            west,
            south,
            east,
            north,
        }
    }

    fn position_to_tile_xy(&self, position: Cartographic, level: u32) -> Option<(u32, u32)> {
        if !contains(&self.extent, &position) {
            return None;
        }

        let (x_tiles, y_tiles) = self.checked_tile_counts(level)?;

        let tile_width = self.extent.width() / x_tiles as f64;
        let tile_height = self.extent.height() / y_tiles as f64;

        let x = clamp_index((position.longitude - self.extent.west) / tile_width, x_tiles);
        let y = clamp_index((self.extent.north - position.latitude) / tile_height, y_tiles);

        Some((x, y))
    }
}

/// Web Mercator tiling where native coordinates are metres.
#[derive(Debug, Clone)]
pub struct WebMercatorTilingScheme {
    ellipsoid: Ellipsoid,
    extent: Extent,
    semimajor_axis_times_pi: f64,
    level_zero_tiles_x: u32,
    level_zero_tiles_y: u32,
}

impl WebMercatorTilingScheme {
    /// Creates the conventional single-root-tile scheme on WGS84.
    pub fn new() -> Self {
        Self::with_ellipsoid(Ellipsoid::WGS84)
    }

    pub fn with_ellipsoid(ellipsoid: Ellipsoid) -> Self {
        let max_lat = MAX_MERCATOR_LAT.to_radians();
        Self {
            ellipsoid,
            extent: Extent {
                west: -PI,
                south: -max_lat,
                east: PI,
                north: max_lat,
            },
            semimajor_axis_times_pi: ellipsoid.maximum_radius() * PI,
            level_zero_tiles_x: 1,
            level_zero_tiles_y: 1,
        }
    }

    /// Projects a geographic position to Web Mercator metres.
    pub fn project(&self, position: Cartographic) -> (f64, f64) {
        let radius = self.ellipsoid.maximum_radius();
        (
            position.longitude * radius,
            geodetic_latitude_to_mercator_angle(position.latitude) * radius,
        )
    }

    /// Inverse of [`project`](Self::project).
    pub fn unproject(&self, x: f64, y: f64) -> Cartographic {
        let one_over_radius = 1.0 / self.ellipsoid.maximum_radius();
        Cartographic::new(
            x * one_over_radius,
            mercator_angle_to_geodetic_latitude(y * one_over_radius),
        )
    }
}

impl Default for WebMercatorTilingScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl TilingScheme for WebMercatorTilingScheme {
    fn extent(&self) -> &Extent {
        &self.extent
    }

    fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    fn number_of_level_zero_tiles_x(&self) -> u32 {
        self.level_zero_tiles_x
    }

    fn number_of_level_zero_tiles_y(&self) -> u32 {
        self.level_zero_tiles_y
    }

    fn is_geographic(&self) -> bool {
        false
    }

    fn extent_to_native_extent(&self, extent: &Extent) -> NativeExtent {
        let (west, south) = self.project(Cartographic::new(extent.west, extent.south));
        let (east, north) = self.project(Cartographic::new(extent.east, extent.north));
        NativeExtent {
            west,
            south,
            east,
            north,
        }
    }

    fn tile_xy_to_native_extent(&self, x: u32, y: u32, level: u32) -> NativeExtent {
        let x_tiles = self.number_of_x_tiles_at_level(level) as f64;
        let y_tiles = self.number_of_y_tiles_at_level(level) as f64;

        let span = 2.0 * self.semimajor_axis_times_pi;
        let tile_width = span / x_tiles;
        let tile_height = span / y_tiles;

        let west = -self.semimajor_axis_times_pi + x as f64 * tile_width;
        let north = self.semimajor_axis_times_pi - y as f64 * tile_height;

        NativeExtent {
            west,
            south: north - tile_height,
            east: west + tile_width,
            north,
        }
    }

    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent {
        let native = self.tile_xy_to_native_extent(x, y, level);
        let southwest = self.unproject(native.west, native.south);
        let northeast = self.unproject(native.east, native.north);
        Extent {
            west: southwest.longitude,
            south: southwest.latitude,
            east: northeast.longitude,
            north: northeast.latitude,
        }
    }

    fn position_to_tile_xy(&self, position: Cartographic, level: u32) -> Option<(u32, u32)> {
        if !contains(&self.extent, &position) {
            return None;
        }

        let (x_tiles, y_tiles) = self.checked_tile_counts(level)?;

        let span = 2.0 * self.semimajor_axis_times_pi;
        let tile_width = span / x_tiles as f64;
        let tile_height = span / y_tiles as f64;

        let (mx, my) = self.project(position);
        let x = clamp_index((mx + self.semimajor_axis_times_pi) / tile_width, x_tiles);
        let y = clamp_index((self.semimajor_axis_times_pi - my) / tile_height, y_tiles);

        Some((x, y))
    }
}
