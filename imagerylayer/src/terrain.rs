//! Terrain-side collaborators.
//!
//! The layer only needs two things from terrain: how much geometric error a
//! terrain level tolerates, and somewhere to hang the imagery associations it
//! creates for a terrain tile.

use std::f64::consts::PI;

use crate::geo::{Ellipsoid, Extent, GeographicTilingScheme, TilingScheme};
use crate::layer::TileImagery;

/// Heightmap width assumed when estimating terrain error.
pub const DEFAULT_HEIGHTMAP_WIDTH: u32 = 64;

/// Fraction of a heightmap sample spacing accepted as geometric error.
const HEIGHTMAP_QUALITY: f64 = 0.25;

/// Source of terrain level-of-detail information.
pub trait TerrainProvider: Send + Sync {
    /// Maximum geometric error, in metres, of terrain tiles at `level`.
    fn level_maximum_geometric_error(&self, level: u32) -> f64;
}

/// Terrain provider for the bare ellipsoid surface.
///
/// Error starts at a quarter of the level-zero heightmap sample spacing and
/// halves with every level.
#[derive(Debug, Clone)]
pub struct EllipsoidTerrainProvider {
    level_zero_error: f64,
}

impl EllipsoidTerrainProvider {
    /// Creates a provider whose terrain tiles follow `tiling_scheme`.
    pub fn new(tiling_scheme: &dyn TilingScheme) -> Self {
        Self::with_heightmap_width(tiling_scheme, DEFAULT_HEIGHTMAP_WIDTH)
    }

    pub fn with_heightmap_width(tiling_scheme: &dyn TilingScheme, heightmap_width: u32) -> Self {
        Self {
            level_zero_error: level_zero_maximum_geometric_error(
                tiling_scheme.ellipsoid(),
                heightmap_width,
                tiling_scheme.number_of_level_zero_tiles_x(),
            ),
        }
    }
}

impl Default for EllipsoidTerrainProvider {
    fn default() -> Self {
        Self::new(&GeographicTilingScheme::new())
    }
}

impl TerrainProvider for EllipsoidTerrainProvider {
    fn level_maximum_geometric_error(&self, level: u32) -> f64 {
        self.level_zero_error / f64::from(1u32 << level.min(31))
    }
}

/// Level-zero geometric error estimate for a heightmap of the given width.
pub fn level_zero_maximum_geometric_error(
    ellipsoid: &Ellipsoid,
    heightmap_width: u32,
    level_zero_tiles_x: u32,
) -> f64 {
    ellipsoid.maximum_radius() * 2.0 * PI * HEIGHTMAP_QUALITY
        / (f64::from(heightmap_width) * f64::from(level_zero_tiles_x))
}

/// A terrain tile and the imagery draped over it.
///
/// The tile owns its [`TileImagery`] associations. They hold counted cache
/// references, so a terrain tile must be handed back to its layer with
/// [`ImageryLayer::release_terrain_tile`](crate::layer::ImageryLayer::release_terrain_tile)
/// rather than simply dropped.
#[derive(Debug)]
pub struct TerrainTile {
    pub x: u32,
    pub y: u32,
    pub level: u32,
    pub extent: Extent,
    pub imagery: Vec<TileImagery>,
}

impl TerrainTile {
    pub fn new(x: u32, y: u32, level: u32, extent: Extent) -> Self {
        Self {
            x,
            y,
            level,
            extent,
            imagery: Vec::new(),
        }
    }

    /// Creates the tile at (`x`, `y`, `level`) of `tiling_scheme`.
    pub fn from_scheme(tiling_scheme: &dyn TilingScheme, x: u32, y: u32, level: u32) -> Self {
        Self::new(x, y, level, tiling_scheme.tile_xy_to_extent(x, y, level))
    }

    /// Whether any imagery is associated with the tile.
    pub fn has_imagery(&self) -> bool {
        !self.imagery.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_zero_error_for_geographic_wgs84() {
        let provider = EllipsoidTerrainProvider::default();
        let expected = 6_378_137.0 * 2.0 * PI * 0.25 / (64.0 * 2.0);
        assert!((provider.level_maximum_geometric_error(0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_error_halves_per_level() {
        let provider = EllipsoidTerrainProvider::default();
        let zero = provider.level_maximum_geometric_error(0);
        assert!((provider.level_maximum_geometric_error(1) - zero / 2.0).abs() < 1e-9);
        assert!((provider.level_maximum_geometric_error(4) - zero / 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_scheme_uses_tile_extent() {
        let scheme = GeographicTilingScheme::new();
        let tile = TerrainTile::from_scheme(&scheme, 1, 0, 0);
        assert_eq!(tile.extent, scheme.tile_xy_to_extent(1, 0, 0));
        assert!(!tile.has_imagery());
    }
}
