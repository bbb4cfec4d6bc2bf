//! Terrain tile to imagery tile mapping.

use std::f64::consts::PI;

use tracing::trace;

use super::ImageryLayer;
use crate::geo::{Ellipsoid, Extent, NativeExtent, TilingScheme, EPSILON10};
use crate::imagery::{ImageryRef, ImageryTileKey};
use crate::provider::ImageryProvider;
use crate::terrain::{TerrainProvider, TerrainTile};
use crate::texture::Texture;

/// One imagery tile draped over one terrain tile.
///
/// Texture coordinates are in the terrain tile's parametric space, where
/// `(0, 0)` is its southwest corner and `(1, 1)` its northeast corner.
#[derive(Debug)]
pub struct TileImagery {
    imagery: ImageryRef,
    /// Offset of the imagery tile's southwest corner.
    pub texture_translation: (f64, f64),
    /// Size of the imagery tile relative to the terrain tile.
    pub texture_scale: (f64, f64),
    /// Lower-left corner of the region this imagery may be sampled in.
    pub min_tex_coords: (f64, f64),
    /// Upper-right corner of the region this imagery may be sampled in.
    pub max_tex_coords: (f64, f64),
}

impl TileImagery {
    pub fn key(&self) -> ImageryTileKey {
        self.imagery.key()
    }

    pub fn imagery(&self) -> &ImageryRef {
        &self.imagery
    }

    pub(crate) fn into_imagery(self) -> ImageryRef {
        self.imagery
    }

    /// Area of the clip rectangle as a fraction of the terrain tile.
    pub fn clip_area(&self) -> f64 {
        (self.max_tex_coords.0 - self.min_tex_coords.0)
            * (self.max_tex_coords.1 - self.min_tex_coords.1)
    }
}

/// Inclusive rectangle of tile indices at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TileRange {
    pub west: u32,
    pub north: u32,
    pub east: u32,
    pub south: u32,
}

impl TileRange {
    pub fn len(&self) -> usize {
        ((self.east - self.west + 1) as usize) * ((self.south - self.north + 1) as usize)
    }
}

/// Ground distance covered by one texel of a level-zero tile at `latitude`.
pub(crate) fn level_zero_maximum_texel_spacing(
    ellipsoid: &Ellipsoid,
    tile_width: u32,
    level_zero_tiles_x: u32,
    latitude: f64,
) -> f64 {
    ellipsoid.maximum_radius() * 2.0 * PI * latitude.cos()
        / (f64::from(tile_width) * f64::from(level_zero_tiles_x))
}

/// Picks the imagery level whose texel spacing is closest to
/// `texel_spacing`, clamped to `[0, max_level]`.
///
/// Each level halves the spacing, so the level is the rounded base-2
/// logarithm of how many times finer than level zero the target is.
pub fn select_imagery_level(level_zero_spacing: f64, texel_spacing: f64, max_level: u32) -> u32 {
    let level = (level_zero_spacing / texel_spacing).log2().round();
    if level.is_nan() {
        return 0;
    }
    level.clamp(0.0, f64::from(max_level)) as u32
}

/// Tiles at `level` that overlap `extent` by more than a seam.
///
/// Returns `None` if `extent` lies outside the tiling scheme or if snapping
/// leaves no tile.
pub(crate) fn imagery_tile_range(
    tiling_scheme: &dyn TilingScheme,
    extent: &Extent,
    level: u32,
) -> Option<TileRange> {
    let (mut west, mut north) = tiling_scheme.position_to_tile_xy(extent.northwest(), level)?;
    let (mut east, mut south) = tiling_scheme.position_to_tile_xy(extent.southeast(), level)?;

    // A corner lying on a tile edge lands in the neighbouring tile, which
    // only touches the extent along the seam.
    let northwest_extent = tiling_scheme.tile_xy_to_extent(west, north, level);
    if (northwest_extent.south - extent.north).abs() < EPSILON10 {
        north += 1;
    }
    if (northwest_extent.east - extent.west).abs() < EPSILON10 {
        west += 1;
    }

    let southeast_extent = tiling_scheme.tile_xy_to_extent(east, south, level);
    if (southeast_extent.north - extent.south).abs() < EPSILON10 {
        south = south.checked_sub(1)?;
    }
    if (southeast_extent.west - extent.east).abs() < EPSILON10 {
        east = east.checked_sub(1)?;
    }

    if west > east || north > south {
        return None;
    }

    Some(TileRange {
        west,
        north,
        east,
        south,
    })
}

/// Texture translation and scale placing `imagery` inside `terrain`, both in
/// native coordinates.
pub(crate) fn texture_transform(
    imagery: &NativeExtent,
    terrain: &NativeExtent,
) -> ((f64, f64), (f64, f64)) {
    let translation = (
        (imagery.west - terrain.west) / terrain.width(),
        (imagery.south - terrain.south) / terrain.height(),
    );
    let scale = (
        imagery.width() / terrain.width(),
        imagery.height() / terrain.height(),
    );
    (translation, scale)
}

/// The part of `terrain` that `imagery` covers within `clipped`, as a
/// rectangle of terrain texture coordinates.
pub(crate) fn clip_rectangle(
    imagery: &Extent,
    clipped: &Extent,
    terrain: &Extent,
) -> ((f64, f64), (f64, f64)) {
    let overlap = imagery.intersect_with(clipped);

    let min_u = ((overlap.west - terrain.west) / terrain.width()).clamp(0.0, 1.0);
    let max_u = ((overlap.east - terrain.west) / terrain.width()).clamp(0.0, 1.0);
    let min_v = ((overlap.south - terrain.south) / terrain.height()).clamp(0.0, 1.0);
    let max_v = ((overlap.north - terrain.south) / terrain.height()).clamp(0.0, 1.0);

    ((min_u, min_v), (max_u.max(min_u), max_v.max(min_v)))
}

impl<P: ImageryProvider, T: Texture> ImageryLayer<P, T> {
    /// The imagery level whose texel spacing best matches `texel_spacing`
    /// metres at `latitude_closest_to_equator`, clamped to the provider's
    /// levels.
    pub fn level_with_maximum_texel_spacing(
        &self,
        texel_spacing: f64,
        latitude_closest_to_equator: f64,
    ) -> u32 {
        let tiling_scheme = self.provider.tiling_scheme();
        let level_zero_spacing = level_zero_maximum_texel_spacing(
            tiling_scheme.ellipsoid(),
            self.provider.tile_width(),
            tiling_scheme.number_of_level_zero_tiles_x(),
            latitude_closest_to_equator,
        );

        select_imagery_level(level_zero_spacing, texel_spacing, self.provider.max_level())
    }

    /// Computes the imagery associations for `terrain`.
    ///
    /// Every returned [`TileImagery`] holds a cache reference. Returns `None`
    /// when the terrain tile does not overlap the imagery, in which case no
    /// references are taken.
    pub fn map_terrain_tile(
        &mut self,
        terrain: &TerrainTile,
        terrain_provider: &dyn TerrainProvider,
    ) -> Option<Vec<TileImagery>> {
        let extent = terrain
            .extent
            .intersect_with(&self.provider.extent())
            .intersect_with(&self.options.extent);
        if extent.is_empty() {
            trace!(x = terrain.x, y = terrain.y, level = terrain.level, "No imagery overlap");
            return None;
        }

        let target_spacing = self.options.max_screen_space_error
            * terrain_provider.level_maximum_geometric_error(terrain.level);
        let level =
            self.level_with_maximum_texel_spacing(target_spacing, extent.latitude_closest_to_equator());

        let tiling_scheme = self.provider.tiling_scheme();
        let range = imagery_tile_range(tiling_scheme, &extent, level)?;
        let terrain_native = tiling_scheme.extent_to_native_extent(&terrain.extent);

        let mut associations = Vec::with_capacity(range.len());
        for x in range.west..=range.east {
            for y in range.north..=range.south {
                let imagery_native = tiling_scheme.tile_xy_to_native_extent(x, y, level);
                let imagery_extent = tiling_scheme.tile_xy_to_extent(x, y, level);
                let (texture_translation, texture_scale) =
                    texture_transform(&imagery_native, &terrain_native);
                let (min_tex_coords, max_tex_coords) =
                    clip_rectangle(&imagery_extent, &extent, &terrain.extent);

                associations.push(TileImagery {
                    imagery: self.cache.acquire(ImageryTileKey::new(x, y, level)),
                    texture_translation,
                    texture_scale,
                    min_tex_coords,
                    max_tex_coords,
                });
            }
        }

        trace!(
            x = terrain.x,
            y = terrain.y,
            level = terrain.level,
            imagery_level = level,
            count = associations.len(),
            "Mapped terrain tile"
        );
        Some(associations)
    }

    /// Appends the imagery associations for `terrain` to its imagery list.
    ///
    /// Returns `false`, leaving the tile untouched, when there is no overlap.
    pub fn create_tile_imagery_skeletons(
        &mut self,
        terrain: &mut TerrainTile,
        terrain_provider: &dyn TerrainProvider,
    ) -> bool {
        match self.map_terrain_tile(terrain, terrain_provider) {
            Some(associations) => {
                terrain.imagery.extend(associations);
                true
            }
            None => false,
        }
    }
}
