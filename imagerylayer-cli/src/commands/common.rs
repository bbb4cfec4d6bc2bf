//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use imagerylayer::admission::HostRequestLimiter;
use imagerylayer::config::ConfigFile;
use imagerylayer::geo::{
    Cartographic, Extent, GeographicTilingScheme, TilingScheme, EPSILON10, MAX_TILE_LEVEL,
};
use imagerylayer::layer::ImageryLayer;
use imagerylayer::provider::{ReqwestClient, UrlTemplateProvider};
use imagerylayer::terrain::TerrainTile;
use imagerylayer::texture::HeadlessTexture;

use crate::error::CliError;

/// Provider built from the `[provider]` section.
pub type ConfiguredProvider = UrlTemplateProvider<ReqwestClient>;

/// Layer realizing imagery into in-memory textures.
pub type HeadlessLayer = ImageryLayer<ConfiguredProvider, HeadlessTexture>;

/// Arguments selecting the terrain tiles to work on.
#[derive(Debug, Args)]
pub struct TerrainSelection {
    /// Area of interest as west,south,east,north in degrees
    #[arg(long, value_parser = parse_extent_arg, allow_hyphen_values = true)]
    pub extent: Extent,

    /// Terrain level to tile the area at
    #[arg(
        long,
        default_value = "4",
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_TILE_LEVEL))
    )]
    pub level: u32,

    /// Override the layer's max_screen_space_error
    #[arg(long)]
    pub max_screen_space_error: Option<f64>,
}

/// Parse `w,s,e,n` in degrees.
pub fn parse_extent_arg(value: &str) -> Result<Extent, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("'{}' is not a list of numbers: {}", value, e))?;

    let [west, south, east, north] = parts[..] else {
        return Err(format!(
            "expected west,south,east,north but got {} values",
            parts.len()
        ));
    };

    Extent::from_degrees(west, south, east, north).map_err(|e| e.to_string())
}

/// Load the config file, from `path` when given.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Build the imagery provider described by `config`.
pub fn build_provider(config: &ConfigFile) -> Result<ConfiguredProvider, CliError> {
    let http_client = ReqwestClient::with_timeout(config.network.timeout)?;
    let name = url_host(&config.provider.url).unwrap_or_else(|| "configured".to_string());

    Ok(UrlTemplateProvider::new(http_client, config.provider.url.clone())
        .with_tiling_scheme(config.provider.scheme.tiling_scheme())
        .with_max_level(config.provider.max_level)
        .with_tile_size(config.provider.tile_width, config.provider.tile_width)
        .with_subdomains(config.provider.subdomains.clone())
        .with_name(name))
}

/// Build a layer over the configured provider, applying any CLI overrides.
pub fn build_layer(config: &ConfigFile, selection: &TerrainSelection) -> Result<HeadlessLayer, CliError> {
    let provider = build_provider(config)?;

    let mut options = config.layer_options();
    if let Some(error) = selection.max_screen_space_error {
        options = options.with_max_screen_space_error(error);
    }

    let throttle = Arc::new(HostRequestLimiter::new(config.network.max_requests_per_host));
    Ok(ImageryLayer::new(Arc::new(provider), options)?.with_throttle(throttle))
}

/// Terrain tiles of the geographic scheme at `level` touching `extent`.
pub fn terrain_tiles(scheme: &dyn TilingScheme, extent: &Extent, level: u32) -> Vec<TerrainTile> {
    // Inset the corners so an extent ending on a tile edge does not pull in
    // the neighbouring row or column.
    let inset_x = if extent.width() > 2.0 * EPSILON10 { EPSILON10 } else { 0.0 };
    let inset_y = if extent.height() > 2.0 * EPSILON10 { EPSILON10 } else { 0.0 };

    let northwest = Cartographic::new(extent.west + inset_x, extent.north - inset_y);
    let southeast = Cartographic::new(extent.east - inset_x, extent.south + inset_y);

    let (Some((west, north)), Some((east, south))) = (
        scheme.position_to_tile_xy(northwest, level),
        scheme.position_to_tile_xy(southeast, level),
    ) else {
        return Vec::new();
    };

    let mut tiles = Vec::new();
    for y in north..=south {
        for x in west..=east {
            tiles.push(TerrainTile::from_scheme(scheme, x, y, level));
        }
    }
    tiles
}

/// The geographic scheme terrain tiles are cut from.
pub fn terrain_scheme() -> GeographicTilingScheme {
    GeographicTilingScheme::new()
}

/// Make sure `dir` exists and return it.
pub fn ensure_output_dir(dir: &Path) -> Result<PathBuf, CliError> {
    std::fs::create_dir_all(dir).map_err(|e| CliError::FileWrite {
        path: dir.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(dir.to_path_buf())
}

fn url_host(template: &str) -> Option<String> {
    let rest = template.split_once("://")?.1;
    let host = rest.split('/').next()?;
    (!host.is_empty()).then(|| host.to_string())
}
