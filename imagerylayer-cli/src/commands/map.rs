//! `map` command: show which imagery tiles cover each terrain tile.
//!
//! Pure computation, nothing is fetched.

use std::path::Path;

use clap::Args;
use imagerylayer::provider::ImageryProvider as _;
use imagerylayer::terrain::EllipsoidTerrainProvider;
use tracing::info;

use super::common::{build_layer, load_config, terrain_scheme, terrain_tiles, TerrainSelection};
use crate::error::CliError;

/// Arguments for `map`.
#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub selection: TerrainSelection,
}

pub fn run(args: MapArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let mut layer = build_layer(&config, &args.selection)?;

    let scheme = terrain_scheme();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);
    let mut tiles = terrain_tiles(&scheme, &args.selection.extent, args.selection.level);

    info!(
        provider = layer.provider().name(),
        terrain_tiles = tiles.len(),
        level = args.selection.level,
        "Mapping terrain tiles"
    );

    for terrain in &mut tiles {
        println!("terrain ({}, {}, {})", terrain.x, terrain.y, terrain.level);

        if !layer.create_tile_imagery_skeletons(terrain, &terrain_provider) {
            println!("  no imagery");
            continue;
        }

        for tile_imagery in &terrain.imagery {
            let key = tile_imagery.key();
            let (tx, ty) = tile_imagery.texture_translation;
            let (sx, sy) = tile_imagery.texture_scale;
            let (min_u, min_v) = tile_imagery.min_tex_coords;
            let (max_u, max_v) = tile_imagery.max_tex_coords;
            println!(
                "  imagery {}  translation ({:.6}, {:.6})  scale ({:.6}, {:.6})  clip [{:.4}, {:.4}] - [{:.4}, {:.4}]",
                key, tx, ty, sx, sy, min_u, min_v, max_u, max_v
            );
        }
    }

    println!();
    println!(
        "{} terrain tiles, {} distinct imagery tiles",
        tiles.len(),
        layer.cache().len()
    );

    for terrain in &mut tiles {
        layer.release_terrain_tile(terrain);
    }
    Ok(())
}
