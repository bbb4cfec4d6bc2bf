//! `fetch` command: map terrain tiles, then drive their imagery through the
//! full load pipeline and report how every tile ended up.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use imagerylayer::imagery::ImageryState;
use imagerylayer::provider::ImageryProvider as _;
use imagerylayer::terrain::EllipsoidTerrainProvider;
use imagerylayer::texture::HeadlessContext;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use super::common::{
    build_layer, ensure_output_dir, load_config, terrain_scheme, terrain_tiles, HeadlessLayer,
    TerrainSelection,
};
use crate::error::CliError;

/// How long to wait for one request before re-running the update pass.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments for `fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub selection: TerrainSelection,

    /// Write each ready tile's base image as PNG into this directory
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Give up on tiles still loading after this many seconds
    #[arg(long, default_value = "120")]
    pub deadline: u64,
}

pub fn run(args: FetchArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    runtime.block_on(fetch(args, config_path))
}

async fn fetch(args: FetchArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let mut layer = build_layer(&config, &args.selection)?;

    let scheme = terrain_scheme();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);
    let mut tiles = terrain_tiles(&scheme, &args.selection.extent, args.selection.level);
    for terrain in &mut tiles {
        layer.create_tile_imagery_skeletons(terrain, &terrain_provider);
    }

    let total = layer.cache().len();
    info!(
        provider = layer.provider().name(),
        terrain_tiles = tiles.len(),
        imagery_tiles = total,
        "Fetching imagery"
    );

    let mut context = HeadlessContext::new();
    let deadline = Instant::now() + Duration::from_secs(args.deadline);
    let progress = progress_bar(total as u64)?;

    while !layer.is_quiescent() {
        if Instant::now() >= deadline {
            warn!(deadline_secs = args.deadline, "Deadline reached with imagery still loading");
            break;
        }

        layer.update(&mut context, Instant::now());
        progress.set_position(finished(&layer) as u64);
        progress.set_message(format!("{} in flight", layer.pending_requests()));

        if layer.pending_requests() > 0 {
            // Timing out only stops waiting; the request stays queued.
            let _ = tokio::time::timeout(POLL_INTERVAL, layer.next_settled(Instant::now())).await;
        } else if !layer.is_quiescent() {
            // Waiting on a retry interval or an open circuit.
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
    progress.set_position(finished(&layer) as u64);
    progress.finish_and_clear();

    if let Some(dir) = &args.output {
        let written = write_ready_tiles(&layer, dir)?;
        println!("Wrote {} tiles to {}", written, dir.display());
    }

    print_summary(&layer);

    for terrain in &mut tiles {
        layer.release_terrain_tile(terrain);
    }
    Ok(())
}

fn progress_bar(total: u64) -> Result<ProgressBar, CliError> {
    let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} tiles  {msg}")
        .map_err(|e| CliError::Config(e.to_string()))?
        .progress_chars("=> ");
    let bar = ProgressBar::new(total);
    bar.set_style(style);
    Ok(bar)
}

/// Tiles that will not advance further.
fn finished(layer: &HeadlessLayer) -> usize {
    let max_attempts = layer.options().failure.per_tile_max_fail_count;
    layer
        .cache()
        .tiles()
        .filter(|tile| {
            tile.state().is_settled()
                || (tile.state() == ImageryState::Failed && tile.fail_count() >= max_attempts)
        })
        .count()
}

fn write_ready_tiles(layer: &HeadlessLayer, dir: &Path) -> Result<usize, CliError> {
    let dir = ensure_output_dir(dir)?;
    let mut written = 0;

    for tile in layer.cache().tiles() {
        let Some(image) = tile.texture().and_then(|texture| texture.level(0)) else {
            continue;
        };
        let key = tile.key();
        let path = dir.join(format!("{}_{}_{}.png", key.level(), key.x(), key.y()));
        image.save(&path).map_err(|e| CliError::FileWrite {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        written += 1;
    }
    Ok(written)
}

fn print_summary(layer: &HeadlessLayer) {
    let mut by_state: BTreeMap<&'static str, usize> = BTreeMap::new();
    for tile in layer.cache().tiles() {
        *by_state.entry(tile.state().label()).or_default() += 1;
    }

    println!("Imagery tiles: {}", layer.cache().len());
    for (state, count) in &by_state {
        println!("  {:<15} {}", state, count);
    }

    let mut failed: Vec<_> = layer
        .cache()
        .tiles()
        .filter(|tile| tile.state() == ImageryState::Failed)
        .collect();
    failed.sort_by_key(|tile| tile.key());
    if !failed.is_empty() {
        println!();
        println!("Failed tiles:");
        for tile in failed {
            println!(
                "  {}  attempts={}  url={}",
                tile.key(),
                tile.fail_count(),
                tile.url().unwrap_or("-")
            );
        }
    }

    println!();
    println!(
        "Circuit: {:?} ({} consecutive failures)",
        layer.circuit_state(),
        layer.consecutive_failures()
    );
}
