//! End-to-end tests: URL template provider over a scripted HTTP server,
//! driven through mapping, fetching and texture realization.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};

use imagerylayer::admission::HostRequestLimiter;
use imagerylayer::geo::{Extent, GeographicTilingScheme, WebMercatorTilingScheme};
use imagerylayer::imagery::ImageryState;
use imagerylayer::layer::{CircuitState, ImageryLayer, LayerOptions};
use imagerylayer::provider::{AsyncHttpClient, ProviderError, UrlTemplateProvider};
use imagerylayer::terrain::{EllipsoidTerrainProvider, TerrainTile};
use imagerylayer::texture::{HeadlessContext, HeadlessTexture, Texture};

const TEMPLATE: &str = "https://tiles.example.com/{z}/{x}/{y}.png";

/// How the fake server answers one path.
#[derive(Clone)]
enum Reply {
    NotFound,
    Error,
}

/// In-memory tile server. Unscripted paths get a small PNG.
#[derive(Clone, Default)]
struct FakeTileServer {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<AtomicUsize>,
}

impl FakeTileServer {
    fn script(&self, path: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(path.to_string(), reply);
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn png(width: u32, height: u32) -> Bytes {
    let image = RgbaImage::from_pixel(width, height, Rgba([40, 90, 160, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    Bytes::from(buffer.into_inner())
}

impl AsyncHttpClient for FakeTileServer {
    async fn get(&self, url: &str) -> Result<Option<Bytes>, ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let path = url.trim_start_matches("https://tiles.example.com");

        let reply = self.replies.lock().unwrap().get(path).cloned();
        match reply {
            Some(Reply::NotFound) => Ok(None),
            Some(Reply::Error) => Err(ProviderError::HttpError("HTTP 503".to_string())),
            None => Ok(Some(png(16, 16))),
        }
    }
}

type Layer = ImageryLayer<UrlTemplateProvider<FakeTileServer>, HeadlessTexture>;

fn geographic_layer(server: FakeTileServer, options: LayerOptions) -> Layer {
    let provider = UrlTemplateProvider::new(server, TEMPLATE)
        .with_tiling_scheme(Arc::new(GeographicTilingScheme::new()))
        .with_max_level(18)
        .with_name("fake");
    ImageryLayer::new(Arc::new(provider), options)
        .unwrap()
        .with_throttle(Arc::new(HostRequestLimiter::with_defaults()))
}

/// Runs the layer until nothing can advance, bounded by `max_rounds`.
async fn run_to_quiescence(layer: &mut Layer, context: &mut HeadlessContext, max_rounds: usize) {
    for _ in 0..max_rounds {
        layer.update(context, Instant::now());
        if layer.is_quiescent() {
            return;
        }
        if layer.pending_requests() > 0 {
            layer.next_settled(Instant::now()).await;
        }
    }
    panic!("layer did not settle: {:?}", layer);
}

#[tokio::test]
async fn test_terrain_tile_imagery_reaches_ready() {
    let server = FakeTileServer::default();
    let mut layer = geographic_layer(server.clone(), LayerOptions::new());
    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);

    let mut terrain = TerrainTile::from_scheme(&scheme, 3, 1, 2);
    assert!(layer.create_tile_imagery_skeletons(&mut terrain, &terrain_provider));
    assert!(terrain.has_imagery());

    let coverage: f64 = terrain.imagery.iter().map(|ti| ti.clip_area()).sum();
    assert!((coverage - 1.0).abs() < 1e-9, "coverage {}", coverage);

    let mut context = HeadlessContext::new();
    run_to_quiescence(&mut layer, &mut context, 32).await;

    for tile_imagery in &terrain.imagery {
        let tile = layer.imagery(&tile_imagery.key()).unwrap();
        assert_eq!(tile.state(), ImageryState::Ready);
        assert!(tile.image().is_none());

        let texture = tile.texture().unwrap();
        assert!(texture.mip_levels() > 1);
        assert!(texture.sampler().is_some());
        assert!(!texture.is_reprojected());
        assert!(tile.url().unwrap().starts_with("https://tiles.example.com/"));
    }
    assert_eq!(server.request_count(), terrain.imagery.len());
    assert_eq!(layer.circuit_state(), CircuitState::Closed);

    layer.release_terrain_tile(&mut terrain);
    assert!(layer.cache().is_empty());
    assert!(layer.pooled_textures() > 0);
}

#[tokio::test]
async fn test_neighbouring_terrain_tiles_share_imagery() {
    let server = FakeTileServer::default();
    // Imagery stops at level 1, so the four level-3 terrain tiles below all
    // fall inside one imagery tile.
    let provider = UrlTemplateProvider::new(server.clone(), TEMPLATE)
        .with_tiling_scheme(Arc::new(GeographicTilingScheme::new()))
        .with_max_level(1);
    let mut layer: Layer = ImageryLayer::new(Arc::new(provider), LayerOptions::new())
        .unwrap()
        .with_throttle(Arc::new(HostRequestLimiter::with_defaults()));

    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);
    let mut tiles: Vec<_> = [(8, 2), (9, 2), (8, 3), (9, 3)]
        .into_iter()
        .map(|(x, y)| TerrainTile::from_scheme(&scheme, x, y, 3))
        .collect();

    for tile in &mut tiles {
        assert!(layer.create_tile_imagery_skeletons(tile, &terrain_provider));
        assert_eq!(tile.imagery.len(), 1);
    }

    let shared = tiles[0].imagery[0].key();
    assert!(tiles.iter().all(|tile| tile.imagery[0].key() == shared));
    assert_eq!(layer.cache().len(), 1);
    assert_eq!(layer.cache().reference_count(&shared), 4);

    let mut context = HeadlessContext::new();
    run_to_quiescence(&mut layer, &mut context, 16).await;
    assert_eq!(server.request_count(), 1);
    assert_eq!(context.uploads(), 1);

    for tile in &mut tiles[..3] {
        layer.release_terrain_tile(tile);
    }
    assert_eq!(layer.cache().reference_count(&shared), 1);
    assert_eq!(layer.imagery(&shared).unwrap().state(), ImageryState::Ready);

    layer.release_terrain_tile(&mut tiles[3]);
    assert!(layer.cache().is_empty());
}

#[tokio::test]
async fn test_missing_tiles_are_invalid_and_not_retried() {
    let server = FakeTileServer::default();
    server.script("/2/3/1.png", Reply::NotFound);
    let mut layer = geographic_layer(server.clone(), LayerOptions::new());
    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);

    let mut terrain = TerrainTile::from_scheme(&scheme, 3, 1, 2);
    assert!(layer.create_tile_imagery_skeletons(&mut terrain, &terrain_provider));
    assert_eq!(terrain.imagery.len(), 1);
    let key = terrain.imagery[0].key();

    let mut context = HeadlessContext::new();
    run_to_quiescence(&mut layer, &mut context, 16).await;
    assert_eq!(layer.imagery(&key).unwrap().state(), ImageryState::Invalid);

    let requests = server.request_count();
    for _ in 0..4 {
        layer.update(&mut context, Instant::now() + Duration::from_secs(60));
    }
    assert_eq!(server.request_count(), requests);
    assert_eq!(layer.consecutive_failures(), 0);

    layer.release_terrain_tile(&mut terrain);
}

#[tokio::test]
async fn test_failing_host_exhausts_retries() {
    let server = FakeTileServer::default();
    server.script("/2/3/1.png", Reply::Error);
    let options = LayerOptions::new()
        .with_per_tile_max_fail_count(2)
        .with_failed_tile_retry_time(Duration::ZERO);
    let mut layer = geographic_layer(server.clone(), options);
    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);

    let mut terrain = TerrainTile::from_scheme(&scheme, 3, 1, 2);
    assert!(layer.create_tile_imagery_skeletons(&mut terrain, &terrain_provider));
    let key = terrain.imagery[0].key();

    let mut context = HeadlessContext::new();
    run_to_quiescence(&mut layer, &mut context, 16).await;

    let tile = layer.imagery(&key).unwrap();
    assert_eq!(tile.state(), ImageryState::Failed);
    assert_eq!(tile.fail_count(), 2);
    assert_eq!(server.request_count(), 2);
    assert_eq!(layer.consecutive_failures(), 2);

    layer.release_terrain_tile(&mut terrain);
}

#[tokio::test]
async fn test_layer_extent_limits_mapping() {
    let server = FakeTileServer::default();
    let options =
        LayerOptions::new().with_extent(Extent::from_degrees(0.0, 0.0, 10.0, 10.0).unwrap());
    let mut layer = geographic_layer(server, options);
    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);

    // Southern hemisphere tile: no overlap, no cache entries.
    let mut south = TerrainTile::from_scheme(&scheme, 4, 2, 2);
    assert!(!layer.create_tile_imagery_skeletons(&mut south, &terrain_provider));
    assert!(south.imagery.is_empty());
    assert!(layer.cache().is_empty());

    // Tile containing the extent: imagery is clipped to it.
    let mut north = TerrainTile::from_scheme(&scheme, 4, 1, 2);
    assert!(layer.create_tile_imagery_skeletons(&mut north, &terrain_provider));
    let coverage: f64 = north.imagery.iter().map(|ti| ti.clip_area()).sum();
    let expected = (10.0 / 45.0) * (10.0 / 45.0);
    assert!((coverage - expected).abs() < 1e-9, "coverage {}", coverage);

    layer.release_terrain_tile(&mut north);
}

#[tokio::test]
async fn test_web_mercator_imagery_is_reprojected() {
    let server = FakeTileServer::default();
    let provider = UrlTemplateProvider::new(server, TEMPLATE)
        .with_tiling_scheme(Arc::new(WebMercatorTilingScheme::new()));
    let mut layer: Layer = ImageryLayer::new(Arc::new(provider), LayerOptions::new())
        .unwrap()
        .with_throttle(Arc::new(HostRequestLimiter::with_defaults()));

    let scheme = GeographicTilingScheme::new();
    let terrain_provider = EllipsoidTerrainProvider::new(&scheme);
    let mut terrain = TerrainTile::from_scheme(&scheme, 5, 3, 3);
    assert!(layer.create_tile_imagery_skeletons(&mut terrain, &terrain_provider));

    let mut context = HeadlessContext::new();
    run_to_quiescence(&mut layer, &mut context, 32).await;

    for tile_imagery in &terrain.imagery {
        let tile = layer.imagery(&tile_imagery.key()).unwrap();
        assert_eq!(tile.state(), ImageryState::Ready);
        assert!(tile.texture().unwrap().is_reprojected());
    }
    assert_eq!(context.reprojections(), terrain.imagery.len());

    layer.release_terrain_tile(&mut terrain);
}
