//! Scriptable imagery provider for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use tokio::sync::Semaphore;

use super::{ImageryProvider, ProviderError};
use crate::geo::{GeographicTilingScheme, TilingScheme};
use crate::imagery::ImageryTileKey;

/// What a mock request resolves to.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Image { width: u32, height: u32 },
    NoImage,
    Error(String),
}

/// Provider whose responses are scripted per tile.
///
/// When a gate is installed, every `request_image` call waits for one gate
/// permit before resolving, which keeps requests in flight until the test
/// releases them.
pub struct MockImageryProvider {
    tiling_scheme: Arc<dyn TilingScheme>,
    host: String,
    max_level: u32,
    default_response: MockResponse,
    responses: Mutex<HashMap<String, MockResponse>>,
    gate: Option<Arc<Semaphore>>,
    requests: AtomicUsize,
}

impl MockImageryProvider {
    pub fn new() -> Self {
        Self {
            tiling_scheme: Arc::new(GeographicTilingScheme::new()),
            host: "tiles.example.com".to_string(),
            max_level: 18,
            default_response: MockResponse::Image {
                width: 4,
                height: 4,
            },
            responses: Mutex::new(HashMap::new()),
            gate: None,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_tiling_scheme(mut self, tiling_scheme: Arc<dyn TilingScheme>) -> Self {
        self.tiling_scheme = tiling_scheme;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Scripts the response for one tile.
    pub fn respond(&self, key: ImageryTileKey, response: MockResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(self.url_for(key), response);
    }

    pub fn url_for(&self, key: ImageryTileKey) -> String {
        format!(
            "https://{}/{}/{}/{}.png",
            self.host,
            key.level(),
            key.x(),
            key.y()
        )
    }

    /// Number of `request_image` calls made so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ImageryProvider for MockImageryProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn tiling_scheme(&self) -> &dyn TilingScheme {
        self.tiling_scheme.as_ref()
    }

    fn max_level(&self) -> u32 {
        self.max_level
    }

    fn tile_width(&self) -> u32 {
        256
    }

    fn tile_height(&self) -> u32 {
        256
    }

    async fn build_image_url(&self, key: ImageryTileKey) -> Result<String, ProviderError> {
        Ok(self.url_for(key))
    }

    async fn request_image(&self, url: &str) -> Result<Option<RgbaImage>, ProviderError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ProviderError::HttpError(e.to_string()))?
                .forget();
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());

        match response {
            MockResponse::Image { width, height } => Ok(Some(RgbaImage::from_pixel(
                width,
                height,
                image::Rgba([0, 128, 255, 255]),
            ))),
            MockResponse::NoImage => Ok(None),
            MockResponse::Error(message) => Err(ProviderError::HttpError(message)),
        }
    }
}
