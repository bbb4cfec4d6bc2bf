//! Imagery layers.
//!
//! An [`ImageryLayer`] drapes one imagery provider over terrain. It owns the
//! layer's [`ImageryCache`], decides which imagery tiles each terrain tile
//! needs, and drives those tiles through their load pipeline:
//!
//! ```text
//!            map_terrain_tile              poll_requests / next_settled
//! TerrainTile ───────────────► ImageryCache ──────────────────────────┐
//!                                  │                                   │
//!                                  ▼ process_imagery                   │
//!   Unloaded ──► Transitioning ──► Received ──► TextureLoaded ──► Ready│
//!      ▲              │   │                                            │
//!      └──(deferred)──┘   └──► Invalid | Failed ◄──────────────────────┘
//! ```
//!
//! Everything runs on the caller's task. Network requests are futures the
//! layer owns and polls; no work is spawned.

mod circuit;
mod mapping;
mod options;
mod pipeline;

pub use circuit::CircuitState;
pub use mapping::{select_imagery_level, TileImagery};
pub use options::{
    FailurePolicy, LayerOptions, DEFAULT_FAILED_TILE_RETRY_TIME, DEFAULT_MAX_SCREEN_SPACE_ERROR,
    DEFAULT_MAX_TILE_FAIL_COUNT, DEFAULT_PER_TILE_MAX_FAIL_COUNT,
};

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use thiserror::Error;

use crate::admission::{HostRequestLimiter, RequestThrottle};
use crate::geo::{Extent, MAX_TILE_LEVEL};
use crate::imagery::{ImageryCache, ImageryTile, ImageryTileKey};
use crate::provider::ImageryProvider;
use crate::texture::{Texture, TexturePool};
use circuit::FailureCircuit;
use pipeline::RequestOutcome;

/// Errors raised when constructing a layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("Invalid layer option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

/// One imagery source draped over terrain.
///
/// `P` is the imagery provider; `T` is the texture type of the render context
/// the layer realizes imagery into.
pub struct ImageryLayer<P, T> {
    provider: Arc<P>,
    options: LayerOptions,
    cache: ImageryCache<T>,
    texture_pool: TexturePool<T>,
    throttle: Arc<dyn RequestThrottle>,
    pending: FuturesUnordered<BoxFuture<'static, RequestOutcome>>,
    next_serial: u64,
    circuit: FailureCircuit,
}

impl<P: ImageryProvider, T: Texture> ImageryLayer<P, T> {
    /// Creates a layer that shares the process-wide request limiter.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::InvalidOption`] if `options` fail validation or
    /// the provider's deepest level cannot be tiled.
    pub fn new(provider: Arc<P>, options: LayerOptions) -> Result<Self, LayerError> {
        options.validate()?;

        let max_level = provider.max_level();
        if max_level > MAX_TILE_LEVEL
            || provider.tiling_scheme().checked_tile_counts(max_level).is_none()
        {
            return Err(LayerError::InvalidOption {
                name: "max_level",
                reason: format!(
                    "provider level {} is deeper than the supported {}",
                    max_level, MAX_TILE_LEVEL
                ),
            });
        }

        let circuit = FailureCircuit::new(
            options.failure.max_tile_fail_count,
            options.failure.failed_tile_retry_time,
        );

        Ok(Self {
            provider,
            options,
            cache: ImageryCache::new(),
            texture_pool: TexturePool::new(),
            throttle: HostRequestLimiter::shared(),
            pending: FuturesUnordered::new(),
            next_serial: 1,
            circuit,
        })
    }

    /// Replaces the request throttle.
    pub fn with_throttle(mut self, throttle: Arc<dyn RequestThrottle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    pub fn extent(&self) -> &Extent {
        &self.options.extent
    }

    pub fn alpha(&self) -> f64 {
        self.options.alpha
    }

    pub fn cache(&self) -> &ImageryCache<T> {
        &self.cache
    }

    /// The cached tile for `key`, if any.
    pub fn imagery(&self, key: &ImageryTileKey) -> Option<&ImageryTile<T>> {
        self.cache.get_by_key(key)
    }

    pub fn throttle(&self) -> &Arc<dyn RequestThrottle> {
        &self.throttle
    }

    /// Number of requests issued but not yet applied.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Consecutive failed requests since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.circuit.consecutive_failures()
    }

    /// Closes the circuit breaker, letting requests flow again.
    pub fn reset_circuit(&mut self) {
        tracing::info!(provider = self.provider.name(), "Imagery circuit breaker reset");
        self.circuit.reset();
    }

    /// Idle textures held for reuse.
    pub fn pooled_textures(&self) -> usize {
        self.texture_pool.idle_count()
    }
}

impl<P: ImageryProvider, T> std::fmt::Debug for ImageryLayer<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageryLayer")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .field("cached_tiles", &self.cache.len())
            .field("pending_requests", &self.pending.len())
            .field("circuit", &self.circuit.state())
            .finish_non_exhaustive()
    }
}
