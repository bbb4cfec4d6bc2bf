//! Imagery load pipeline.
//!
//! Each cached tile is advanced one stage at a time by
//! [`ImageryLayer::process_imagery`]:
//!
//! | State           | Action                                              |
//! |-----------------|-----------------------------------------------------|
//! | `Unloaded`      | issue a request (unless the circuit is open)        |
//! | `Transitioning` | wait for the request to settle                      |
//! | `Received`      | upload the payload into a texture                   |
//! | `TextureLoaded` | reproject if needed, build mipmaps, set the sampler |
//! | `Failed`        | return to `Unloaded` once the retry rules allow     |
//! | `Ready`/`Invalid` | nothing                                           |
//!
//! Requests are futures owned by the layer. They are driven by
//! [`poll_requests`](ImageryLayer::poll_requests) (non-blocking) or
//! [`next_settled`](ImageryLayer::next_settled) (awaits one), which apply
//! each outcome to its tile. An outcome whose tile was evicted or has since
//! issued a newer request is discarded.

use std::sync::Arc;
use std::time::Instant;

use futures::{FutureExt, StreamExt};
use image::RgbaImage;
use tracing::{debug, trace, warn};

use super::{ImageryLayer, TileImagery};
use crate::admission::{self, Admission};
use crate::geo::{Extent, NativeExtent};
use crate::imagery::{ImageryCache, ImageryState, ImageryTile, ImageryTileKey};
use crate::provider::{ImageryProvider, ProviderError};
use crate::terrain::TerrainTile;
use crate::texture::{
    MipmapHint, RenderContext, Sampler, Texture, TextureError, DEFAULT_MAXIMUM_ANISOTROPY,
};

/// A settled request.
pub(crate) struct RequestOutcome {
    key: ImageryTileKey,
    serial: u64,
    url: Option<String>,
    result: FetchResult,
}

enum FetchResult {
    Received(RgbaImage),
    NoImage,
    Deferred { host: String },
    Failed(ProviderError),
}

impl<P: ImageryProvider, T: Texture> ImageryLayer<P, T> {
    /// Issues the network request for the tile at `key`.
    ///
    /// The tile moves to `Transitioning` immediately. The request resolves
    /// the URL, asks the throttle for admission and fetches; it only runs
    /// while the layer is polled.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not cached or the tile is not `Unloaded`.
    pub fn request_imagery(&mut self, key: ImageryTileKey) {
        let serial = self.next_serial;
        self.next_serial += 1;

        let tile = tile_in_state(&mut self.cache, &key, ImageryState::Unloaded);
        tile.state = ImageryState::Transitioning;
        tile.pending_request = Some(serial);

        let provider = Arc::clone(&self.provider);
        let throttle = Arc::clone(&self.throttle);

        trace!(key = %key, serial, "Requesting imagery");

        self.pending.push(
            async move {
                let url = match provider.build_image_url(key).await {
                    Ok(url) => url,
                    Err(e) => {
                        return RequestOutcome {
                            key,
                            serial,
                            url: None,
                            result: FetchResult::Failed(e),
                        }
                    }
                };

                let permit = match admission::admit(&throttle, &url) {
                    Admission::Granted(permit) => Some(permit),
                    Admission::Unthrottled => None,
                    Admission::Deferred { host } => {
                        return RequestOutcome {
                            key,
                            serial,
                            url: Some(url),
                            result: FetchResult::Deferred { host },
                        }
                    }
                };

                let response = provider.request_image(&url).await;
                drop(permit);

                let result = match response {
                    Ok(Some(image)) => FetchResult::Received(image),
                    Ok(None) => FetchResult::NoImage,
                    Err(e) => FetchResult::Failed(e),
                };

                RequestOutcome {
                    key,
                    serial,
                    url: Some(url),
                    result,
                }
            }
            .boxed(),
        );
    }

    /// Applies every request that has already settled, without waiting.
    /// Failures are stamped with `now`.
    ///
    /// Returns the number of outcomes applied.
    pub fn poll_requests(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while let Some(Some(outcome)) = self.pending.next().now_or_never() {
            self.apply_outcome(outcome, now);
            applied += 1;
        }
        applied
    }

    /// Waits for the next request to settle and applies it.
    ///
    /// A failure is stamped with `now`. Returns the key of the settled
    /// request, or `None` when nothing is pending.
    pub async fn next_settled(&mut self, now: Instant) -> Option<ImageryTileKey> {
        let outcome = self.pending.next().await?;
        let key = outcome.key;
        self.apply_outcome(outcome, now);
        Some(key)
    }

    fn apply_outcome(&mut self, outcome: RequestOutcome, now: Instant) {
        let RequestOutcome {
            key,
            serial,
            url,
            result,
        } = outcome;

        // The circuit tracks the provider, not the tile, so it sees every
        // outcome even if the tile is gone.
        match &result {
            FetchResult::Received(_) | FetchResult::NoImage => self.circuit.record_success(),
            FetchResult::Failed(_) => self.circuit.record_failure(now),
            FetchResult::Deferred { .. } => self.circuit.record_deferral(),
        }

        let Some(tile) = self
            .cache
            .get_by_key_mut(&key)
            .filter(|tile| tile.pending_request == Some(serial))
        else {
            debug!(key = %key, serial, "Discarding outcome for evicted or superseded tile");
            return;
        };

        tile.pending_request = None;
        if url.is_some() {
            tile.url = url;
        }

        match result {
            FetchResult::Received(image) => {
                debug!(key = %key, width = image.width(), height = image.height(), "Imagery received");
                tile.image = Some(image);
                tile.state = ImageryState::Received;
            }
            FetchResult::NoImage => {
                debug!(key = %key, "Provider has no imagery for tile");
                tile.state = ImageryState::Invalid;
            }
            FetchResult::Deferred { host } => {
                trace!(key = %key, host = %host, "Request postponed, host at capacity");
                tile.state = ImageryState::Unloaded;
            }
            FetchResult::Failed(e) => {
                warn!(key = %key, url = ?tile.url, error = %e, "Failed to load imagery");
                mark_failed(tile, now);
            }
        }
    }

    /// Uploads a received payload into a texture and drops the payload.
    ///
    /// An upload error marks the tile `Failed` as of `now`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not cached or the tile is not `Received`.
    pub fn create_texture<C>(&mut self, key: ImageryTileKey, context: &mut C, now: Instant)
    where
        C: RenderContext<Texture = T>,
    {
        let tile = tile_in_state(&mut self.cache, &key, ImageryState::Received);
        let Some(image) = tile.image.take() else {
            panic!("imagery tile {} is Received without a payload", key);
        };

        match self.texture_pool.create_texture(context, &image) {
            Ok(texture) => {
                tile.texture = Some(texture);
                tile.state = ImageryState::TextureLoaded;
                debug!(key = %key, "Imagery texture loaded");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to create imagery texture");
                mark_failed(tile, now);
            }
        }
    }

    /// Finishes a loaded texture: reprojects non-geographic imagery, builds
    /// mipmaps and sets the sampler. The tile becomes `Ready`, or `Failed` as
    /// of `now` if the render context reports an error.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not cached or the tile is not `TextureLoaded`.
    pub fn reproject_texture<C>(&mut self, key: ImageryTileKey, context: &mut C, now: Instant)
    where
        C: RenderContext<Texture = T>,
    {
        let tiling_scheme = self.provider.tiling_scheme();
        let tile = tile_in_state(&mut self.cache, &key, ImageryState::TextureLoaded);

        let result = match tile.texture.as_mut() {
            Some(texture) => finish_texture(
                texture,
                context,
                (!tiling_scheme.is_geographic()).then(|| {
                    (
                        tiling_scheme.tile_xy_to_native_extent(key.x(), key.y(), key.level()),
                        tiling_scheme.tile_xy_to_extent(key.x(), key.y(), key.level()),
                    )
                }),
            ),
            None => panic!("imagery tile {} is TextureLoaded without a texture", key),
        };

        match result {
            Ok(()) => {
                tile.state = ImageryState::Ready;
                debug!(key = %key, "Imagery ready");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to finish imagery texture");
                if let Some(texture) = tile.texture.take() {
                    self.texture_pool.release(texture);
                }
                mark_failed(tile, now);
            }
        }
    }

    /// Advances the tile at `key` by at most one stage.
    ///
    /// Returns the tile's state afterwards, or `None` if it is not cached.
    pub fn process_imagery<C>(
        &mut self,
        key: ImageryTileKey,
        context: &mut C,
        now: Instant,
    ) -> Option<ImageryState>
    where
        C: RenderContext<Texture = T>,
    {
        let policy = &self.options.failure;
        let tile = self.cache.get_by_key_mut(&key)?;

        if tile.state == ImageryState::Failed {
            let retry_due = tile.fail_count < policy.per_tile_max_fail_count
                && tile.last_failure.map_or(true, |failed| {
                    now.saturating_duration_since(failed) >= policy.failed_tile_retry_time
                });
            if retry_due {
                debug!(key = %key, attempts = tile.fail_count, "Retrying failed imagery");
                tile.state = ImageryState::Unloaded;
            }
        }

        let state = tile.state;
        match state {
            ImageryState::Unloaded => {
                if self.circuit.allow_request(now) {
                    self.request_imagery(key);
                }
            }
            ImageryState::Received => self.create_texture(key, context, now),
            ImageryState::TextureLoaded => self.reproject_texture(key, context, now),
            ImageryState::Transitioning
            | ImageryState::Ready
            | ImageryState::Failed
            | ImageryState::Invalid => {}
        }

        self.cache.get_by_key(&key).map(ImageryTile::state)
    }

    /// Applies settled requests, then advances every cached tile one stage.
    pub fn update<C>(&mut self, context: &mut C, now: Instant)
    where
        C: RenderContext<Texture = T>,
    {
        self.poll_requests(now);

        let mut keys: Vec<_> = self.cache.keys().collect();
        keys.sort_unstable();
        for key in keys {
            self.process_imagery(key, context, now);
        }
    }

    /// True when nothing is in flight and no cached tile can advance again:
    /// each is `Ready`, `Invalid`, or `Failed` with its attempts used up.
    pub fn is_quiescent(&self) -> bool {
        let max_attempts = self.options.failure.per_tile_max_fail_count;
        self.pending.is_empty()
            && self.cache.tiles().all(|tile| {
                tile.state().is_settled()
                    || (tile.state() == ImageryState::Failed && tile.fail_count() >= max_attempts)
            })
    }

    /// Gives back one association's cache reference.
    ///
    /// If it was the last reference, the tile is evicted and its texture
    /// returned to the pool. A request still in flight for the tile is left
    /// to settle and its outcome discarded.
    pub fn release_tile_imagery(&mut self, tile_imagery: TileImagery) {
        if let Some(mut evicted) = self.cache.release(tile_imagery.into_imagery()) {
            trace!(key = %evicted.key(), state = evicted.state().label(), "Imagery evicted");
            if let Some(texture) = evicted.take_resources() {
                self.texture_pool.release(texture);
            }
        }
    }

    /// Releases every association held by `terrain`.
    pub fn release_terrain_tile(&mut self, terrain: &mut TerrainTile) {
        for tile_imagery in std::mem::take(&mut terrain.imagery) {
            self.release_tile_imagery(tile_imagery);
        }
    }

    /// Deletes the cache entry for `key` regardless of its reference count.
    ///
    /// Outstanding associations for the key become inert. The removed tile,
    /// including any texture it holds, is returned to the caller.
    pub fn remove_imagery_from_cache(&mut self, key: &ImageryTileKey) -> Option<ImageryTile<T>> {
        let removed = self.cache.remove(key);
        if removed.is_some() {
            debug!(key = %key, "Imagery removed from cache");
        }
        removed
    }
}

/// Looks up `key` and checks its state.
fn tile_in_state<'a, T>(
    cache: &'a mut ImageryCache<T>,
    key: &ImageryTileKey,
    expected: ImageryState,
) -> &'a mut ImageryTile<T> {
    match cache.get_by_key_mut(key) {
        Some(tile) if tile.state == expected => tile,
        Some(tile) => panic!(
            "imagery tile {} is {}, expected {}",
            key,
            tile.state.label(),
            expected.label()
        ),
        None => panic!("imagery tile {} is not cached", key),
    }
}

fn mark_failed<T>(tile: &mut ImageryTile<T>, now: Instant) {
    tile.state = ImageryState::Failed;
    tile.fail_count += 1;
    tile.last_failure = Some(now);
}

fn finish_texture<C: RenderContext>(
    texture: &mut C::Texture,
    context: &mut C,
    reprojection: Option<(NativeExtent, Extent)>,
) -> Result<(), TextureError> {
    if let Some((native, extent)) = reprojection {
        context.reproject_to_geographic(texture, &native, &extent)?;
    }

    texture.generate_mipmap(MipmapHint::Nicest)?;

    let anisotropy = context
        .maximum_texture_filter_anisotropy()
        .unwrap_or(DEFAULT_MAXIMUM_ANISOTROPY);
    texture.set_sampler(Sampler::imagery(anisotropy));
    Ok(())
}
