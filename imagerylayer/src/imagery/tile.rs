//! A single fetched imagery tile and its resources.

use std::time::Instant;

use image::RgbaImage;

use super::{ImageryState, ImageryTileKey};

/// One imagery tile tracked by a layer's cache.
///
/// The tile lives inside its layer's [`ImageryCache`](super::ImageryCache);
/// it is created on first reference and dropped when the last reference is
/// released. `T` is the texture type of the render context in use.
#[derive(Debug)]
pub struct ImageryTile<T> {
    key: ImageryTileKey,
    id: u64,
    pub(crate) state: ImageryState,
    pub(crate) reference_count: u32,
    /// Decoded payload. Present only while `Received`.
    pub(crate) image: Option<RgbaImage>,
    /// Realized texture. Present from `TextureLoaded` onward.
    pub(crate) texture: Option<T>,
    pub(crate) url: Option<String>,
    pub(crate) fail_count: u32,
    pub(crate) last_failure: Option<Instant>,
    /// Serial of the request currently in flight, if any.
    pub(crate) pending_request: Option<u64>,
}

impl<T> ImageryTile<T> {
    pub(crate) fn new(key: ImageryTileKey, id: u64) -> Self {
        Self {
            key,
            id,
            state: ImageryState::Unloaded,
            reference_count: 0,
            image: None,
            texture: None,
            url: None,
            fail_count: 0,
            last_failure: None,
            pending_request: None,
        }
    }

    pub fn key(&self) -> ImageryTileKey {
        self.key
    }

    /// Identifier unique to this tile object within its cache.
    ///
    /// A tile evicted and later re-created for the same key gets a new id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ImageryState {
        self.state
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn texture(&self) -> Option<&T> {
        self.texture.as_ref()
    }

    /// URL of the most recent request, once resolved.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Number of failed attempts for this tile.
    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    /// Drops any held payload and texture, returning the texture.
    pub(crate) fn take_resources(&mut self) -> Option<T> {
        self.image = None;
        self.texture.take()
    }
}
