//! Reference-counted imagery tile cache.
//!
//! The cache deduplicates imagery tiles by [`ImageryTileKey`]. Every
//! [`acquire`](ImageryCache::acquire) hands out an [`ImageryRef`], a counted
//! reference that must be given back through
//! [`release`](ImageryCache::release). A tile is evicted exactly when its last
//! reference is released; there is no LRU or size-based eviction.
//!
//! # Ownership
//!
//! ```text
//! TerrainTile ──owns──► TileImagery ──owns──► ImageryRef ──counts──┐
//!                                                                  ▼
//! ImageryLayer ──owns──► ImageryCache ──owns──► ImageryTile (by key)
//! ```
//!
//! `ImageryRef` is neither `Clone` nor `Copy`, so the number of live
//! references always equals the tile's reference count.

use std::collections::HashMap;

use super::{ImageryTile, ImageryTileKey};

/// A counted reference to a cached imagery tile.
///
/// Obtained from [`ImageryCache::acquire`]; give it back with
/// [`ImageryCache::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an ImageryRef holds a reference count and must be released"]
pub struct ImageryRef {
    key: ImageryTileKey,
    id: u64,
}

impl ImageryRef {
    pub fn key(&self) -> ImageryTileKey {
        self.key
    }

    /// Id of the tile object this reference counts.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Cache of imagery tiles keyed by tile coordinates.
#[derive(Debug)]
pub struct ImageryCache<T> {
    entries: HashMap<ImageryTileKey, ImageryTile<T>>,
    next_id: u64,
}

impl<T> ImageryCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Returns a counted reference to the tile at `key`, creating it in the
    /// `Unloaded` state if it is not cached yet.
    pub fn acquire(&mut self, key: ImageryTileKey) -> ImageryRef {
        let next_id = &mut self.next_id;
        let tile = self.entries.entry(key).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            tracing::trace!(key = %key, id, "Imagery tile created");
            ImageryTile::new(key, id)
        });

        tile.reference_count += 1;

        ImageryRef { key, id: tile.id() }
    }

    /// Gives back a reference.
    ///
    /// When the count reaches zero the tile is removed from the cache and
    /// returned so the caller can dispose of its resources. Returns `None`
    /// while other references remain, or if the tile was already removed
    /// with [`remove`](Self::remove).
    pub fn release(&mut self, reference: ImageryRef) -> Option<ImageryTile<T>> {
        let tile = match self.entries.get_mut(&reference.key) {
            Some(tile) if tile.id() == reference.id => tile,
            _ => return None,
        };

        tile.reference_count = tile.reference_count.saturating_sub(1);
        if tile.reference_count > 0 {
            return None;
        }

        tracing::trace!(key = %reference.key, "Imagery tile evicted");
        self.entries.remove(&reference.key)
    }

    /// Deletes the entry for `key` regardless of its reference count.
    ///
    /// Used when a tile is known to be stale. Outstanding references become
    /// inert: releasing them later does not touch a newer tile with the same
    /// key. The removed tile is returned and its resources remain the
    /// caller's responsibility.
    pub fn remove(&mut self, key: &ImageryTileKey) -> Option<ImageryTile<T>> {
        self.entries.remove(key)
    }

    /// Looks up the tile a reference counts.
    pub fn get(&self, reference: &ImageryRef) -> Option<&ImageryTile<T>> {
        self.entries
            .get(&reference.key)
            .filter(|tile| tile.id() == reference.id)
    }

    pub fn get_mut(&mut self, reference: &ImageryRef) -> Option<&mut ImageryTile<T>> {
        self.entries
            .get_mut(&reference.key)
            .filter(|tile| tile.id() == reference.id)
    }

    pub fn get_by_key(&self, key: &ImageryTileKey) -> Option<&ImageryTile<T>> {
        self.entries.get(key)
    }

    pub(crate) fn get_by_key_mut(&mut self, key: &ImageryTileKey) -> Option<&mut ImageryTile<T>> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &ImageryTileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Current reference count for `key`, or 0 when not cached.
    pub fn reference_count(&self, key: &ImageryTileKey) -> u32 {
        self.entries
            .get(key)
            .map(|tile| tile.reference_count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of all cached tiles, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = ImageryTileKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &ImageryTile<T>> {
        self.entries.values()
    }
}

impl<T> Default for ImageryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
