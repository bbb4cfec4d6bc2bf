//! Imagery tile identity, lifecycle state, and the per-layer cache.

mod cache;
mod key;
mod state;
mod tile;

pub use cache::{ImageryCache, ImageryRef};
pub use key::ImageryTileKey;
pub use state::ImageryState;
pub use tile::ImageryTile;
