//! Texture realization for imagery tiles.
//!
//! The layer never talks to a graphics API directly. It realizes decoded
//! imagery through a [`RenderContext`], which allocates textures, uploads
//! pixels, reports device limits and optionally reprojects Web Mercator
//! imagery onto geographic rows.
//!
//! ```text
//! ┌─────────────────────┐
//! │    ImageryLayer     │
//! │                     │
//! │  TexturePool<C::Texture>
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   RenderContext     │ (trait)
//! └──────────┬──────────┘
//!            │
//!       ┌────┴────┐
//!       ▼         ▼
//! ┌──────────┐ ┌──────────┐
//! │ Headless │ │  Device  │
//! │ Context  │ │ contexts │
//! └──────────┘ └──────────┘
//! ```
//!
//! [`HeadlessContext`] keeps pixels in memory and is what the CLI and the
//! tests use.

mod context;
mod error;
mod headless;
mod pool;

pub use context::{
    MagnificationFilter, MinificationFilter, MipmapHint, RenderContext, Sampler, Texture,
    TextureWrap, DEFAULT_MAXIMUM_ANISOTROPY,
};
pub use error::TextureError;
pub use headless::{HeadlessContext, HeadlessTexture, DEFAULT_MAX_TEXTURE_SIZE};
pub use pool::{TexturePool, DEFAULT_MAX_IDLE_PER_SIZE};
