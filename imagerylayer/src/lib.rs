//! ImageryLayer - imagery resolution and caching for globe terrain
//!
//! Given a terrain tile, this library works out which imagery tiles cover it
//! at an adequate resolution, how each one maps onto the terrain tile's
//! texture coordinates, and drives those imagery tiles from an imagery
//! provider through decode, texture upload and optional reprojection. Imagery
//! tiles are shared between terrain tiles through a reference-counted cache.
//!
//! # Modules
//!
//! - [`geo`]: extents, ellipsoid and tiling schemes
//! - [`imagery`]: imagery tile keys, states and the cache
//! - [`provider`]: imagery providers and HTTP transport
//! - [`admission`]: per-host request throttling
//! - [`texture`]: render contexts, textures and the texture pool
//! - [`terrain`]: terrain providers and terrain tiles
//! - [`layer`]: the imagery layer itself
//! - [`config`]: `config.ini` handling
//! - [`logging`]: tracing setup

pub mod admission;
pub mod config;
pub mod geo;
pub mod imagery;
pub mod layer;
pub mod logging;
pub mod provider;
pub mod terrain;
pub mod texture;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
