//! Provider types and traits

use std::future::Future;

use image::RgbaImage;
use thiserror::Error;

use crate::geo::{Extent, TilingScheme};
use crate::imagery::ImageryTileKey;

/// Errors that can occur during provider operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Level not served by this provider
    #[error("Level {0} not supported by provider")]
    UnsupportedLevel(u32),
    /// Could not build a usable URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Payload could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    DecodeError(String),
}

/// Source of imagery tiles for a layer.
///
/// Implementors describe how their imagery is tiled and how to fetch one
/// tile. Fetching is split in two so that admission control can inspect the
/// request's origin after the URL is known and before any bytes move.
///
/// Both async methods return `Send` futures so that requests can be driven
/// from any task.
pub trait ImageryProvider: Send + Sync + 'static {
    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;

    /// The tiling scheme the provider's tiles are laid out in.
    fn tiling_scheme(&self) -> &dyn TilingScheme;

    /// The extent the provider has imagery for.
    ///
    /// Defaults to the whole tiling scheme.
    fn extent(&self) -> Extent {
        *self.tiling_scheme().extent()
    }

    /// The finest level the provider serves.
    fn max_level(&self) -> u32;

    /// Width of one tile in pixels.
    fn tile_width(&self) -> u32;

    /// Height of one tile in pixels.
    fn tile_height(&self) -> u32;

    /// Resolves the URL for a tile.
    ///
    /// May need to consult remote metadata, so it is asynchronous.
    fn build_image_url(
        &self,
        key: ImageryTileKey,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Fetches and decodes the image at `url`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(image))` when the tile was fetched and decoded
    /// - `Ok(None)` when the provider has no imagery for this tile
    /// - `Err(_)` on transport or decode failure
    fn request_image(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Option<RgbaImage>, ProviderError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        assert_eq!(
            ProviderError::HttpError("timeout".to_string()).to_string(),
            "HTTP error: timeout"
        );
        assert_eq!(
            ProviderError::UnsupportedLevel(23).to_string(),
            "Level 23 not supported by provider"
        );
        assert!(ProviderError::DecodeError("bad magic".to_string())
            .to_string()
            .contains("bad magic"));
    }
}
