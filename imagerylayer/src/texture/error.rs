//! Error types for texture realization.

use thiserror::Error;

/// Errors raised while creating, uploading or reprojecting textures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureError {
    /// Texture dimensions the render context cannot allocate.
    #[error("Invalid dimensions {width}×{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    /// Image payload does not match the texture it is uploaded into.
    #[error("Size mismatch: texture is {expected:?}, image is {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// The render context rejected the upload.
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Reprojection to geographic coordinates failed.
    #[error("Reprojection failed: {0}")]
    ReprojectionFailed(String),
}
