//! Render context and texture traits.

use image::RgbaImage;

use super::TextureError;
use crate::geo::{Extent, NativeExtent};

/// Anisotropy used when the render context does not report a maximum.
pub const DEFAULT_MAXIMUM_ANISOTROPY: f32 = 8.0;

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Filter used when a texel covers less than one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinificationFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinificationFilter {
    /// Whether the filter samples from mip levels.
    pub fn uses_mipmaps(&self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }
}

/// Filter used when a texel covers more than one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnificationFilter {
    Nearest,
    Linear,
}

/// Quality hint for mip chain generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MipmapHint {
    #[default]
    DontCare,
    Fastest,
    Nicest,
}

/// Sampling state attached to a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampler {
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
    pub minification_filter: MinificationFilter,
    pub magnification_filter: MagnificationFilter,
    pub maximum_anisotropy: f32,
}

impl Sampler {
    /// Sampler for imagery: clamped edges, trilinear minification and the
    /// given anisotropy.
    pub fn imagery(maximum_anisotropy: f32) -> Self {
        Self {
            wrap_s: TextureWrap::ClampToEdge,
            wrap_t: TextureWrap::ClampToEdge,
            minification_filter: MinificationFilter::LinearMipmapLinear,
            magnification_filter: MagnificationFilter::Linear,
            maximum_anisotropy,
        }
    }
}

/// A texture owned by a [`RenderContext`].
pub trait Texture {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Builds the mip chain from the base level.
    fn generate_mipmap(&mut self, hint: MipmapHint) -> Result<(), TextureError>;

    fn set_sampler(&mut self, sampler: Sampler);

    fn sampler(&self) -> Option<&Sampler>;
}

/// The GPU-facing surface the layer realizes imagery into.
///
/// Implementations own the device; the layer only asks for textures, uploads
/// pixels and queries capabilities.
pub trait RenderContext {
    type Texture: Texture;

    /// Allocates an empty texture.
    fn create_texture(&mut self, width: u32, height: u32)
        -> Result<Self::Texture, TextureError>;

    /// Copies `image` into `texture`, replacing its base level and dropping any
    /// existing mip chain.
    fn upload(&mut self, texture: &mut Self::Texture, image: &RgbaImage)
        -> Result<(), TextureError>;

    /// Largest anisotropy the device supports, or `None` if anisotropic
    /// filtering is unavailable.
    fn maximum_texture_filter_anisotropy(&self) -> Option<f32>;

    /// Resamples a texture whose pixels are laid out in the tiling scheme's
    /// native units so that rows are evenly spaced in latitude.
    ///
    /// The default leaves the texture untouched.
    fn reproject_to_geographic(
        &mut self,
        _texture: &mut Self::Texture,
        _native: &NativeExtent,
        _extent: &Extent,
    ) -> Result<(), TextureError> {
        Ok(())
    }
}
