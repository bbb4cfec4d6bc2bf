//! CPU-backed render context.
//!
//! Keeps texture pixels in memory as [`RgbaImage`]s. Used by the CLI and by
//! tests, and as a reference for what a device-backed context must do.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::trace;

use super::{MipmapHint, RenderContext, Sampler, Texture, TextureError};
use crate::geo::{geodetic_latitude_to_mercator_angle, Extent, NativeExtent};

/// Largest texture edge the headless context will allocate.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 4096;

/// An in-memory texture with an optional mip chain.
#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    id: u64,
    width: u32,
    height: u32,
    levels: Vec<RgbaImage>,
    sampler: Option<Sampler>,
    reprojected: bool,
}

impl HeadlessTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of mip levels including the base level.
    pub fn mip_levels(&self) -> usize {
        self.levels.len()
    }

    /// Pixels of mip `level`, where 0 is the base level.
    pub fn level(&self, level: usize) -> Option<&RgbaImage> {
        self.levels.get(level)
    }

    /// Whether the pixels were resampled to geographic rows.
    pub fn is_reprojected(&self) -> bool {
        self.reprojected
    }
}

impl Texture for HeadlessTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn generate_mipmap(&mut self, hint: MipmapHint) -> Result<(), TextureError> {
        let base = self.levels.first().cloned().ok_or_else(|| {
            TextureError::UploadFailed("texture has no base level".to_string())
        })?;

        let filter = match hint {
            MipmapHint::Fastest => FilterType::Nearest,
            MipmapHint::DontCare => FilterType::Triangle,
            MipmapHint::Nicest => FilterType::Lanczos3,
        };

        let mut levels = vec![base];
        let (mut width, mut height) = (self.width, self.height);
        while width > 1 || height > 1 {
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            let previous = &levels[levels.len() - 1];
            levels.push(imageops::resize(previous, width, height, filter));
        }

        trace!(id = self.id, levels = levels.len(), ?hint, "Generated mip chain");
        self.levels = levels;
        Ok(())
    }

    fn set_sampler(&mut self, sampler: Sampler) {
        self.sampler = Some(sampler);
    }

    fn sampler(&self) -> Option<&Sampler> {
        self.sampler.as_ref()
    }
}

/// A [`RenderContext`] that keeps textures in main memory.
#[derive(Debug)]
pub struct HeadlessContext {
    maximum_anisotropy: Option<f32>,
    max_texture_size: u32,
    next_id: u64,
    textures_created: usize,
    uploads: usize,
    reprojections: usize,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self {
            maximum_anisotropy: None,
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            next_id: 1,
            textures_created: 0,
            uploads: 0,
            reprojections: 0,
        }
    }

    /// Reports `anisotropy` as the device maximum.
    pub fn with_maximum_anisotropy(mut self, anisotropy: f32) -> Self {
        self.maximum_anisotropy = Some(anisotropy);
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    /// Number of textures allocated so far. Pool reuse does not count.
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn reprojections(&self) -> usize {
        self.reprojections
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for HeadlessContext {
    type Texture = HeadlessTexture;

    fn create_texture(&mut self, width: u32, height: u32) -> Result<HeadlessTexture, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::InvalidDimensions {
                width,
                height,
                reason: "must be non-zero".to_string(),
            });
        }
        if width > self.max_texture_size || height > self.max_texture_size {
            return Err(TextureError::InvalidDimensions {
                width,
                height,
                reason: format!("exceeds maximum texture size {}", self.max_texture_size),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.textures_created += 1;

        Ok(HeadlessTexture {
            id,
            width,
            height,
            levels: Vec::new(),
            sampler: None,
            reprojected: false,
        })
    }

    fn upload(&mut self, texture: &mut HeadlessTexture, image: &RgbaImage) -> Result<(), TextureError> {
        if image.dimensions() != (texture.width, texture.height) {
            return Err(TextureError::SizeMismatch {
                expected: (texture.width, texture.height),
                actual: image.dimensions(),
            });
        }

        texture.levels = vec![image.clone()];
        texture.sampler = None;
        texture.reprojected = false;
        self.uploads += 1;
        Ok(())
    }

    fn maximum_texture_filter_anisotropy(&self) -> Option<f32> {
        self.maximum_anisotropy
    }

    /// Resamples Web Mercator rows so they are evenly spaced in latitude.
    ///
    /// The sphere radius is recovered from the ratio of native width to
    /// angular width, which holds for any scheme whose native X is
    /// `radius * longitude`.
    fn reproject_to_geographic(
        &mut self,
        texture: &mut HeadlessTexture,
        native: &NativeExtent,
        extent: &Extent,
    ) -> Result<(), TextureError> {
        let source = texture.levels.first().ok_or_else(|| {
            TextureError::ReprojectionFailed("texture has no base level".to_string())
        })?;
        if extent.width() <= 0.0 || native.height() <= 0.0 {
            return Err(TextureError::ReprojectionFailed(format!(
                "degenerate extent {}",
                extent
            )));
        }

        let radius = native.width() / extent.width();
        let (width, height) = source.dimensions();
        let mut output = RgbaImage::new(width, height);

        for row in 0..height {
            let fraction = (f64::from(row) + 0.5) / f64::from(height);
            let latitude = extent.north - fraction * extent.height();
            let y = radius * geodetic_latitude_to_mercator_angle(latitude);
            let source_row = (native.north - y) / native.height() * f64::from(height) - 0.5;
            let source_row = source_row.clamp(0.0, f64::from(height - 1));

            let above = source_row.floor() as u32;
            let below = (above + 1).min(height - 1);
            let weight = (source_row - f64::from(above)) as f32;

            for column in 0..width {
                let a = source.get_pixel(column, above);
                let b = source.get_pixel(column, below);
                output.put_pixel(column, row, blend(a, b, weight));
            }
        }

        texture.levels = vec![output];
        texture.reprojected = true;
        self.reprojections += 1;
        Ok(())
    }
}

fn blend(a: &Rgba<u8>, b: &Rgba<u8>, weight: f32) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for (channel, value) in out.iter_mut().enumerate() {
        let mixed = f32::from(a[channel]) * (1.0 - weight) + f32::from(b[channel]) * weight;
        *value = mixed.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{TilingScheme, WebMercatorTilingScheme};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_create_rejects_zero_dimensions() {
        let mut context = HeadlessContext::new();
        let err = context.create_texture(0, 256).unwrap_err();
        assert!(matches!(err, TextureError::InvalidDimensions { width: 0, .. }));
        assert_eq!(context.textures_created(), 0);
    }

    #[test]
    fn test_create_rejects_oversized_texture() {
        let mut context = HeadlessContext::new().with_max_texture_size(256);
        assert!(context.create_texture(512, 256).is_err());
        assert!(context.create_texture(256, 256).is_ok());
    }

    #[test]
    fn test_upload_requires_matching_size() {
        let mut context = HeadlessContext::new();
        let mut texture = context.create_texture(4, 4).unwrap();
        let err = context
            .upload(&mut texture, &solid(2, 4, [0, 0, 0, 255]))
            .unwrap_err();
        assert_eq!(
            err,
            TextureError::SizeMismatch {
                expected: (4, 4),
                actual: (2, 4)
            }
        );
    }

    #[test]
    fn test_mip_chain_reaches_one_by_one() {
        let mut context = HeadlessContext::new();
        let mut texture = context.create_texture(8, 2).unwrap();
        context
            .upload(&mut texture, &solid(8, 2, [10, 20, 30, 255]))
            .unwrap();

        texture.generate_mipmap(MipmapHint::Nicest).unwrap();

        // 8x2, 4x1, 2x1, 1x1
        assert_eq!(texture.mip_levels(), 4);
        assert_eq!(texture.level(3).unwrap().dimensions(), (1, 1));
        let pixel = texture.level(1).unwrap().get_pixel(0, 0);
        for (actual, expected) in pixel.0.iter().zip([10u8, 20, 30, 255]) {
            assert!(actual.abs_diff(expected) <= 1);
        }
    }

    #[test]
    fn test_upload_discards_previous_mip_chain() {
        let mut context = HeadlessContext::new();
        let mut texture = context.create_texture(4, 4).unwrap();
        context.upload(&mut texture, &solid(4, 4, [0, 0, 0, 255])).unwrap();
        texture.generate_mipmap(MipmapHint::Fastest).unwrap();
        texture.set_sampler(Sampler::imagery(4.0));

        context.upload(&mut texture, &solid(4, 4, [1, 1, 1, 255])).unwrap();
        assert_eq!(texture.mip_levels(), 1);
        assert!(texture.sampler().is_none());
        assert_eq!(context.uploads(), 2);
    }

    #[test]
    fn test_mipmap_without_upload_fails() {
        let mut context = HeadlessContext::new();
        let mut texture = context.create_texture(4, 4).unwrap();
        assert!(texture.generate_mipmap(MipmapHint::DontCare).is_err());
    }

    #[test]
    fn test_reprojection_stretches_toward_the_equator() {
        let scheme = WebMercatorTilingScheme::new();
        let extent = scheme.tile_xy_to_extent(0, 0, 1);
        let native = scheme.tile_xy_to_native_extent(0, 0, 1);

        // Top half red, bottom half blue in Mercator rows.
        let mut image = solid(4, 64, [255, 0, 0, 255]);
        for y in 32..64 {
            for x in 0..4 {
                image.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }

        let mut context = HeadlessContext::new();
        let mut texture = context.create_texture(4, 64).unwrap();
        context.upload(&mut texture, &image).unwrap();
        context
            .reproject_to_geographic(&mut texture, &native, &extent)
            .unwrap();

        // The Mercator midpoint row sits at about 66.5° N, well north of the
        // geographic midpoint, so blue covers more than half the output.
        let output = texture.level(0).unwrap();
        assert!(texture.is_reprojected());
        assert_eq!(output.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(output.get_pixel(0, 32), &Rgba([0, 0, 255, 255]));
        assert_eq!(output.get_pixel(0, 63), &Rgba([0, 0, 255, 255]));
        assert_eq!(context.reprojections(), 1);
    }

    #[test]
    fn test_maximum_anisotropy_is_reported() {
        assert_eq!(HeadlessContext::new().maximum_texture_filter_anisotropy(), None);
        assert_eq!(
            HeadlessContext::new()
                .with_maximum_anisotropy(16.0)
                .maximum_texture_filter_anisotropy(),
            Some(16.0)
        );
    }
}
