//! Reuse of released textures.

use std::collections::HashMap;

use image::RgbaImage;
use tracing::trace;

use super::{RenderContext, Texture, TextureError};

/// Default number of idle textures kept per size.
pub const DEFAULT_MAX_IDLE_PER_SIZE: usize = 16;

/// Keeps released textures so later tiles of the same size can reuse them
/// instead of allocating.
#[derive(Debug)]
pub struct TexturePool<T> {
    idle: HashMap<(u32, u32), Vec<T>>,
    max_idle_per_size: usize,
}

impl<T: Texture> TexturePool<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_IDLE_PER_SIZE)
    }

    /// Creates a pool that keeps at most `max_idle_per_size` idle textures of
    /// each size. Extra released textures are dropped.
    pub fn with_capacity(max_idle_per_size: usize) -> Self {
        Self {
            idle: HashMap::new(),
            max_idle_per_size,
        }
    }

    /// Returns a texture holding `image`, reusing an idle one of the same size
    /// when available.
    pub fn create_texture<C>(&mut self, context: &mut C, image: &RgbaImage) -> Result<T, TextureError>
    where
        C: RenderContext<Texture = T>,
    {
        let size = image.dimensions();
        let reused = self.idle.get_mut(&size).and_then(Vec::pop);

        let mut texture = match reused {
            Some(texture) => {
                trace!(width = size.0, height = size.1, "Reusing pooled texture");
                texture
            }
            None => context.create_texture(size.0, size.1)?,
        };

        match context.upload(&mut texture, image) {
            Ok(()) => Ok(texture),
            Err(e) => {
                self.release(texture);
                Err(e)
            }
        }
    }

    /// Returns a texture to the pool.
    pub fn release(&mut self, texture: T) {
        let idle = self
            .idle
            .entry((texture.width(), texture.height()))
            .or_default();
        if idle.len() < self.max_idle_per_size {
            idle.push(texture);
        }
    }

    /// Number of idle textures across all sizes.
    pub fn idle_count(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }

    /// Drops every idle texture.
    pub fn clear(&mut self) {
        self.idle.clear();
    }
}

impl<T: Texture> Default for TexturePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::HeadlessContext;
    use image::Rgba;

    fn image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]))
    }

    #[test]
    fn test_released_texture_is_reused_for_same_size() {
        let mut context = HeadlessContext::new();
        let mut pool = TexturePool::new();

        let first = pool.create_texture(&mut context, &image(4, 4)).unwrap();
        let first_id = first.id();
        pool.release(first);
        assert_eq!(pool.idle_count(), 1);

        let second = pool.create_texture(&mut context, &image(4, 4)).unwrap();
        assert_eq!(second.id(), first_id);
        assert_eq!(context.textures_created(), 1);
        assert_eq!(context.uploads(), 2);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_different_size_allocates() {
        let mut context = HeadlessContext::new();
        let mut pool = TexturePool::new();

        let small = pool.create_texture(&mut context, &image(4, 4)).unwrap();
        pool.release(small);

        let large = pool.create_texture(&mut context, &image(8, 8)).unwrap();
        assert_eq!(large.width(), 8);
        assert_eq!(context.textures_created(), 2);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_idle_textures_are_capped_per_size() {
        let mut context = HeadlessContext::new();
        let mut pool = TexturePool::with_capacity(1);

        let a = pool.create_texture(&mut context, &image(4, 4)).unwrap();
        let b = pool.create_texture(&mut context, &image(4, 4)).unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(), 1);

        pool.clear();
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let mut context = HeadlessContext::new().with_max_texture_size(2);
        let mut pool = TexturePool::new();
        assert!(pool.create_texture(&mut context, &image(4, 4)).is_err());
        assert_eq!(pool.idle_count(), 0);
    }
}
