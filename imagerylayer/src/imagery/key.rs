//! Imagery tile identity.

use std::fmt;

/// Address of one imagery tile within a layer's tiling scheme.
///
/// Keys are plain integer triples so they hash cheaply and compare
/// structurally; two keys are equal exactly when they name the same tile.
///
/// # Example
///
/// ```
/// use imagerylayer::imagery::ImageryTileKey;
///
/// let key = ImageryTileKey::new(3, 4, 5);
/// assert_eq!(key.x(), 3);
/// assert_eq!(key.y(), 4);
/// assert_eq!(key.level(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageryTileKey {
    /// Tile column, growing eastward.
    x: u32,
    /// Tile row, growing southward.
    y: u32,
    /// Level of detail.
    level: u32,
}

impl ImageryTileKey {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl fmt::Display for ImageryTileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}
