//! Imagery tile lifecycle states.

/// Lifecycle state of an imagery tile.
///
/// ```text
/// Unloaded ──request──► Transitioning ──► Received ──upload──► TextureLoaded ──► Ready
///    ▲                        │
///    ├──── deferred ──────────┤
///    │                        ├──► Invalid (no imagery for this tile)
///    └──── retry ──── Failed ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageryState {
    /// Nothing loaded; eligible for a request.
    Unloaded,
    /// A request is in flight.
    Transitioning,
    /// Image payload decoded and held on the CPU.
    Received,
    /// Payload uploaded into a texture.
    TextureLoaded,
    /// Texture reprojected and sampler configured; ready to render.
    Ready,
    /// The last attempt failed; may be retried.
    Failed,
    /// The provider has no imagery for this tile. Never retried.
    Invalid,
}

impl ImageryState {
    /// True for states the pipeline will not advance on its own.
    pub fn is_settled(&self) -> bool {
        matches!(self, ImageryState::Ready | ImageryState::Invalid)
    }

    /// Short lowercase label for logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ImageryState::Unloaded => "unloaded",
            ImageryState::Transitioning => "transitioning",
            ImageryState::Received => "received",
            ImageryState::TextureLoaded => "texture_loaded",
            ImageryState::Ready => "ready",
            ImageryState::Failed => "failed",
            ImageryState::Invalid => "invalid",
        }
    }
}
