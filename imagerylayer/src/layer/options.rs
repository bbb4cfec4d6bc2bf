//! Layer-wide parameters.

use std::time::Duration;

use super::LayerError;
use crate::geo::Extent;

/// Default number of consecutive layer-wide failures before loading stops.
pub const DEFAULT_MAX_TILE_FAIL_COUNT: u32 = 10;

/// Default number of attempts allowed for a single tile.
pub const DEFAULT_PER_TILE_MAX_FAIL_COUNT: u32 = 3;

/// Default wait before a failed tile is attempted again.
pub const DEFAULT_FAILED_TILE_RETRY_TIME: Duration = Duration::from_secs(5);

/// Default ratio between imagery texel spacing and terrain geometric error.
pub const DEFAULT_MAX_SCREEN_SPACE_ERROR: f64 = 1.0;

/// Retry and circuit-breaker thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct FailurePolicy {
    /// Consecutive failures, across all tiles, that stop the layer issuing
    /// new requests.
    pub max_tile_fail_count: u32,
    /// Failed attempts after which a tile is no longer retried.
    pub per_tile_max_fail_count: u32,
    /// Minimum time between a failure and the next attempt for that tile.
    pub failed_tile_retry_time: Duration,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            max_tile_fail_count: DEFAULT_MAX_TILE_FAIL_COUNT,
            per_tile_max_fail_count: DEFAULT_PER_TILE_MAX_FAIL_COUNT,
            failed_tile_retry_time: DEFAULT_FAILED_TILE_RETRY_TIME,
        }
    }
}

/// Options for an [`ImageryLayer`](super::ImageryLayer).
///
/// # Example
///
/// ```
/// use imagerylayer::geo::Extent;
/// use imagerylayer::layer::LayerOptions;
/// use std::time::Duration;
///
/// let options = LayerOptions::new()
///     .with_extent(Extent::from_degrees(-10.0, -10.0, 10.0, 10.0).unwrap())
///     .with_alpha(0.5)
///     .with_failed_tile_retry_time(Duration::from_secs(30));
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOptions {
    /// Bound on the imagery this layer shows, on top of the provider's extent.
    pub extent: Extent,
    /// Imagery texel spacing accepted per metre of terrain geometric error.
    pub max_screen_space_error: f64,
    /// Opacity in `[0, 1]`, passed through to the renderer.
    pub alpha: f64,
    pub failure: FailurePolicy,
}

impl LayerOptions {
    pub fn new() -> Self {
        Self {
            extent: Extent::MAX_VALUE,
            max_screen_space_error: DEFAULT_MAX_SCREEN_SPACE_ERROR,
            alpha: 1.0,
            failure: FailurePolicy::default(),
        }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_max_screen_space_error(mut self, error: f64) -> Self {
        self.max_screen_space_error = error;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_failure_policy(mut self, failure: FailurePolicy) -> Self {
        self.failure = failure;
        self
    }

    pub fn with_max_tile_fail_count(mut self, count: u32) -> Self {
        self.failure.max_tile_fail_count = count;
        self
    }

    pub fn with_per_tile_max_fail_count(mut self, count: u32) -> Self {
        self.failure.per_tile_max_fail_count = count;
        self
    }

    pub fn with_failed_tile_retry_time(mut self, retry_time: Duration) -> Self {
        self.failure.failed_tile_retry_time = retry_time;
        self
    }

    /// Checks that every option is in range.
    pub fn validate(&self) -> Result<(), LayerError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(LayerError::InvalidOption {
                name: "alpha",
                reason: format!("{} is outside [0, 1]", self.alpha),
            });
        }
        if !(self.max_screen_space_error.is_finite() && self.max_screen_space_error > 0.0) {
            return Err(LayerError::InvalidOption {
                name: "max_screen_space_error",
                reason: format!("{} must be a positive number", self.max_screen_space_error),
            });
        }
        if self.failure.max_tile_fail_count == 0 {
            return Err(LayerError::InvalidOption {
                name: "max_tile_fail_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.failure.per_tile_max_fail_count == 0 {
            return Err(LayerError::InvalidOption {
                name: "per_tile_max_fail_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.extent.is_empty() {
            return Err(LayerError::InvalidOption {
                name: "extent",
                reason: format!("{} is empty", self.extent),
            });
        }
        Ok(())
    }
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self::new()
    }
}
