//! Per-host request admission control.
//!
//! Image fetches cannot be cancelled once started, so the only way to keep
//! pending work reorderable is to avoid committing to more fetches than the
//! transport will run at once. Before a fetch is issued, its host must be
//! admitted by a [`RequestThrottle`]; a refused request is postponed, not
//! failed.
//!
//! # Design
//!
//! ```text
//! ImageryLayer A ──┐
//!                  ├──► Arc<dyn RequestThrottle> ──► in-flight count per host
//! ImageryLayer B ──┘
//! ```
//!
//! The throttle is shared by every layer because the transport's per-host
//! ceiling is global. It is injected rather than ambient so tests can
//! substitute their own.
//!
//! Admission hands out a [`RequestPermit`]; dropping the permit returns the
//! slot. Holding the permit for exactly the lifetime of the fetch guarantees
//! one decrement per admitted request whatever the fetch's outcome.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{trace, warn};

/// Default maximum concurrent requests per host.
pub const DEFAULT_MAX_REQUESTS_PER_HOST: usize = 6;

/// Tracks in-flight requests per host and decides admission.
pub trait RequestThrottle: Send + Sync {
    /// Attempts to reserve a request slot for `host`.
    ///
    /// Returns `false` without changing any count if the host is at its
    /// ceiling.
    fn try_acquire(&self, host: &str) -> bool;

    /// Returns a slot previously reserved with [`try_acquire`](Self::try_acquire).
    fn release(&self, host: &str);

    /// Number of requests currently in flight for `host`.
    fn in_flight(&self, host: &str) -> usize;
}

/// Default [`RequestThrottle`] with a fixed ceiling per host.
///
/// Check-and-increment happens under the map's shard lock, so concurrent
/// callers can never push a host past the ceiling.
#[derive(Debug)]
pub struct HostRequestLimiter {
    in_flight: DashMap<String, usize>,
    max_per_host: usize,
}

impl HostRequestLimiter {
    /// Creates a limiter allowing `max_per_host` concurrent requests per host.
    ///
    /// # Panics
    ///
    /// Panics if `max_per_host` is zero.
    pub fn new(max_per_host: usize) -> Self {
        assert!(max_per_host > 0, "max_per_host must be > 0");
        Self {
            in_flight: DashMap::new(),
            max_per_host,
        }
    }

    /// Creates a limiter with [`DEFAULT_MAX_REQUESTS_PER_HOST`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS_PER_HOST)
    }

    /// The process-wide limiter shared by layers that are not given one.
    pub fn shared() -> Arc<dyn RequestThrottle> {
        static SHARED: OnceLock<Arc<HostRequestLimiter>> = OnceLock::new();
        let limiter = SHARED.get_or_init(|| Arc::new(HostRequestLimiter::with_defaults()));
        Arc::clone(limiter) as Arc<dyn RequestThrottle>
    }

    pub fn max_per_host(&self) -> usize {
        self.max_per_host
    }

    /// Total requests in flight across all hosts.
    pub fn total_in_flight(&self) -> usize {
        self.in_flight.iter().map(|entry| *entry.value()).sum()
    }
}

impl Default for HostRequestLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RequestThrottle for HostRequestLimiter {
    fn try_acquire(&self, host: &str) -> bool {
        let mut count = self.in_flight.entry(host.to_string()).or_insert(0);
        if *count >= self.max_per_host {
            trace!(host, in_flight = *count, "Request admission refused");
            return false;
        }
        *count += 1;
        true
    }

    fn release(&self, host: &str) {
        match self.in_flight.get_mut(host) {
            Some(mut count) if *count > 0 => *count -= 1,
            _ => {
                warn!(host, "Released a request slot that was never acquired");
                return;
            }
        }
        self.in_flight.remove_if(host, |_, count| *count == 0);
    }

    fn in_flight(&self, host: &str) -> usize {
        self.in_flight.get(host).map(|count| *count).unwrap_or(0)
    }
}

/// A reserved request slot. Dropping it releases the slot.
#[must_use = "dropping a RequestPermit releases the slot immediately"]
pub struct RequestPermit {
    throttle: Arc<dyn RequestThrottle>,
    host: String,
}

impl RequestPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl std::fmt::Debug for RequestPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPermit")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl Drop for RequestPermit {
    fn drop(&mut self) {
        self.throttle.release(&self.host);
    }
}

/// Result of asking for admission.
#[derive(Debug)]
pub enum Admission {
    /// Admitted; hold the permit until the request settles.
    Granted(RequestPermit),
    /// The URL has no host (e.g. `data:` or `file:`), so it is not throttled.
    Unthrottled,
    /// The host is at its ceiling; try again later.
    Deferred { host: String },
}

/// Extracts the host of `url`, if it has one.
pub fn hostname(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
}

/// Asks `throttle` to admit a request to `url`.
pub fn admit(throttle: &Arc<dyn RequestThrottle>, url: &str) -> Admission {
    let Some(host) = hostname(url) else {
        return Admission::Unthrottled;
    };

    if throttle.try_acquire(&host) {
        Admission::Granted(RequestPermit {
            throttle: Arc::clone(throttle),
            host,
        })
    } else {
        Admission::Deferred { host }
    }
}
