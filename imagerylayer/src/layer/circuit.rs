//! Layer-wide failure circuit breaker.
//!
//! Stops a layer from hammering a provider that keeps failing.
//!
//! # State Machine
//!
//! ```text
//! Closed --[max_tile_fail_count consecutive failures]--> Open
//! Open --[retry time elapsed]--> HalfOpen (one probe request)
//! HalfOpen --[probe succeeds]--> Closed
//! HalfOpen --[probe fails]--> Open (reset timer)
//! ```
//!
//! Any success closes the circuit and resets the failure streak.

use std::time::{Duration, Instant};

use tracing::info;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests are issued normally.
    Closed,
    /// Requests are blocked.
    Open,
    /// One probe request is outstanding.
    HalfOpen,
}

#[derive(Debug)]
pub(crate) struct FailureCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    threshold: u32,
    cooldown: Duration,
    opened_at: Option<Instant>,
}

impl FailureCircuit {
    pub(crate) fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            threshold,
            cooldown,
            opened_at: None,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether a new request may be issued at `now`.
    ///
    /// Once the cooldown has elapsed, an open circuit lets exactly one probe
    /// through and moves to half-open.
    pub(crate) fn allow_request(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let cooled = self
                    .opened_at
                    .map_or(true, |opened| now.saturating_duration_since(opened) >= self.cooldown);
                if cooled {
                    info!("Imagery circuit breaker: sending probe request");
                    self.state = CircuitState::HalfOpen;
                }
                cooled
            }
        }
    }

    pub(crate) fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            info!(
                failures = self.consecutive_failures,
                "Imagery circuit breaker: closed, resuming requests"
            );
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub(crate) fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        match self.state {
            CircuitState::Closed if self.consecutive_failures >= self.threshold => {
                info!(
                    failures = self.consecutive_failures,
                    threshold = self.threshold,
                    "Imagery circuit breaker: opened, pausing requests"
                );
                self.open(now);
            }
            CircuitState::HalfOpen => {
                info!("Imagery circuit breaker: probe failed, staying open");
                self.open(now);
            }
            _ => {}
        }
    }

    /// A probe that was refused admission never reached the provider, so the
    /// circuit goes back to open without restarting the cooldown.
    pub(crate) fn record_deferral(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Open;
        }
    }

    /// Closes the circuit and forgets the failure streak.
    pub(crate) fn reset(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(5);

    #[test]
    fn test_opens_after_threshold_consecutive_failures() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(3, COOLDOWN);

        circuit.record_failure(now);
        circuit.record_failure(now);
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.allow_request(now));

        circuit.record_failure(now);
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.allow_request(now));
    }

    #[test]
    fn test_success_resets_streak() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(3, COOLDOWN);

        circuit.record_failure(now);
        circuit.record_failure(now);
        circuit.record_success();
        circuit.record_failure(now);
        circuit.record_failure(now);

        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.consecutive_failures(), 2);
    }

    #[test]
    fn test_half_open_allows_single_probe() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(1, COOLDOWN);
        circuit.record_failure(now);

        let later = now + COOLDOWN;
        assert!(circuit.allow_request(later));
        assert_eq!(circuit.state(), CircuitState::HalfOpen);
        assert!(!circuit.allow_request(later));

        circuit.record_success();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert!(circuit.allow_request(later));
    }

    #[test]
    fn test_failed_probe_restarts_cooldown() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(1, COOLDOWN);
        circuit.record_failure(now);

        let probe_time = now + COOLDOWN;
        assert!(circuit.allow_request(probe_time));
        circuit.record_failure(probe_time);

        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(!circuit.allow_request(probe_time + Duration::from_secs(1)));
        assert!(circuit.allow_request(probe_time + COOLDOWN));
    }

    #[test]
    fn test_deferred_probe_can_be_retried_immediately() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(1, COOLDOWN);
        circuit.record_failure(now);

        assert!(circuit.allow_request(now + COOLDOWN));
        circuit.record_deferral();
        assert_eq!(circuit.state(), CircuitState::Open);
        assert!(circuit.allow_request(now + COOLDOWN));
    }

    #[test]
    fn test_reset_closes() {
        let now = Instant::now();
        let mut circuit = FailureCircuit::new(1, COOLDOWN);
        circuit.record_failure(now);
        circuit.reset();
        assert_eq!(circuit.state(), CircuitState::Closed);
        assert_eq!(circuit.consecutive_failures(), 0);
    }
}
