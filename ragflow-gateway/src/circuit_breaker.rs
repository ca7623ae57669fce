//! Per-dependency circuit breaker (§4.1): trips open after a run of
//! consecutive failures within an observation window, probes a single
//! half-open request after a cooldown, and closes again on that probe's
//! success.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
}

/// Not `Clone` — callers share one instance behind an `Arc` per guarded
/// dependency (embedding provider, LLM provider, vector index, ...).
pub struct CircuitBreaker {
    failure_threshold: u32,
    observation_window: Duration,
    open_duration: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, observation_window: Duration, open_duration: Duration) -> Self {
        Self {
            failure_threshold,
            observation_window,
            open_duration,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                window_start: Instant::now(),
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Whether a request may proceed right now. In `HalfOpen`, exactly one
    /// caller is let through to probe the dependency — callers must report
    /// the outcome via `record_success`/`record_failure`.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_at = inner.opened_at.expect("opened_at set when entering Open");
                if opened_at.elapsed() >= self.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.window_start = Instant::now();
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_failures = 0;
            }
            CircuitState::Closed => {
                if inner.window_start.elapsed() > self.observation_window {
                    inner.window_start = Instant::now();
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }
}
