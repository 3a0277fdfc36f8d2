//! Breaker state machine.
//!
//! Owns the current state, the time of the last transition, the bounded
//! failure window and the half-open success counter, and evaluates every
//! outcome and every admission attempt against the configured thresholds.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::window::{OutcomeRecord, OutcomeWindow};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Normal operation — calls pass through and outcomes are tracked.
    Closed,
    /// Calls are rejected without invoking the dependency.
    Open,
    /// Trial state letting calls through to probe recovery.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Observer notified synchronously on every state transition.
///
/// The notification is delivered *before* the internal state variable is
/// updated, so the `from` argument always reflects the pre-transition
/// value. Observers may rely on this ordering.
pub trait TransitionObserver: Send + Sync {
    /// Called once per transition with the pre- and post-transition states.
    fn on_transition(&self, from: BreakerState, to: BreakerState);
}

/// How the classifier judged a completed raw outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx — counts toward closing a half-open circuit.
    Success,
    /// 5xx — recorded in the failure window.
    TrackedFailure,
    /// 429 — forces the circuit open regardless of the window.
    TripImmediately,
    /// Any other status (e.g. a non-429 4xx) — no state effect.
    Ignored,
}

/// Map an HTTP status code to its breaker classification.
#[must_use]
pub fn classify(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Classification::TripImmediately
    } else if status.is_server_error() {
        Classification::TrackedFailure
    } else {
        Classification::Ignored
    }
}

/// The state machine proper. Mutated only from inside the execution gate's
/// critical section.
pub(crate) struct StateMachine {
    config: BreakerConfig,
    state: BreakerState,
    transitioned_at: Instant,
    window: OutcomeWindow,
    half_open_successes: u32,
    last_status: Option<StatusCode>,
    observer: Option<Arc<dyn TransitionObserver>>,
}

impl StateMachine {
    pub(crate) fn new(config: BreakerConfig) -> Self {
        let window = OutcomeWindow::new(config.close_to_open.failures as usize);
        Self {
            config,
            state: BreakerState::Closed,
            transitioned_at: Instant::now(),
            window,
            half_open_successes: 0,
            last_status: None,
            observer: None,
        }
    }

    pub(crate) fn set_observer(&mut self, observer: Arc<dyn TransitionObserver>) {
        self.observer = Some(observer);
    }

    /// Notify the observer (while `self.state` still holds the old value),
    /// then update the state variable and the transition timestamp.
    fn set_state(&mut self, to: BreakerState) {
        let from = self.state;
        if let Some(observer) = &self.observer {
            observer.on_transition(from, to);
        }
        self.state = to;
        self.transitioned_at = Instant::now();
        if to == BreakerState::Open {
            warn!(%from, %to, "circuit opened");
        } else {
            info!(%from, %to, "circuit transitioned");
        }
    }

    fn move_to_half_open(&mut self) {
        self.set_state(BreakerState::HalfOpen);
        self.half_open_successes = 0;
    }

    /// Lazy `Open → HalfOpen` evaluation. Runs before every state read and
    /// every admission check; there is no background timer.
    fn poll_cooldown(&mut self) {
        if self.state == BreakerState::Open
            && self.transitioned_at.elapsed() >= self.config.open_to_half_open
        {
            self.move_to_half_open();
        }
    }

    /// Current state, after the lazy cooldown check.
    pub(crate) fn state(&mut self) -> BreakerState {
        self.poll_cooldown();
        self.state
    }

    /// State as last set, without the cooldown check. Used by the gate right
    /// after recording an outcome, when the state is known fresh.
    pub(crate) fn state_raw(&self) -> BreakerState {
        self.state
    }

    pub(crate) fn last_status(&self) -> Option<StatusCode> {
        self.last_status
    }

    /// Admission check for the execution gate.
    pub(crate) fn admit(&mut self) -> bool {
        self.poll_cooldown();
        self.state != BreakerState::Open
    }

    /// Close→open condition: the window is full and *every* record in it is
    /// a failure still inside the threshold window measured from now. If the
    /// oldest failure has aged out, this reports false even though the
    /// window is full.
    fn should_open(&self) -> bool {
        let now = Instant::now();
        self.window.is_full()
            && self.window.all(|record| {
                !record.succeeded
                    && now.duration_since(record.at) <= self.config.close_to_open.window
            })
    }

    pub(crate) fn record_success(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= self.config.half_open_to_close {
                self.set_state(BreakerState::Closed);
            }
        }
        // Closed: the window tracks failures only, nothing to record.
    }

    pub(crate) fn record_failure(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.set_state(BreakerState::Open);
        } else {
            self.window.push(OutcomeRecord::failure());
            debug!(window_len = self.window.len(), "tracked failure recorded");
            if self.should_open() {
                self.set_state(BreakerState::Open);
            }
        }
    }

    /// Force the circuit open, bypassing the window entirely.
    fn trip(&mut self) {
        self.set_state(BreakerState::Open);
    }

    /// Classify a completed raw outcome and update the machine.
    pub(crate) fn classify_and_record(&mut self, status: StatusCode) {
        self.last_status = Some(status);
        match classify(status) {
            Classification::Success => self.record_success(),
            Classification::TrackedFailure => self.record_failure(),
            Classification::TripImmediately => self.trip(),
            Classification::Ignored => {}
        }
    }

    /// Force the state to `Closed` regardless of the current state and reset
    /// the transition timestamp.
    ///
    /// Deliberately leaves the outcome window untouched: stale failure
    /// records still inside the close→open window can re-open the circuit on
    /// the next tracked failure.
    pub(crate) fn reset(&mut self) {
        self.set_state(BreakerState::Closed);
    }
}
