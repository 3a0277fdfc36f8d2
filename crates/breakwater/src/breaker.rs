//! Execution gate: the public circuit-breaker entry point.
//!
//! The gate serializes calls through a single-flight async critical
//! section, consults the state machine before invoking the guarded
//! operation, classifies the outcome, and returns a structured result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{BreakerConfig, Threshold};
use crate::error::ConfigError;
use crate::machine::{BreakerState, StateMachine, TransitionObserver};

/// A raw outcome the gate can classify: anything exposing an HTTP status.
pub trait Outcome {
    /// The HTTP status code of the completed call.
    fn status(&self) -> StatusCode;
}

impl Outcome for StatusCode {
    fn status(&self) -> StatusCode {
        *self
    }
}

impl<B> Outcome for http::Response<B> {
    fn status(&self) -> StatusCode {
        http::Response::status(self)
    }
}

#[cfg(feature = "reqwest")]
impl Outcome for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

/// Result of a guarded call.
///
/// A `GuardResult` with no outcome means the guarded operation was never
/// invoked: the gate refused admission because the circuit was open.
#[derive(Debug)]
pub struct GuardResult<R> {
    state: BreakerState,
    outcome: Option<R>,
}

impl<R> GuardResult<R> {
    fn rejected() -> Self {
        Self {
            state: BreakerState::Open,
            outcome: None,
        }
    }

    fn completed(state: BreakerState, outcome: R) -> Self {
        Self {
            state,
            outcome: Some(outcome),
        }
    }

    /// The breaker state observed when this result was produced.
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// The raw outcome, if the operation was invoked.
    pub fn outcome(&self) -> Option<&R> {
        self.outcome.as_ref()
    }

    /// Consume the result, yielding the raw outcome if present.
    pub fn into_outcome(self) -> Option<R> {
        self.outcome
    }

    /// Whether the gate refused to invoke the operation.
    pub fn is_rejected(&self) -> bool {
        self.outcome.is_none()
    }
}

impl<R: Outcome> GuardResult<R> {
    /// Whether the operation ran and completed with a 2xx status.
    pub fn is_success(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(|outcome| outcome.status().is_success())
    }
}

/// Circuit-breaker guard around one logical dependency.
///
/// A breaker instance is created once, alongside the client it protects,
/// and mutated only through the gate's sequential critical section. See
/// the crate docs for the state machine and the concurrency contract.
pub struct CircuitBreaker {
    /// Single-flight slot: at most one guarded call in flight at a time.
    /// The state machine lives inside it, so holding the slot is holding
    /// the exclusive right to mutate breaker state.
    machine: Mutex<StateMachine>,
    config: BreakerConfig,
    service: String,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a breaker guarding the named dependency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration fails validation.
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            machine: Mutex::new(StateMachine::new(config.clone())),
            config,
            service: service.into(),
        })
    }

    /// Register the transition observer.
    ///
    /// Delivery is synchronous, ordered with respect to the transition, and
    /// the `from` argument reflects the pre-transition state.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.machine.get_mut().set_observer(observer);
        self
    }

    /// Run `operation` through the breaker.
    ///
    /// Acquires the single-flight slot, then checks admission (performing
    /// the lazy `Open → HalfOpen` evaluation). If the circuit is open the
    /// operation is *not* invoked and a rejected [`GuardResult`] is
    /// returned. Otherwise the operation runs while the slot is held; a
    /// completed outcome is classified and recorded, while an `Err` is
    /// recorded as a tracked failure and propagated to the caller
    /// untouched. The slot is released on every exit path.
    pub async fn guard<R, E, F, Fut>(&self, operation: F) -> Result<GuardResult<R>, E>
    where
        R: Outcome,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut machine = self.machine.lock().await;

        if !machine.admit() {
            debug!(service = %self.service, "call rejected: circuit open");
            return Ok(GuardResult::rejected());
        }

        match operation().await {
            Ok(outcome) => {
                machine.classify_and_record(outcome.status());
                Ok(GuardResult::completed(machine.state_raw(), outcome))
            }
            Err(err) => {
                machine.record_failure();
                Err(err)
            }
        }
    }

    /// Current breaker state. Performs the lazy `Open → HalfOpen` check, so
    /// an expired cooldown is observed by the read itself.
    pub async fn state(&self) -> BreakerState {
        self.machine.lock().await.state()
    }

    /// Status code of the most recently classified outcome, if any.
    pub async fn last_status(&self) -> Option<StatusCode> {
        self.machine.lock().await.last_status()
    }

    /// Force the breaker back to `Closed`, from any state.
    ///
    /// The failure window is left untouched; see the crate docs.
    pub async fn reset(&self) {
        self.machine.lock().await.reset();
    }

    /// Name of the guarded dependency.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Cooldown before an open circuit admits a trial call.
    pub fn open_to_half_open(&self) -> Duration {
        self.config.open_to_half_open
    }

    /// Consecutive half-open successes required to close.
    pub fn half_open_to_close(&self) -> u32 {
        self.config.half_open_to_close
    }

    /// Failure threshold that opens a closed circuit.
    pub fn close_to_open(&self) -> Threshold {
        self.config.close_to_open
    }
}
