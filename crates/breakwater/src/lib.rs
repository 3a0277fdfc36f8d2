//! # Breakwater
//!
//! A circuit-breaker guard for a single fallible remote call path.
//!
//! A [`CircuitBreaker`] wraps an arbitrary asynchronous operation (modeled
//! as an HTTP call) and protects callers from repeatedly invoking a
//! dependency that is currently failing: recent outcomes are tracked in a
//! bounded window, and once the failure policy is breached the breaker
//! temporarily refuses calls without touching the dependency at all.
//!
//! ## State machine
//!
//! ```text
//! ┌────────┐  window full of     ┌────────┐   cooldown elapsed   ┌──────────┐
//! │ Closed │  recent failures    │  Open  │   (lazily checked)   │ HalfOpen │
//! │        │ ──────────────────► │        │ ───────────────────► │          │
//! └────────┘  (or a 429)         └────────┘                      └──────────┘
//!      ▲                              ▲                               │  │
//!      │        N consecutive        │        any failure            │  │
//!      └─────── successes ───────────┼───────────────────────────────┘  │
//!               ◄────────────────────┴──────────────────────────────────┘
//! ```
//!
//! There is no background timer: the `Open → HalfOpen` transition is
//! evaluated lazily on every state read and every admission check.
//!
//! ## Quick start
//!
//! ```
//! use std::time::Duration;
//!
//! use breakwater::{BreakerConfig, CircuitBreaker, Threshold};
//! use http::StatusCode;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new(
//!     "upstream",
//!     BreakerConfig::new()
//!         .with_close_to_open(Threshold::new(3, Duration::from_secs(60)))
//!         .with_open_to_half_open(Duration::from_secs(30)),
//! )?;
//!
//! let result = breaker
//!     .guard(|| async { Ok::<_, std::io::Error>(StatusCode::OK) })
//!     .await?;
//! assert!(result.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency contract
//!
//! Each breaker instance enforces strict single-flight discipline: at most
//! one guarded call is in flight at a time, including while the circuit is
//! closed. Callers that need independent call paths hold independent
//! breaker instances.

#![deny(unsafe_code)]
#![deny(missing_docs)]

mod breaker;
mod config;
mod error;
mod machine;
mod window;

pub use breaker::{CircuitBreaker, GuardResult, Outcome};
pub use config::{BreakerConfig, Threshold};
pub use error::ConfigError;
pub use machine::{classify, BreakerState, Classification, TransitionObserver};

/// Convenient single-line import of the breaker surface.
pub mod prelude {
    pub use crate::{
        BreakerConfig, BreakerState, CircuitBreaker, GuardResult, Outcome, Threshold,
        TransitionObserver,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
