//! Finality engine
//!
//! The verifier holds the lifecycle rules, the poll driver runs them against
//! the scores feed once per cycle, and the scheduler decides when cycles run.

pub mod cycle;
pub mod scheduler;
pub mod verifier;

pub use cycle::{watch_dates, CycleReport, PollDriver};
pub use verifier::{FinalityVerifier, Transition, VerifierEvent};
