//! Expiry sweeping for VpsGate.
//!
//! [`ExpirySweeper`] removes every account whose expiry has passed, through
//! the same orchestrator path as a manual removal. [`SweepScheduler`] runs
//! it periodically and on request.

pub mod scheduler;
pub mod sweeper;

pub use scheduler::{SweepRequest, SweepScheduler, SweepSchedulerHandle};
pub use sweeper::{ExpirySweeper, SweepFailure, SweepReport};
