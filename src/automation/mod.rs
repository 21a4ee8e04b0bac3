//! Cycle driver and its timing/retry machinery
//!
//! - `orchestrator` - the unending cycle loop and admin operations
//! - `retry` - bounded exponential-backoff retry with notifications
//! - `cooldown` - randomized wait between cycles
//! - `stats` - cumulative counters and status snapshots

pub mod cooldown;
pub mod orchestrator;
pub mod retry;
pub mod stats;

pub use cooldown::{format_duration, time_until_next_run, CooldownScheduler, CooldownWindow};
pub use orchestrator::{CycleReport, Orchestrator};
pub use retry::{RetryExecutor, RetryPolicy};
pub use stats::{CycleStats, StatusSnapshot};
