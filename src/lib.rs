//! Chain Automation Library
//!
//! Cycle-driven automation of uploads, swaps and liquidity provisioning
//! against a ledger network, with retries, randomized cooldowns and
//! best-effort notifications.

pub mod artifact;
pub mod automation;
pub mod cli;
pub mod config;
pub mod error;
pub mod feature;
pub mod ledger;
pub mod notify;
pub mod strategy;

// Re-export commonly used types
pub use automation::Orchestrator;
pub use config::Config;
pub use error::{Error, Result};
