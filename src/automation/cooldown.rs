//! Randomized cooldown between cycles

use chrono::{DateTime, Local};
use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::config::CooldownConfig;

/// One computed cooldown; recomputed every cycle and never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownWindow {
    pub hours: u64,
    pub minutes: u64,
    pub total_duration: Duration,
    pub next_run_time: DateTime<Local>,
}

pub struct CooldownScheduler {
    config: CooldownConfig,
    rng: Mutex<StdRng>,
}

impl CooldownScheduler {
    pub fn new(config: CooldownConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &CooldownConfig {
        &self.config
    }

    /// Draw hours and minutes uniformly from their inclusive ranges
    pub fn generate_random_cooldown(&self) -> CooldownWindow {
        let cfg = &self.config;
        let (hours, minutes) = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            (
                rng.gen_range(cfg.min_hours..=cfg.max_hours.max(cfg.min_hours)),
                rng.gen_range(cfg.min_minutes..=cfg.max_minutes.max(cfg.min_minutes)),
            )
        };

        let total_duration = Duration::from_secs(hours * 3600 + minutes * 60);
        let next_run_time = Local::now()
            + chrono::Duration::from_std(total_duration).unwrap_or_else(|_| chrono::Duration::zero());

        CooldownWindow {
            hours,
            minutes,
            total_duration,
            next_run_time,
        }
    }

    /// Sleep for a freshly drawn cooldown
    pub async fn wait(&self) -> CooldownWindow {
        let window = self.generate_random_cooldown();

        info!(
            "Starting cooldown period | Duration: {}h {}m | Next run: {}",
            window.hours,
            window.minutes,
            window.next_run_time.format("%Y-%m-%d %H:%M:%S")
        );

        tokio::time::sleep(window.total_duration).await;

        info!("Cooldown period completed, resuming operations");
        window
    }
}

/// `1h 2m 3s`, omitting zero components
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// Time left until `next_run`, or `Ready to run` once due
pub fn time_until_next_run(next_run: DateTime<Local>) -> String {
    match (next_run - Local::now()).to_std() {
        Ok(left) if !left.is_zero() => format_duration(left),
        _ => "Ready to run".to_string(),
    }
}
