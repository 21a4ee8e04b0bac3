//! Cumulative cycle statistics and the derived status view

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::notify::PeriodicReport;

/// Process-lifetime counters owned by the orchestrator
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub total_runs: u64,
    pub successful: u64,
    pub failed: u64,
    /// Successful outcomes per feature name
    pub per_feature: BTreeMap<String, u64>,
    pub start_time: Instant,
    pub started_at: DateTime<Local>,
    pub last_run_time: Option<DateTime<Local>>,
    last_report: Instant,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            total_runs: 0,
            successful: 0,
            failed: 0,
            per_feature: BTreeMap::new(),
            start_time: now,
            started_at: Local::now(),
            last_run_time: None,
            last_report: now,
        }
    }

    /// Start a new cycle and return its number
    pub fn begin_cycle(&mut self) -> u64 {
        self.total_runs += 1;
        self.last_run_time = Some(Local::now());
        self.total_runs
    }

    pub fn record_success(&mut self, feature: &str) {
        self.successful += 1;
        *self.per_feature.entry(feature.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Percentage of successful feature outcomes
    pub fn success_rate(&self) -> f64 {
        let outcomes = self.successful + self.failed;
        if outcomes == 0 {
            0.0
        } else {
            self.successful as f64 / outcomes as f64 * 100.0
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Uptime as `Xh Ym`
    pub fn format_uptime(&self) -> String {
        let secs = self.uptime().as_secs();
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }

    pub fn report_due(&self, interval: Duration) -> bool {
        self.last_report.elapsed() >= interval
    }

    pub fn mark_reported(&mut self) {
        self.last_report = Instant::now();
    }

    pub fn report(&self) -> PeriodicReport {
        PeriodicReport {
            total_runs: self.total_runs,
            successful: self.successful,
            failed: self.failed,
            success_rate: self.success_rate(),
            features: self
                .per_feature
                .iter()
                .map(|(name, count)| (name.clone(), *count))
                .collect(),
            uptime: self.format_uptime(),
        }
    }
}

/// Derived, read-only status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub total_runs: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: String,
    pub uptime: String,
    pub last_run: Option<DateTime<Local>>,
    pub features: Vec<String>,
    pub dex_features: Vec<String>,
}

impl StatusSnapshot {
    pub fn from_stats(stats: &CycleStats, features: Vec<String>, dex_features: Vec<String>) -> Self {
        Self {
            is_running: true,
            total_runs: stats.total_runs,
            successful: stats.successful,
            failed: stats.failed,
            success_rate: format!("{:.2}%", stats.success_rate()),
            uptime: stats.format_uptime(),
            last_run: stats.last_run_time,
            features,
            dex_features,
        }
    }
}
