//! Cycle orchestration
//!
//! `STARTING -> RUNNING_CYCLE -> COOLING_DOWN -> RUNNING_CYCLE -> ...`, with a
//! `CRITICAL_BACKOFF` detour only when a panic escapes the whole cycle body.
//! Features run strictly one after another: every action signs from the same
//! wallet, so concurrent submission would race on nonces.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::cooldown::CooldownScheduler;
use super::stats::{CycleStats, StatusSnapshot};
use crate::error::Result;
use crate::feature::{
    ExecutionContext, Feature, FeatureDescriptor, FeatureFactory, FeatureKind, FeaturePipeline,
    FeatureResult,
};
use crate::notify::Notifier;
use crate::strategy::StrategyKind;

/// Outcome of one pass over the feature list
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub duration: Duration,
    pub results: Vec<FeatureResult>,
}

impl CycleReport {
    pub fn successes(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// `(feature, error)` for every failed result, in execution order
    pub fn failures(&self) -> Vec<(String, String)> {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.feature.clone(), e.to_string())))
            .collect()
    }
}

pub struct Orchestrator {
    features: Vec<Box<dyn Feature>>,
    stats: CycleStats,
    pipeline: FeaturePipeline,
    notifier: Notifier,
    cooldown: CooldownScheduler,
    factory: FeatureFactory,
    report_interval: Duration,
    critical_backoff: Duration,
}

impl Orchestrator {
    pub fn new(
        pipeline: FeaturePipeline,
        notifier: Notifier,
        cooldown: CooldownScheduler,
        factory: FeatureFactory,
    ) -> Self {
        Self {
            features: Vec::new(),
            stats: CycleStats::new(),
            pipeline,
            notifier,
            cooldown,
            factory,
            report_interval: Duration::from_secs(24 * 3600),
            critical_backoff: Duration::from_secs(300),
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_critical_backoff(mut self, backoff: Duration) -> Self {
        self.critical_backoff = backoff;
        self
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn add_feature(&mut self, feature: Box<dyn Feature>) {
        info!("Added feature: {}", feature.name());
        self.features.push(feature);
    }

    /// Build a strategy-backed feature by tag and append it
    pub fn add_dex_feature(
        &mut self,
        feature_type: &str,
        strategy: &str,
        repetitions: u32,
    ) -> Result<FeatureDescriptor> {
        let feature = self
            .factory
            .dex(feature_type, strategy, repetitions, (None, None))?;
        let descriptor = feature.descriptor();
        info!(
            "Added DEX feature: {} ({}, {} repetitions)",
            descriptor.name, strategy, repetitions
        );
        self.features.push(feature);
        Ok(descriptor)
    }

    /// Remove the first feature tagged with `kind` and `strategy`
    pub fn remove_dex_feature(
        &mut self,
        kind: FeatureKind,
        strategy: StrategyKind,
    ) -> Option<Box<dyn Feature>> {
        let index = self
            .features
            .iter()
            .position(|f| f.descriptor().matches(kind, strategy))?;
        let removed = self.features.remove(index);
        info!("Removed DEX feature: {}", removed.name());
        Some(removed)
    }

    /// Descriptors of every strategy-backed feature, in execution order
    pub fn dex_features(&self) -> Vec<FeatureDescriptor> {
        self.features
            .iter()
            .map(|f| f.descriptor())
            .filter(|d| d.strategy.is_some())
            .collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name()).collect()
    }

    fn dex_labels(&self) -> Vec<String> {
        self.dex_features().iter().map(|d| d.label()).collect()
    }

    /// Derived status; reads state only
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from_stats(&self.stats, self.feature_names(), self.dex_labels())
    }

    /// Run every feature once, in order
    pub async fn execute_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let cycle = self.stats.begin_cycle();
        info!(cycle, "Starting automation cycle #{}", cycle);

        let mut results = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            let name = feature.name();
            let (min, max) = feature.amount_range();
            let ctx = ExecutionContext::new(cycle, name.clone()).with_amounts(min, max);

            let result = match AssertUnwindSafe(self.pipeline.execute(feature.as_ref(), ctx))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(feature = %name, cycle, "{} panicked: {}", name, message);
                    FeatureResult::failure(
                        name.clone(),
                        self.pipeline.wallet(),
                        format!("panicked: {}", message),
                    )
                }
            };

            if result.is_success() {
                self.stats.record_success(&name);
            } else {
                self.stats.record_failure();
            }
            results.push(result);
        }

        let report = CycleReport {
            cycle,
            duration: started.elapsed(),
            results,
        };

        info!(
            cycle,
            "Cycle #{} completed in {}ms: {}/{} features succeeded",
            cycle,
            report.duration.as_millis(),
            report.successes(),
            report.results.len()
        );

        let failures = report.failures();
        if !failures.is_empty() {
            self.notifier
                .send_cycle_summary(cycle, report.duration, &failures)
                .await;
        }

        if self.stats.report_due(self.report_interval) {
            self.notifier.send_periodic_report(&self.stats.report()).await;
            self.stats.mark_reported();
        }

        report
    }

    /// One loop iteration: a cycle, then either the cooldown or the critical backoff
    async fn step(&mut self) {
        match AssertUnwindSafe(self.execute_cycle()).catch_unwind().await {
            Ok(_) => {
                self.cooldown.wait().await;
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Critical error in automation cycle: {}", message);
                self.notifier
                    .send_critical(&message, self.critical_backoff)
                    .await;
                warn!(
                    "Backing off for {}s before the next cycle",
                    self.critical_backoff.as_secs()
                );
                tokio::time::sleep(self.critical_backoff).await;
            }
        }
    }

    /// Drive cycles forever; stops only when the task is dropped
    pub async fn run(&mut self) {
        info!(
            "Starting automation with {} feature(s): {}",
            self.features.len(),
            self.feature_names().join(", ")
        );
        self.notifier
            .send_startup(&self.feature_names(), &self.dex_labels())
            .await;

        loop {
            self.step().await;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{RetryExecutor, RetryPolicy};
    use crate::config::{Config, CooldownConfig};
    use crate::error::Error;
    use crate::feature::ActionOutput;
    use crate::ledger::{LedgerActions, SimulatedLedger};
    use crate::notify::{MemorySink, NotificationSink};
    use crate::strategy::{StrategyFactory, TokenRegistry, TokenSampler};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct Stub {
        name: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Feature for Stub {
        fn descriptor(&self) -> FeatureDescriptor {
            FeatureDescriptor {
                name: self.name.to_string(),
                kind: FeatureKind::Upload,
                strategy: None,
                repetitions: 1,
            }
        }

        async fn perform_action(&self, _ctx: &ExecutionContext) -> crate::error::Result<ActionOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(ActionOutput {
                    summary: format!("{} ok", self.name),
                    tx_hash: None,
                    file_size_kb: None,
                    details: serde_json::Value::Null,
                }),
                Behaviour::Fail => Err(Error::ExternalCall(format!("{} reverted", self.name))),
                Behaviour::Panic => panic!("{} exploded", self.name),
            }
        }
    }

    fn stub(name: &'static str, behaviour: Behaviour) -> (Box<dyn Feature>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let feature: Box<dyn Feature> = Box::new(Stub {
            name,
            behaviour,
            calls: calls.clone(),
        });
        (feature, calls)
    }

    /// Records like `MemorySink` but panics on the first cycle summary
    #[derive(Default)]
    struct SummaryPanicSink {
        inner: MemorySink,
        tripped: AtomicBool,
    }

    #[async_trait]
    impl NotificationSink for SummaryPanicSink {
        async fn send_message(&self, text: &str) {
            if text.contains("CYCLE SUMMARY") && !self.tripped.swap(true, Ordering::SeqCst) {
                panic!("summary delivery exploded");
            }
            self.inner.send_message(text).await;
        }
    }

    fn orchestrator() -> (Orchestrator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (orchestrator_with(sink.clone()), sink)
    }

    fn orchestrator_with(sink: Arc<dyn NotificationSink>) -> Orchestrator {
        let config = Config::default();
        let notifier = Notifier::new(sink, "0G");
        let ledger = Arc::new(SimulatedLedger::from_config(&config));
        let wallet = ledger.signer_address().to_string();
        let registry = Arc::new(TokenRegistry::from_config(&config.tokens).unwrap());

        let strategies = StrategyFactory::new(
            ledger.clone(),
            registry.clone(),
            Arc::new(TokenSampler::new(Some(3))),
        );
        let factory = FeatureFactory::new(strategies, ledger.clone(), ledger.clone(), wallet.clone());
        let pipeline = FeaturePipeline::new(
            ledger,
            registry,
            RetryExecutor::new(RetryPolicy::default(), notifier.clone()),
            notifier.clone(),
            wallet,
        );
        let cooldown = CooldownScheduler::new(
            CooldownConfig {
                min_hours: 0,
                max_hours: 0,
                min_minutes: 1,
                max_minutes: 1,
            },
            Some(1),
        );

        Orchestrator::new(pipeline, notifier, cooldown, factory)
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_feature_does_not_stop_cycle() {
        let (mut orchestrator, sink) = orchestrator();
        let (a, _) = stub("A", Behaviour::Succeed);
        let (b, _) = stub("B", Behaviour::Fail);
        let (c, c_calls) = stub("C", Behaviour::Succeed);
        orchestrator.add_feature(a);
        orchestrator.add_feature(b);
        orchestrator.add_feature(c);

        let report = orchestrator.execute_cycle().await;

        assert_eq!(report.cycle, 1);
        assert_eq!(report.successes(), 2);
        assert_eq!(report.failures()[0].0, "B");
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);

        let stats = orchestrator.stats();
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.per_feature["A"], 1);
        assert_eq!(sink.count_containing("CYCLE SUMMARY"), 1);
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.contains("CYCLE SUMMARY") && m.contains("• B: External call failed: B reverted")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_cycle_sends_no_summary() {
        let (mut orchestrator, sink) = orchestrator();
        let (a, _) = stub("A", Behaviour::Succeed);
        orchestrator.add_feature(a);

        orchestrator.execute_cycle().await;
        assert_eq!(sink.count_containing("CYCLE SUMMARY"), 0);
        assert_eq!(sink.count_containing("PERIODIC REPORT"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_feature_counts_as_failure() {
        let (mut orchestrator, _sink) = orchestrator();
        let (a, _) = stub("A", Behaviour::Panic);
        let (b, b_calls) = stub("B", Behaviour::Succeed);
        orchestrator.add_feature(a);
        orchestrator.add_feature(b);

        let report = orchestrator.execute_cycle().await;

        assert_eq!(report.results[0].error(), Some("panicked: A exploded"));
        assert!(report.results[1].is_success());
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_report_after_interval() {
        let (orchestrator, sink) = orchestrator();
        let mut orchestrator = orchestrator.with_report_interval(Duration::from_secs(3600));
        let (a, _) = stub("A", Behaviour::Succeed);
        orchestrator.add_feature(a);

        orchestrator.execute_cycle().await;
        assert_eq!(sink.count_containing("PERIODIC REPORT"), 0);

        tokio::time::advance(Duration::from_secs(3600)).await;
        orchestrator.execute_cycle().await;
        assert_eq!(sink.count_containing("PERIODIC REPORT"), 1);

        orchestrator.execute_cycle().await;
        assert_eq!(sink.count_containing("PERIODIC REPORT"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_is_idempotent() {
        let (mut orchestrator, _) = orchestrator();
        let (a, _) = stub("A", Behaviour::Succeed);
        orchestrator.add_feature(a);
        orchestrator.execute_cycle().await;

        let first = orchestrator.status();
        let second = orchestrator.status();
        assert_eq!(first, second);
        assert_eq!(first.total_runs, 1);
        assert_eq!(first.success_rate, "100.00%");
        assert_eq!(first.features, vec!["A"]);
    }

    #[test]
    fn test_add_dex_feature_round_trip() {
        let (mut orchestrator, _) = orchestrator();

        let added = orchestrator.add_dex_feature("swap", "zer0", 4).unwrap();
        assert_eq!(added.name, "Token Swap (ZER0)");

        let inventory = orchestrator.dex_features();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].strategy, Some(StrategyKind::Zer0));
        assert_eq!(inventory[0].repetitions, 4);
        assert_eq!(orchestrator.status().dex_features, vec!["SWAP (zer0, 4x)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_panic_backs_off_then_resumes() {
        let sink = Arc::new(SummaryPanicSink::default());
        let backoff = Duration::from_secs(120);
        let mut orchestrator = orchestrator_with(sink.clone()).with_critical_backoff(backoff);
        let (a, calls) = stub("A", Behaviour::Fail);
        orchestrator.add_feature(a);

        let started = Instant::now();
        orchestrator.step().await;

        assert!(started.elapsed() >= backoff);
        assert_eq!(sink.inner.count_containing("CRITICAL ERROR"), 1);
        assert!(sink
            .inner
            .messages()
            .iter()
            .any(|m| m.contains("CRITICAL ERROR") && m.contains("summary delivery exploded")));
        assert_eq!(sink.inner.count_containing("CYCLE SUMMARY"), 0);
        assert_eq!(orchestrator.stats().total_runs, 1);

        // next iteration is an ordinary cycle
        orchestrator.step().await;

        assert_eq!(orchestrator.stats().total_runs, 2);
        assert_eq!(orchestrator.stats().failed, 2);
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(sink.inner.count_containing("CYCLE SUMMARY"), 1);
        assert_eq!(sink.inner.count_containing("CRITICAL ERROR"), 1);
    }

    #[test]
    fn test_add_dex_feature_rejects_zero_repetitions() {
        let (mut orchestrator, _) = orchestrator();
        let err = orchestrator.add_dex_feature("swap", "jaine", 0).unwrap_err();
        assert!(err.is_validation());
        assert!(orchestrator.dex_features().is_empty());
    }

    #[test]
    fn test_add_dex_feature_rejects_unknown_strategy() {
        let (mut orchestrator, _) = orchestrator();
        let err = orchestrator.add_dex_feature("swap", "uniswap", 1).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStrategyType(_)));
        assert!(orchestrator.feature_names().is_empty());
    }

    #[test]
    fn test_remove_dex_feature() {
        let (mut orchestrator, _) = orchestrator();
        orchestrator.add_dex_feature("swap", "jaine", 1).unwrap();
        orchestrator.add_dex_feature("liquidity", "jaine", 2).unwrap();

        assert!(orchestrator
            .remove_dex_feature(FeatureKind::Swap, StrategyKind::Zer0)
            .is_none());

        let removed = orchestrator
            .remove_dex_feature(FeatureKind::Liquidity, StrategyKind::Jaine)
            .unwrap();
        assert_eq!(removed.name(), "Add Liquidity (JAINE)");
        assert_eq!(orchestrator.feature_names(), vec!["Token Swap (JAINE)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cycles_with_cooldown() {
        let (mut orchestrator, sink) = orchestrator();
        let (a, calls) = stub("A", Behaviour::Succeed);
        orchestrator.add_feature(a);

        // one-minute cooldowns: cycles start at 0s, 60s and 120s
        let outcome = tokio::time::timeout(Duration::from_secs(150), orchestrator.run()).await;
        assert!(outcome.is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(orchestrator.stats().total_runs, 3);
        assert_eq!(sink.count_containing("AUTOMATION STARTED"), 1);
    }
}
