//! Automatable features
//!
//! A [`Feature`] supplies preflight checks and one action; the shared
//! [`FeaturePipeline`] wraps them with balance logging, retries and
//! notifications. Variants:
//!
//! - `upload` - generate and upload a synthetic artifact
//! - `swap` - N randomized swaps through a DEX strategy
//! - `liquidity` - N randomized liquidity mints through a DEX strategy

pub mod liquidity;
pub mod pipeline;
pub mod swap;
pub mod upload;

use async_trait::async_trait;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::artifact::ArtifactGenerator;
use crate::config::{FeatureConfig, UploadConfig};
use crate::error::{Error, Result};
use crate::ledger::{ArtifactStore, BalanceReader};
use crate::strategy::{StrategyDescriptor, StrategyFactory, StrategyKind};

pub use liquidity::LiquidityFeature;
pub use pipeline::FeaturePipeline;
pub use swap::SwapFeature;
pub use upload::UploadFeature;

/// Feature variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Upload,
    Swap,
    Liquidity,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Upload => "upload",
            FeatureKind::Swap => "swap",
            FeatureKind::Liquidity => "liquidity",
        }
    }

    /// Whether the variant is backed by a DEX strategy
    pub fn is_dex(&self) -> bool {
        matches!(self, FeatureKind::Swap | FeatureKind::Liquidity)
    }

    /// Amount range used for bounds the configuration leaves unset
    pub fn default_amount_range(&self) -> Option<(f64, f64)> {
        match self {
            FeatureKind::Swap => Some(swap::DEFAULT_SWAP_RANGE),
            FeatureKind::Liquidity => Some(liquidity::DEFAULT_LIQUIDITY_RANGE),
            FeatureKind::Upload => None,
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeatureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "upload" => Ok(FeatureKind::Upload),
            "swap" => Ok(FeatureKind::Swap),
            "liquidity" | "add_liquidity" => Ok(FeatureKind::Liquidity),
            _ => Err(Error::UnsupportedFeatureType(s.to_string())),
        }
    }
}

/// Tag stored alongside every feature instance, used for lookup and removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDescriptor {
    pub name: String,
    pub kind: FeatureKind,
    pub strategy: Option<StrategyKind>,
    pub repetitions: u32,
}

impl FeatureDescriptor {
    pub fn matches(&self, kind: FeatureKind, strategy: StrategyKind) -> bool {
        self.kind == kind && self.strategy == Some(strategy)
    }

    /// Inventory label, e.g. `SWAP (jaine, 3x)`
    pub fn label(&self) -> String {
        match self.strategy {
            Some(strategy) => format!(
                "{} ({}, {}x)",
                self.kind.as_str().to_uppercase(),
                strategy,
                self.repetitions
            ),
            None => self.name.clone(),
        }
    }
}

/// Per-invocation parameters handed to a feature
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    pub cycle_number: u64,
    pub feature_name: String,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Filled in by the pipeline
    pub wallet_address: Option<String>,
    /// Filled in by the pipeline
    pub balance: Option<f64>,
}

impl ExecutionContext {
    pub fn new(cycle_number: u64, feature_name: impl Into<String>) -> Self {
        Self {
            cycle_number,
            feature_name: feature_name.into(),
            min_amount: None,
            max_amount: None,
            wallet_address: None,
            balance: None,
        }
    }

    pub fn with_amounts(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// Configured range, falling back to `default` for unset bounds
    pub fn amount_range(&self, default: (f64, f64)) -> (f64, f64) {
        (
            self.min_amount.unwrap_or(default.0),
            self.max_amount.unwrap_or(default.1),
        )
    }
}

/// What a successful action reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutput {
    pub summary: String,
    pub tx_hash: Option<String>,
    pub file_size_kb: Option<f64>,
    /// Strategy-specific payload
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeatureOutcome {
    Success(ActionOutput),
    Failure { error: String },
}

/// One feature's result for one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureResult {
    pub feature: String,
    pub wallet: String,
    pub balance: f64,
    pub outcome: FeatureOutcome,
}

impl FeatureResult {
    pub fn failure(feature: impl Into<String>, wallet: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            wallet: wallet.into(),
            balance: 0.0,
            outcome: FeatureOutcome::Failure {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FeatureOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FeatureOutcome::Failure { error } => Some(error),
            FeatureOutcome::Success(_) => None,
        }
    }
}

/// One automatable action
#[async_trait]
pub trait Feature: Send + Sync {
    fn descriptor(&self) -> FeatureDescriptor;

    fn name(&self) -> String {
        self.descriptor().name
    }

    /// Configured amount bounds copied into each execution context
    fn amount_range(&self) -> (Option<f64>, Option<f64>) {
        (None, None)
    }

    /// Strategy backing this feature, if any
    fn strategy(&self) -> Option<StrategyDescriptor> {
        None
    }

    /// Fail with a validation error when the action cannot succeed
    async fn pre_execution_checks(&self, _ctx: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    async fn perform_action(&self, ctx: &ExecutionContext) -> Result<ActionOutput>;

    async fn post_execution_cleanup(&self, _ctx: &ExecutionContext, _result: &FeatureResult) {}
}

/// Builds features from configuration or by tag
#[derive(Clone)]
pub struct FeatureFactory {
    strategies: StrategyFactory,
    balances: Arc<dyn BalanceReader>,
    store: Arc<dyn ArtifactStore>,
    wallet: String,
    upload: UploadConfig,
    repetition_pause: Duration,
    seed: Option<u64>,
}

impl FeatureFactory {
    pub fn new(
        strategies: StrategyFactory,
        balances: Arc<dyn BalanceReader>,
        store: Arc<dyn ArtifactStore>,
        wallet: impl Into<String>,
    ) -> Self {
        Self {
            strategies,
            balances,
            store,
            wallet: wallet.into(),
            upload: UploadConfig::default(),
            repetition_pause: Duration::from_secs(10),
            seed: None,
        }
    }

    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    pub fn with_repetition_pause(mut self, pause: Duration) -> Self {
        self.repetition_pause = pause;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn upload(&self) -> Box<dyn Feature> {
        let generator = ArtifactGenerator::new(&self.upload, self.seed);
        Box::new(UploadFeature::new(
            self.store.clone(),
            self.balances.clone(),
            generator,
            self.upload.min_balance,
            self.wallet.clone(),
        ))
    }

    /// Build a strategy-backed feature; fails on unknown type or strategy tags
    pub fn dex(
        &self,
        feature_type: &str,
        strategy: &str,
        repetitions: u32,
        amounts: (Option<f64>, Option<f64>),
    ) -> Result<Box<dyn Feature>> {
        let kind: FeatureKind = feature_type.parse()?;
        let dex = self.strategies.create(strategy)?;
        if repetitions == 0 {
            return Err(Error::Validation(format!(
                "{} feature needs at least 1 repetition",
                kind
            )));
        }

        let feature: Box<dyn Feature> = match kind {
            FeatureKind::Swap => Box::new(
                SwapFeature::new(dex, repetitions, self.balances.clone(), self.wallet.clone())
                    .with_pause(self.repetition_pause)
                    .with_amounts(amounts.0, amounts.1),
            ),
            FeatureKind::Liquidity => Box::new(
                LiquidityFeature::new(dex, repetitions, self.balances.clone(), self.wallet.clone())
                    .with_pause(self.repetition_pause)
                    .with_amounts(amounts.0, amounts.1),
            ),
            FeatureKind::Upload => {
                return Err(Error::UnsupportedFeatureType(format!(
                    "{} is not a DEX feature",
                    feature_type
                )))
            }
        };
        Ok(feature)
    }

    pub fn from_config(&self, config: &FeatureConfig) -> Result<Box<dyn Feature>> {
        let kind: FeatureKind = config.kind.parse()?;
        if !kind.is_dex() {
            return Ok(self.upload());
        }
        let strategy = config.strategy.as_deref().ok_or_else(|| {
            Error::Config(format!("feature '{}' requires a strategy", config.kind))
        })?;
        self.dex(
            &config.kind,
            strategy,
            config.repetitions,
            (config.min_amount, config.max_amount),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ledger::SimulatedLedger;
    use crate::strategy::{TokenRegistry, TokenSampler};

    fn factory() -> FeatureFactory {
        let config = Config::default();
        let ledger = Arc::new(SimulatedLedger::from_config(&config));
        let strategies = StrategyFactory::new(
            ledger.clone(),
            Arc::new(TokenRegistry::from_config(&config.tokens).unwrap()),
            Arc::new(TokenSampler::new(Some(1))),
        );
        FeatureFactory::new(strategies, ledger.clone(), ledger, "0xabc")
    }

    #[test]
    fn test_feature_kind_parse() {
        assert_eq!("Swap".parse::<FeatureKind>().unwrap(), FeatureKind::Swap);
        assert_eq!(
            "liquidity".parse::<FeatureKind>().unwrap(),
            FeatureKind::Liquidity
        );
        assert!(matches!(
            "bridge".parse::<FeatureKind>(),
            Err(Error::UnsupportedFeatureType(_))
        ));
        assert!(!FeatureKind::Upload.is_dex());
    }

    #[test]
    fn test_descriptor_label() {
        let descriptor = FeatureDescriptor {
            name: "Token Swap (JAINE)".into(),
            kind: FeatureKind::Swap,
            strategy: Some(StrategyKind::Jaine),
            repetitions: 3,
        };
        assert_eq!(descriptor.label(), "SWAP (jaine, 3x)");
        assert!(descriptor.matches(FeatureKind::Swap, StrategyKind::Jaine));
        assert!(!descriptor.matches(FeatureKind::Liquidity, StrategyKind::Jaine));
    }

    #[test]
    fn test_factory_builds_default_feature_set() {
        let factory = factory();
        let features: Vec<_> = Config::default()
            .features
            .iter()
            .map(|f| factory.from_config(f).unwrap().descriptor())
            .collect();

        assert_eq!(features[0].kind, FeatureKind::Upload);
        assert_eq!(features[1].strategy, Some(StrategyKind::Jaine));
        assert_eq!(features[2].kind, FeatureKind::Liquidity);
        assert_eq!(features[3].repetitions, 2);
    }

    #[test]
    fn test_factory_rejects_unknown_tags() {
        let factory = factory();
        assert!(matches!(
            factory.dex("swap", "uniswap", 1, (None, None)),
            Err(Error::UnsupportedStrategyType(_))
        ));
        assert!(matches!(
            factory.dex("bridge", "jaine", 1, (None, None)),
            Err(Error::UnsupportedFeatureType(_))
        ));
        assert!(factory.dex("upload", "jaine", 1, (None, None)).is_err());
    }

    #[test]
    fn test_factory_rejects_zero_repetitions() {
        let factory = factory();
        assert!(matches!(
            factory.dex("swap", "jaine", 0, (None, None)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            factory.dex("liquidity", "zer0", 0, (None, None)),
            Err(Error::Validation(_))
        ));
        assert_eq!(
            factory.dex("swap", "zer0", 1, (None, None)).unwrap().descriptor().repetitions,
            1
        );
    }

    #[test]
    fn test_context_amount_range() {
        let ctx = ExecutionContext::new(1, "Token Swap").with_amounts(Some(0.02), None);
        assert_eq!(ctx.amount_range((0.01, 0.1)), (0.02, 0.1));
    }
}
