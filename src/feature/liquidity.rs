//! Repeated randomized liquidity mints through one DEX strategy

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use super::{ActionOutput, ExecutionContext, Feature, FeatureDescriptor, FeatureKind, FeatureResult};
use crate::error::{Error, Result};
use crate::ledger::BalanceReader;
use crate::strategy::{DexStrategy, LiquidityOutcome, LiquidityPair, StrategyDescriptor, TokenInfo};

/// Per-leg amount range when none is configured
pub const DEFAULT_LIQUIDITY_RANGE: (f64, f64) = (0.001, 0.01);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityStep {
    pub pair: LiquidityPair,
    pub amount0: f64,
    pub amount1: f64,
}

#[derive(Debug, Serialize)]
struct LiquidityExecution {
    execution_number: u32,
    token0: String,
    token1: String,
    amount0: f64,
    amount1: f64,
    result: LiquidityOutcome,
}

pub struct LiquidityFeature {
    name: String,
    strategy: Arc<dyn DexStrategy>,
    repetitions: u32,
    pause: Duration,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    balances: Arc<dyn BalanceReader>,
    wallet: String,
    plan: Mutex<Option<Vec<LiquidityStep>>>,
}

impl LiquidityFeature {
    pub fn new(
        strategy: Arc<dyn DexStrategy>,
        repetitions: u32,
        balances: Arc<dyn BalanceReader>,
        wallet: impl Into<String>,
    ) -> Self {
        let name = format!("Add Liquidity ({})", strategy.kind().as_str().to_uppercase());
        Self {
            name,
            strategy,
            repetitions,
            pause: Duration::from_secs(10),
            min_amount: None,
            max_amount: None,
            balances,
            wallet: wallet.into(),
            plan: Mutex::new(None),
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_amounts(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    fn sample_plan(&self, ctx: &ExecutionContext) -> Result<Vec<LiquidityStep>> {
        let (min, max) = ctx.amount_range(DEFAULT_LIQUIDITY_RANGE);
        (0..self.repetitions)
            .map(|_| {
                Ok(LiquidityStep {
                    pair: self.strategy.random_liquidity_pair()?,
                    amount0: self.strategy.random_liquidity_amount(min, max)?,
                    amount1: self.strategy.random_liquidity_amount(min, max)?,
                })
            })
            .collect()
    }

    fn store_plan(&self, plan: Option<Vec<LiquidityStep>>) {
        match self.plan.lock() {
            Ok(mut slot) => *slot = plan,
            Err(poisoned) => *poisoned.into_inner() = plan,
        }
    }

    fn current_plan(&self) -> Option<Vec<LiquidityStep>> {
        self.plan.lock().ok().and_then(|p| p.clone())
    }

    async fn check_leg(&self, token: &TokenInfo, required: f64) -> Result<()> {
        let available = match self.balances.token_balance(&token.address, &self.wallet).await {
            Ok(b) => b.amount,
            Err(e) => {
                warn!("Failed to get {} balance: {}", token.symbol, e);
                0.0
            }
        };
        if available < required {
            return Err(Error::InsufficientTokenBalance {
                token: token.symbol.clone(),
                available,
                required,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Feature for LiquidityFeature {
    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            name: self.name.clone(),
            kind: FeatureKind::Liquidity,
            strategy: Some(self.strategy.kind()),
            repetitions: self.repetitions,
        }
    }

    fn amount_range(&self) -> (Option<f64>, Option<f64>) {
        (self.min_amount, self.max_amount)
    }

    fn strategy(&self) -> Option<StrategyDescriptor> {
        Some(self.strategy.descriptor())
    }

    async fn pre_execution_checks(&self, ctx: &ExecutionContext) -> Result<()> {
        let plan = self.sample_plan(ctx)?;

        for step in &plan {
            self.check_leg(step.pair.token0(), step.amount0).await?;
            self.check_leg(step.pair.token1(), step.amount1).await?;
        }

        info!(
            "DEX: {} | Will perform {} liquidity addition(s) per cycle",
            self.strategy.name(),
            self.repetitions
        );
        self.store_plan(Some(plan));
        Ok(())
    }

    async fn perform_action(&self, ctx: &ExecutionContext) -> Result<ActionOutput> {
        let plan = match self.current_plan() {
            Some(plan) => plan,
            None => self.sample_plan(ctx)?,
        };
        let total = plan.len();
        let mut executions = Vec::with_capacity(total);

        for (i, step) in plan.iter().enumerate() {
            let (token0, token1) = (step.pair.token0(), step.pair.token1());
            info!(
                "Adding liquidity #{}/{} on {}: {} {} + {} {}",
                i + 1,
                total,
                self.strategy.name(),
                step.amount0,
                token0.symbol,
                step.amount1,
                token1.symbol
            );

            let result = self
                .strategy
                .perform_add_liquidity(&step.pair, step.amount0, step.amount1)
                .await?;
            info!("Position minted, token id {}", result.token_id);

            executions.push(LiquidityExecution {
                execution_number: i as u32 + 1,
                token0: token0.symbol.clone(),
                token1: token1.symbol.clone(),
                amount0: step.amount0,
                amount1: step.amount1,
                result,
            });

            if i + 1 < total {
                tokio::time::sleep(self.pause).await;
            }
        }

        let tx_hash = executions.last().map(|e| e.result.tx_hash.clone());
        Ok(ActionOutput {
            summary: format!(
                "Completed {} liquidity addition(s) on {}",
                total,
                self.strategy.kind().as_str().to_uppercase()
            ),
            tx_hash,
            file_size_kb: None,
            details: serde_json::json!({
                "total_executions": total,
                "executions": executions,
            }),
        })
    }

    async fn post_execution_cleanup(&self, _ctx: &ExecutionContext, _result: &FeatureResult) {
        self.store_plan(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ledger::{LedgerActions, SimulatedLedger};
    use crate::strategy::{StrategyFactory, TokenRegistry, TokenSampler};

    fn setup(tag: &str, repetitions: u32) -> (LiquidityFeature, Arc<SimulatedLedger>) {
        let config = Config::default();
        let ledger = Arc::new(SimulatedLedger::from_config(&config));
        let factory = StrategyFactory::new(
            ledger.clone(),
            Arc::new(TokenRegistry::from_config(&config.tokens).unwrap()),
            Arc::new(TokenSampler::new(Some(5))),
        );
        let wallet = ledger.signer_address().to_string();
        let feature = LiquidityFeature::new(
            factory.create(tag).unwrap(),
            repetitions,
            ledger.clone(),
            wallet,
        )
        .with_pause(Duration::from_secs(1));
        (feature, ledger)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(1, "Add Liquidity")
    }

    #[tokio::test(start_paused = true)]
    async fn test_mints_every_planned_position() {
        let (feature, ledger) = setup("zer0", 2);
        assert_eq!(feature.name(), "Add Liquidity (ZER0)");

        feature.pre_execution_checks(&ctx()).await.unwrap();
        let plan = feature.current_plan().unwrap();
        for step in &plan {
            assert!(
                step.pair.token0().address.to_lowercase() < step.pair.token1().address.to_lowercase()
            );
            assert!(step.amount0 >= 0.001 && step.amount0 <= 0.01);
        }

        let output = feature.perform_action(&ctx()).await.unwrap();
        assert_eq!(output.summary, "Completed 2 liquidity addition(s) on ZER0");
        assert_eq!(output.details["total_executions"], 2);
        assert!(output.tx_hash.is_some());

        let mints = ledger
            .journal()
            .iter()
            .filter(|e| e.starts_with("mint"))
            .count();
        assert_eq!(mints, 2);
    }

    #[tokio::test]
    async fn test_preflight_checks_both_legs() {
        let (feature, ledger) = setup("jaine", 1);
        let wallet = ledger.signer_address().to_string();
        for token in Config::default().tokens {
            ledger.set_token_balance(&token.address, &wallet, 0.0);
        }

        let err = feature.pre_execution_checks(&ctx()).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientTokenBalance { available, .. } if available == 0.0));
    }

    #[tokio::test]
    async fn test_configured_amounts_flow_through_context() {
        let (feature, _) = setup("jaine", 3);
        let ctx = ctx().with_amounts(Some(0.005), Some(0.005));
        feature.pre_execution_checks(&ctx).await.unwrap();
        for step in feature.current_plan().unwrap() {
            assert_eq!(step.amount0, 0.005);
            assert_eq!(step.amount1, 0.005);
        }
    }
}
