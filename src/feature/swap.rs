//! Repeated randomized swaps through one DEX strategy

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use super::{ActionOutput, ExecutionContext, Feature, FeatureDescriptor, FeatureKind, FeatureResult};
use crate::error::{Error, Result};
use crate::ledger::BalanceReader;
use crate::strategy::{DexStrategy, StrategyDescriptor, SwapOutcome, SwapPair};

/// Swap amount range when none is configured
pub const DEFAULT_SWAP_RANGE: (f64, f64) = (0.01, 0.1);

/// One planned swap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapStep {
    pub pair: SwapPair,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
struct SwapExecution {
    execution_number: u32,
    token_in: String,
    token_out: String,
    amount: f64,
    result: SwapOutcome,
}

pub struct SwapFeature {
    name: String,
    strategy: Arc<dyn DexStrategy>,
    repetitions: u32,
    pause: Duration,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    balances: Arc<dyn BalanceReader>,
    wallet: String,
    /// Plan sampled by preflight and replayed by every attempt
    plan: Mutex<Option<Vec<SwapStep>>>,
}

impl SwapFeature {
    pub fn new(
        strategy: Arc<dyn DexStrategy>,
        repetitions: u32,
        balances: Arc<dyn BalanceReader>,
        wallet: impl Into<String>,
    ) -> Self {
        let name = format!("Token Swap ({})", strategy.kind().as_str().to_uppercase());
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

    fn sample_plan(&self, ctx: &ExecutionContext) -> Result<Vec<SwapStep>> {
        let (min, max) = ctx.amount_range(DEFAULT_SWAP_RANGE);
        (0..self.repetitions)
            .map(|_| {
                Ok(SwapStep {
                    pair: self.strategy.random_swap_pair()?,
                    amount: self.strategy.random_swap_amount(min, max)?,
                })
            })
            .collect()
    }

    fn store_plan(&self, plan: Option<Vec<SwapStep>>) {
        match self.plan.lock() {
            Ok(mut slot) => *slot = plan,
            Err(poisoned) => *poisoned.into_inner() = plan,
        }
    }

    fn current_plan(&self) -> Option<Vec<SwapStep>> {
        self.plan.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl Feature for SwapFeature {
    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor {
            name: self.name.clone(),
            kind: FeatureKind::Swap,
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
            let token = &step.pair.token_in;
            let available = match self.balances.token_balance(&token.address, &self.wallet).await {
                Ok(b) => b.amount,
                Err(e) => {
                    warn!("Failed to get {} balance: {}", token.symbol, e);
                    0.0
                }
            };
            if available < step.amount {
                return Err(Error::InsufficientTokenBalance {
                    token: token.symbol.clone(),
                    available,
                    required: step.amount,
                });
            }
        }

        info!(
            "DEX: {} | Will perform {} swap(s) per cycle",
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
            info!(
                "Executing swap #{}/{} on {}: {} {} to {}",
                i + 1,
                total,
                self.strategy.name(),
                step.amount,
                step.pair.token_in.symbol,
                step.pair.token_out.symbol
            );

            let result = self.strategy.perform_swap(&step.pair, step.amount).await?;
            executions.push(SwapExecution {
                execution_number: i as u32 + 1,
                token_in: step.pair.token_in.symbol.clone(),
                token_out: step.pair.token_out.symbol.clone(),
                amount: step.amount,
                result,
            });

            if i + 1 < total {
                tokio::time::sleep(self.pause).await;
            }
        }

        let tx_hash = executions.last().map(|e| e.result.tx_hash.clone());
        Ok(ActionOutput {
            summary: format!(
                "Completed {} swap(s) on {}",
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

    fn setup(repetitions: u32) -> (SwapFeature, Arc<SimulatedLedger>) {
        let config = Config::default();
        let ledger = Arc::new(SimulatedLedger::from_config(&config));
        let factory = StrategyFactory::new(
            ledger.clone(),
            Arc::new(TokenRegistry::from_config(&config.tokens).unwrap()),
            Arc::new(TokenSampler::new(Some(21))),
        );
        let wallet = ledger.signer_address().to_string();
        let feature = SwapFeature::new(
            factory.create("jaine").unwrap(),
            repetitions,
            ledger.clone(),
            wallet,
        );
        (feature, ledger)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(1, "Token Swap (JAINE)")
    }

    #[test]
    fn test_descriptor() {
        let (feature, _) = setup(3);
        let descriptor = feature.descriptor();
        assert_eq!(descriptor.name, "Token Swap (JAINE)");
        assert_eq!(descriptor.repetitions, 3);
        assert_eq!(feature.strategy().unwrap().name, "Jaine DEX");
    }

    #[tokio::test(start_paused = true)]
    async fn test_executes_the_preflight_plan() {
        let (feature, ledger) = setup(3);
        feature.pre_execution_checks(&ctx()).await.unwrap();
        let plan = feature.current_plan().unwrap();
        assert_eq!(plan.len(), 3);

        let start = tokio::time::Instant::now();
        let output = feature.perform_action(&ctx()).await.unwrap();
        assert_eq!(output.details["total_executions"], 3);
        assert_eq!(output.summary, "Completed 3 swap(s) on JAINE");

        // pauses between repetitions, not after the last one
        assert!(start.elapsed() >= Duration::from_secs(20) && start.elapsed() < Duration::from_secs(21));

        let executed: Vec<f64> = output.details["executions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["amount"].as_f64().unwrap())
            .collect();
        let planned: Vec<f64> = plan.iter().map(|s| s.amount).collect();
        assert_eq!(executed, planned);

        let swaps = ledger.journal().iter().filter(|e| e.starts_with("swap")).count();
        assert_eq!(swaps, 3);
    }

    #[tokio::test]
    async fn test_preflight_names_insufficient_token() {
        let (feature, ledger) = setup(1);
        let wallet = ledger.signer_address().to_string();
        for token in Config::default().tokens {
            ledger.set_token_balance(&token.address, &wallet, 0.0);
        }

        let err = feature.pre_execution_checks(&ctx()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(err, Error::InsufficientTokenBalance { .. }));
        assert!(feature.current_plan().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_clears_plan() {
        let (feature, _) = setup(1);
        feature.pre_execution_checks(&ctx()).await.unwrap();
        let result = FeatureResult::failure("Token Swap (JAINE)", "0x0", "x");
        feature.post_execution_cleanup(&ctx(), &result).await;
        assert!(feature.current_plan().is_none());
    }
}
