//! Shared execute path for every feature

use std::sync::Arc;
use tracing::{error, info, warn};

use super::{ExecutionContext, Feature, FeatureOutcome, FeatureResult};
use crate::automation::RetryExecutor;
use crate::ledger::BalanceReader;
use crate::notify::{FailureDetails, Notifier, SuccessDetails};
use crate::strategy::TokenRegistry;

/// Balance logging, preflight, retried action and notifications around a
/// [`Feature`]. Never returns an error: failures become a failed result.
pub struct FeaturePipeline {
    balances: Arc<dyn BalanceReader>,
    registry: Arc<TokenRegistry>,
    retry: RetryExecutor,
    notifier: Notifier,
    wallet: String,
    native_symbol: String,
}

impl FeaturePipeline {
    pub fn new(
        balances: Arc<dyn BalanceReader>,
        registry: Arc<TokenRegistry>,
        retry: RetryExecutor,
        notifier: Notifier,
        wallet: impl Into<String>,
    ) -> Self {
        Self {
            balances,
            registry,
            retry,
            notifier,
            wallet: wallet.into(),
            native_symbol: "0G".to_string(),
        }
    }

    pub fn with_native_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.native_symbol = symbol.into();
        self
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// Native balance, 0 when the read fails
    async fn observe_balances(&self) -> f64 {
        let balance = match self.balances.native_balance(&self.wallet).await {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to get wallet balance: {}", e);
                0.0
            }
        };
        info!(wallet = %self.wallet, "Wallet balance: {:.6} {}", balance, self.native_symbol);

        for token in self.registry.iter() {
            match self.balances.token_balance(&token.address, &self.wallet).await {
                Ok(b) => info!(wallet = %self.wallet, "{} Token balance: {} {}", token.symbol, b.amount, b.symbol),
                Err(e) => {
                    error!("Failed to get {} token balance: {}", token.symbol, e);
                    info!(wallet = %self.wallet, "{} Token balance: 0", token.symbol);
                }
            }
        }

        balance
    }

    pub async fn execute(&self, feature: &dyn Feature, mut ctx: ExecutionContext) -> FeatureResult {
        let name = feature.name();
        info!(feature = %name, cycle = ctx.cycle_number, "Starting {} execution", name);

        let balance = self.observe_balances().await;
        ctx.wallet_address = Some(self.wallet.clone());
        ctx.balance = Some(balance);

        let outcome = match feature.pre_execution_checks(&ctx).await {
            Err(e) => {
                warn!(feature = %name, "Preflight failed: {}", e);
                self.notifier
                    .send_failure(
                        &name,
                        &e.to_string(),
                        &FailureDetails {
                            wallet: Some(self.wallet.clone()),
                            ..FailureDetails::default()
                        },
                    )
                    .await;
                Err(e)
            }
            Ok(()) => {
                self.retry
                    .execute_with_retry(|| feature.perform_action(&ctx), &name, &ctx)
                    .await
            }
        };

        let result = match outcome {
            Ok(output) => {
                self.notifier
                    .send_success(
                        &name,
                        &SuccessDetails {
                            wallet: Some(self.wallet.clone()),
                            tx_hash: output.tx_hash.clone(),
                            balance: Some(balance),
                            file_size_kb: output.file_size_kb,
                            summary: Some(output.summary.clone()),
                        },
                    )
                    .await;
                info!(feature = %name, "{} completed successfully", name);
                FeatureResult {
                    feature: name.clone(),
                    wallet: self.wallet.clone(),
                    balance,
                    outcome: FeatureOutcome::Success(output),
                }
            }
            Err(e) => {
                self.notifier
                    .send_wallet_error(&self.wallet, &name, &e.to_string(), Some(balance))
                    .await;
                error!(feature = %name, "{} failed: {}", name, e);
                FeatureResult {
                    feature: name.clone(),
                    wallet: self.wallet.clone(),
                    balance,
                    outcome: FeatureOutcome::Failure {
                        error: e.to_string(),
                    },
                }
            }
        };

        feature.post_execution_cleanup(&ctx, &result).await;
        result
    }
}
