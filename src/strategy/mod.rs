//! DEX strategy system
//!
//! - `types` - strategy tags, token pairs, outcomes
//! - `registry` - the fixed token registry
//! - `sampler` - seedable pair/amount selection
//! - `dex` - router-style venues (Jaine, Zer0)
//!
//! Strategies are built by tag through [`StrategyFactory`].

pub mod dex;
pub mod registry;
pub mod sampler;
pub mod types;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::ledger::LedgerActions;

pub use dex::{DexProfile, RouterDex};
pub use registry::TokenRegistry;
pub use sampler::{TokenSampler, LIQUIDITY_AMOUNT_DECIMALS, SWAP_AMOUNT_DECIMALS};
pub use types::{
    LiquidityOutcome, LiquidityPair, StrategyDescriptor, StrategyKind, SwapOutcome, SwapPair,
    TokenInfo,
};

/// Swap / add-liquidity capability of a DEX venue
#[async_trait]
pub trait DexStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Display name, e.g. `Jaine DEX`
    fn name(&self) -> &str;

    fn registry(&self) -> &TokenRegistry;

    fn sampler(&self) -> &TokenSampler;

    /// Router address used for swaps
    fn swap_contract(&self) -> &str;

    /// Position manager address used for liquidity
    fn liquidity_contract(&self) -> &str;

    fn random_swap_pair(&self) -> Result<SwapPair> {
        self.sampler().swap_pair(self.registry())
    }

    fn random_liquidity_pair(&self) -> Result<LiquidityPair> {
        self.sampler().liquidity_pair(self.registry())
    }

    fn random_swap_amount(&self, min: f64, max: f64) -> Result<f64> {
        self.sampler().amount(min, max, SWAP_AMOUNT_DECIMALS)
    }

    fn random_liquidity_amount(&self, min: f64, max: f64) -> Result<f64> {
        self.sampler().amount(min, max, LIQUIDITY_AMOUNT_DECIMALS)
    }

    fn available_tokens(&self) -> Vec<String> {
        self.registry().symbols()
    }

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            kind: self.kind(),
            name: self.name().to_string(),
            swap_contract: self.swap_contract().to_string(),
            liquidity_contract: self.liquidity_contract().to_string(),
        }
    }

    /// Approve if needed, then swap `amount` of `pair.token_in`
    async fn perform_swap(&self, pair: &SwapPair, amount: f64) -> Result<SwapOutcome>;

    /// Approve both legs if needed, then mint a position
    async fn perform_add_liquidity(
        &self,
        pair: &LiquidityPair,
        amount0: f64,
        amount1: f64,
    ) -> Result<LiquidityOutcome>;
}

/// Builds strategies by tag, sharing one ledger, registry and sampler
#[derive(Clone)]
pub struct StrategyFactory {
    ledger: Arc<dyn LedgerActions>,
    registry: Arc<TokenRegistry>,
    sampler: Arc<TokenSampler>,
}

impl StrategyFactory {
    pub fn new(
        ledger: Arc<dyn LedgerActions>,
        registry: Arc<TokenRegistry>,
        sampler: Arc<TokenSampler>,
    ) -> Self {
        Self {
            ledger,
            registry,
            sampler,
        }
    }

    pub fn registry(&self) -> &Arc<TokenRegistry> {
        &self.registry
    }

    /// Resolve a strategy tag; unknown tags fail with `UnsupportedStrategyType`
    pub fn create(&self, tag: &str) -> Result<Arc<dyn DexStrategy>> {
        let kind: StrategyKind = tag.parse()?;
        Ok(self.create_kind(kind))
    }

    pub fn create_kind(&self, kind: StrategyKind) -> Arc<dyn DexStrategy> {
        info!("Creating {} strategy", kind.display_name());
        Arc::new(RouterDex::new(
            DexProfile::for_kind(kind),
            self.ledger.clone(),
            self.registry.clone(),
            self.sampler.clone(),
        ))
    }
}
