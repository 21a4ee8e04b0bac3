//! Router-style DEX strategies (Jaine, Zer0)
//!
//! Both venues expose a single-hop `exactInputSingle` router and a
//! non-fungible position manager. They differ in fee tiers, tick range and
//! how defensive the liquidity path is, which [`DexProfile`] captures.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::registry::TokenRegistry;
use super::sampler::TokenSampler;
use super::types::{LiquidityOutcome, LiquidityPair, StrategyKind, SwapOutcome, SwapPair, TokenInfo};
use super::DexStrategy;
use crate::error::{Error, Result};
use crate::ledger::{format_units, parse_units, LedgerActions, MintParams, SwapParams};

/// Transaction deadline offset
pub const DEADLINE_SECS: u64 = 600;

/// Initial sqrt price used when a pool has to be created
pub const INITIAL_SQRT_PRICE_X96: u128 = 1_000_000_000_000_000_000;

const ROUTER: &str = "0xb95B5953FF8ee5D5d9818CdbEfE363ff2191318c";
const POSITION_MANAGER: &str = "0x44f24B66b3BAa3A784dBeee9bFE602f15A2Cc5d9";

/// Venue-specific constants
#[derive(Debug, Clone, PartialEq)]
pub struct DexProfile {
    pub kind: StrategyKind,
    pub router: String,
    pub position_manager: String,
    pub swap_fee: u32,
    pub liquidity_fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Re-read liquidity allowances after approving and fail if still short
    pub verify_liquidity_approval: bool,
    /// Look the pool up before minting and create it when absent
    pub ensure_pool: bool,
}

impl DexProfile {
    pub fn jaine() -> Self {
        Self {
            kind: StrategyKind::Jaine,
            router: ROUTER.to_string(),
            position_manager: POSITION_MANAGER.to_string(),
            swap_fee: 500,
            liquidity_fee: 100,
            tick_lower: -887272,
            tick_upper: 887272,
            verify_liquidity_approval: true,
            ensure_pool: true,
        }
    }

    pub fn zer0() -> Self {
        Self {
            kind: StrategyKind::Zer0,
            router: ROUTER.to_string(),
            position_manager: POSITION_MANAGER.to_string(),
            swap_fee: 500,
            liquidity_fee: 100,
            tick_lower: -56040,
            tick_upper: 55454,
            verify_liquidity_approval: false,
            ensure_pool: false,
        }
    }

    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Jaine => Self::jaine(),
            StrategyKind::Zer0 => Self::zer0(),
        }
    }
}

/// Strategy backed by a router + position manager pair
pub struct RouterDex {
    profile: DexProfile,
    name: String,
    ledger: Arc<dyn LedgerActions>,
    registry: Arc<TokenRegistry>,
    sampler: Arc<TokenSampler>,
}

fn deadline() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64 + DEADLINE_SECS
}

impl RouterDex {
    pub fn new(
        profile: DexProfile,
        ledger: Arc<dyn LedgerActions>,
        registry: Arc<TokenRegistry>,
        sampler: Arc<TokenSampler>,
    ) -> Self {
        let name = format!("{} DEX", profile.kind.display_name());
        Self {
            profile,
            name,
            ledger,
            registry,
            sampler,
        }
    }

    /// Approve `spender` for `amount` of `token` if the current allowance is short.
    ///
    /// With `verify`, the allowance is read back after the approval finalizes.
    async fn ensure_allowance(
        &self,
        token: &TokenInfo,
        spender: &str,
        amount: u128,
        verify: bool,
    ) -> Result<()> {
        let owner = self.ledger.signer_address();
        let allowance = self.ledger.allowance(&token.address, owner, spender).await?;
        if allowance >= amount {
            return Ok(());
        }

        info!(
            "Allowance for {} is not enough ({} < {}), approving...",
            token.symbol, allowance, amount
        );
        self.ledger
            .approve(&token.address, spender, amount)
            .await?
            .ensure_success(&format!("Approve {}", token.symbol))?;
        info!("Approved {} for {} {}", token.symbol, self.name, spender);

        if verify {
            let allowance = self.ledger.allowance(&token.address, owner, spender).await?;
            info!("New allowance for {}: {}", token.symbol, allowance);
            if allowance < amount {
                return Err(Error::AllowanceNotGranted {
                    token: token.symbol.clone(),
                    allowance,
                    required: amount,
                });
            }
        }

        Ok(())
    }

    /// Create the pool when missing. Failures here are logged and ignored.
    async fn ensure_pool(&self, pair: &LiquidityPair) {
        let (token0, token1) = (pair.token0(), pair.token1());
        let manager = &self.profile.position_manager;
        let fee = self.profile.liquidity_fee;

        let result: Result<()> = async {
            if self
                .ledger
                .pool_exists(manager, &token0.address, &token1.address, fee)
                .await?
            {
                info!("Pool {}/{} (fee {}) exists", token0.symbol, token1.symbol, fee);
                return Ok(());
            }
            info!(
                "Pool doesn't exist, creating pool for {}/{} with fee {}",
                token0.symbol, token1.symbol, fee
            );
            self.ledger
                .create_pool(
                    manager,
                    &token0.address,
                    &token1.address,
                    fee,
                    INITIAL_SQRT_PRICE_X96,
                )
                .await?
                .ensure_success("Create pool")?;
            info!("Pool created successfully");
            Ok(())
        }
        .await;

        if let Err(e) = result {
            warn!("Could not check/create pool: {}", e);
        }
    }
}

#[async_trait]
impl DexStrategy for RouterDex {
    fn kind(&self) -> StrategyKind {
        self.profile.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    fn sampler(&self) -> &TokenSampler {
        &self.sampler
    }

    fn swap_contract(&self) -> &str {
        &self.profile.router
    }

    fn liquidity_contract(&self) -> &str {
        &self.profile.position_manager
    }

    async fn perform_swap(&self, pair: &SwapPair, amount: f64) -> Result<SwapOutcome> {
        info!(
            "Performing {} swap {} {} to {}",
            self.name, amount, pair.token_in.symbol, pair.token_out.symbol
        );

        let amount_in = parse_units(amount, pair.token_in.decimals)?;
        self.ensure_allowance(&pair.token_in, &self.profile.router, amount_in, true)
            .await?;

        let params = SwapParams {
            token_in: pair.token_in.address.clone(),
            token_out: pair.token_out.address.clone(),
            fee: self.profile.swap_fee,
            recipient: self.ledger.signer_address().to_string(),
            deadline: deadline(),
            amount_in,
            amount_out_minimum: 0,
            sqrt_price_limit_x96: 0,
        };

        let receipt = self
            .ledger
            .swap_exact_input_single(&self.profile.router, &params)
            .await?
            .ensure_success(&format!("{} swap", self.name))?;

        info!(
            "{} swap {} {} to {} success! txHash: {}",
            self.name, amount, pair.token_in.symbol, pair.token_out.symbol, receipt.tx_hash
        );

        Ok(SwapOutcome {
            amount,
            token_in: pair.token_in.symbol.clone(),
            token_out: pair.token_out.symbol.clone(),
            tx_hash: receipt.tx_hash,
        })
    }

    async fn perform_add_liquidity(
        &self,
        pair: &LiquidityPair,
        amount0: f64,
        amount1: f64,
    ) -> Result<LiquidityOutcome> {
        let (token0, token1) = (pair.token0(), pair.token1());
        info!(
            "Adding {} liquidity: {} {} + {} {}",
            self.name, amount0, token0.symbol, amount1, token1.symbol
        );

        let amount0_desired = parse_units(amount0, token0.decimals)?;
        let amount1_desired = parse_units(amount1, token1.decimals)?;
        let manager = self.profile.position_manager.clone();
        let verify = self.profile.verify_liquidity_approval;

        self.ensure_allowance(token0, &manager, amount0_desired, verify)
            .await?;
        self.ensure_allowance(token1, &manager, amount1_desired, verify)
            .await?;

        if self.profile.ensure_pool {
            self.ensure_pool(pair).await;
        }

        let params = MintParams {
            token0: token0.address.clone(),
            token1: token1.address.clone(),
            fee: self.profile.liquidity_fee,
            tick_lower: self.profile.tick_lower,
            tick_upper: self.profile.tick_upper,
            amount0_desired,
            amount1_desired,
            amount0_min: 0,
            amount1_min: 0,
            recipient: self.ledger.signer_address().to_string(),
            deadline: deadline(),
        };

        let minted = self.ledger.mint_position(&manager, &params).await?;
        let receipt = minted
            .receipt
            .ensure_success(&format!("{} add liquidity", self.name))?;
        let event = minted.increase_liquidity;

        let (actual0, actual1) = event
            .as_ref()
            .map(|e| (e.amount0, e.amount1))
            .unwrap_or((amount0_desired, amount1_desired));
        let token_id = event
            .as_ref()
            .map(|e| e.token_id.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let liquidity = event
            .as_ref()
            .map(|e| e.liquidity.clone())
            .unwrap_or_else(|| "unknown".to_string());

        info!(
            "{} add liquidity success! Token ID: {}, Liquidity: {}, txHash: {}",
            self.name, token_id, liquidity, receipt.tx_hash
        );

        Ok(LiquidityOutcome {
            token_id,
            liquidity,
            token0: token0.symbol.clone(),
            token1: token1.symbol.clone(),
            amount0: format_units(actual0, token0.decimals)?,
            amount1: format_units(actual1, token1.decimals)?,
            tx_hash: receipt.tx_hash,
        })
    }
}
