//! In-memory ledger
//!
//! Stands in for the gateway in dry-run mode. Balances move 1:1 on swaps,
//! mints consume both legs, approvals set allowances exactly, and uploads are
//! identified by the SHA-256 of the file content.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{
    format_units, ArtifactStore, BalanceReader, IncreaseLiquidity, LedgerActions, MintParams,
    MintReceipt, SwapParams, TokenBalance, TxReceipt, RECEIPT_STATUS_SUCCESS,
};
use crate::config::{Config, TokenConfig};
use crate::error::{Error, Result};

/// Simulated ledger state
pub struct SimulatedLedger {
    signer: String,
    native: DashMap<String, f64>,
    /// (token, owner) -> whole units
    tokens: DashMap<(String, String), f64>,
    /// (token, owner, spender) -> base units
    allowances: DashMap<(String, String, String), u128>,
    /// token -> (symbol, decimals)
    metadata: DashMap<String, (String, u8)>,
    /// (manager, token0, token1, fee)
    pools: DashSet<(String, String, String, u32)>,
    block: AtomicU64,
    revert_next: AtomicU32,
    fail_uploads: AtomicU32,
    empty_uploads: AtomicU32,
    journal: Mutex<Vec<String>>,
}

fn key(s: &str) -> String {
    s.to_lowercase()
}

impl SimulatedLedger {
    /// Create an empty ledger for `signer`
    pub fn new(signer: impl Into<String>) -> Self {
        Self {
            signer: signer.into(),
            native: DashMap::new(),
            tokens: DashMap::new(),
            allowances: DashMap::new(),
            metadata: DashMap::new(),
            pools: DashSet::new(),
            block: AtomicU64::new(1),
            revert_next: AtomicU32::new(0),
            fail_uploads: AtomicU32::new(0),
            empty_uploads: AtomicU32::new(0),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Seed a ledger from configuration (dry-run mode)
    pub fn from_config(config: &Config) -> Self {
        let signer = if config.wallet.address.is_empty() {
            "0x000000000000000000000000000000000000dEaD".to_string()
        } else {
            config.wallet.address.clone()
        };

        let ledger = Self::new(signer.clone());
        ledger.set_native_balance(&signer, config.simulation.native_balance);
        for token in &config.tokens {
            ledger.register_token(token);
            ledger.set_token_balance(&token.address, &signer, config.simulation.token_balance);
        }

        info!(
            "Simulated ledger ready: {} native, {} per token across {} tokens",
            config.simulation.native_balance,
            config.simulation.token_balance,
            config.tokens.len()
        );
        ledger
    }

    pub fn register_token(&self, token: &TokenConfig) {
        self.metadata
            .insert(key(&token.address), (token.symbol.clone(), token.decimals));
    }

    pub fn set_native_balance(&self, address: &str, amount: f64) {
        self.native.insert(key(address), amount);
    }

    pub fn set_token_balance(&self, token: &str, owner: &str, amount: f64) {
        self.tokens.insert((key(token), key(owner)), amount);
    }

    /// Make the next `count` submitted swaps/mints return a reverted receipt
    pub fn revert_next(&self, count: u32) {
        self.revert_next.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` uploads fail with a gateway error
    pub fn fail_next_uploads(&self, count: u32) {
        self.fail_uploads.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` uploads succeed without returning any identifier,
    /// as a store does for content it already holds
    pub fn empty_next_uploads(&self, count: u32) {
        self.empty_uploads.store(count, Ordering::SeqCst);
    }

    /// Actions recorded so far, oldest first
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    fn record(&self, entry: String) {
        debug!("Simulated ledger: {}", entry);
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(entry);
        }
    }

    fn decimals(&self, token: &str) -> u8 {
        self.metadata.get(&key(token)).map(|m| m.1).unwrap_or(18)
    }

    fn next_receipt(&self, status: u8) -> TxReceipt {
        let block = self.block.fetch_add(1, Ordering::SeqCst);
        TxReceipt {
            tx_hash: format!("0x{}", uuid::Uuid::new_v4().simple()),
            status,
            block_number: Some(block),
        }
    }

    fn take_revert(&self) -> bool {
        take_one(&self.revert_next)
    }

    fn whole(&self, token: &str, base: u128) -> f64 {
        format_units(base, self.decimals(token))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0)
    }

    /// Read-only balance check, run for every leg before anything is mutated
    fn ensure_balance(&self, token: &str, amount: f64) -> Result<()> {
        let held = self
            .tokens
            .get(&(key(token), key(&self.signer)))
            .map(|b| *b)
            .unwrap_or(0.0);
        if held + f64::EPSILON < amount {
            return Err(Error::ExternalCall(format!(
                "transfer amount exceeds balance ({} < {})",
                held, amount
            )));
        }
        Ok(())
    }

    /// Read-only allowance check, run for every leg before anything is mutated
    fn ensure_allowance(&self, token: &str, spender: &str, amount: u128) -> Result<()> {
        let allowed = self
            .allowances
            .get(&(key(token), key(&self.signer), key(spender)))
            .map(|a| *a)
            .unwrap_or(0);
        if allowed < amount {
            return Err(Error::ExternalCall(format!(
                "insufficient allowance ({} < {})",
                allowed, amount
            )));
        }
        Ok(())
    }

    fn debit(&self, token: &str, amount: f64) -> Result<()> {
        let mut entry = self
            .tokens
            .entry((key(token), key(&self.signer)))
            .or_insert(0.0);
        if *entry + f64::EPSILON < amount {
            return Err(Error::ExternalCall(format!(
                "transfer amount exceeds balance ({} < {})",
                *entry, amount
            )));
        }
        *entry -= amount;
        Ok(())
    }

    fn credit(&self, token: &str, amount: f64) {
        *self
            .tokens
            .entry((key(token), key(&self.signer)))
            .or_insert(0.0) += amount;
    }

    fn spend_allowance(&self, token: &str, spender: &str, amount: u128) -> Result<()> {
        let k = (key(token), key(&self.signer), key(spender));
        let mut allowance = self.allowances.entry(k).or_insert(0);
        if *allowance < amount {
            return Err(Error::ExternalCall(format!(
                "insufficient allowance ({} < {})",
                *allowance, amount
            )));
        }
        *allowance -= amount;
        Ok(())
    }
}

/// Decrement a countdown knob, returning whether it was armed
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl BalanceReader for SimulatedLedger {
    async fn native_balance(&self, address: &str) -> Result<f64> {
        Ok(self.native.get(&key(address)).map(|b| *b).unwrap_or(0.0))
    }

    async fn token_balance(&self, token: &str, owner: &str) -> Result<TokenBalance> {
        let (symbol, decimals) = self
            .metadata
            .get(&key(token))
            .map(|m| m.clone())
            .ok_or_else(|| Error::ExternalCall(format!("Unknown token contract {}", token)))?;
        let amount = self
            .tokens
            .get(&(key(token), key(owner)))
            .map(|b| *b)
            .unwrap_or(0.0);
        Ok(TokenBalance {
            amount,
            symbol,
            decimals,
        })
    }
}

#[async_trait]
impl LedgerActions for SimulatedLedger {
    fn signer_address(&self) -> &str {
        &self.signer
    }

    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<u128> {
        Ok(self
            .allowances
            .get(&(key(token), key(owner), key(spender)))
            .map(|a| *a)
            .unwrap_or(0))
    }

    async fn approve(&self, token: &str, spender: &str, amount: u128) -> Result<TxReceipt> {
        self.allowances
            .insert((key(token), key(&self.signer), key(spender)), amount);
        self.record(format!("approve {} {} {}", token, spender, amount));
        Ok(self.next_receipt(RECEIPT_STATUS_SUCCESS))
    }

    async fn swap_exact_input_single(&self, router: &str, params: &SwapParams) -> Result<TxReceipt> {
        if self.take_revert() {
            self.record(format!("swap reverted {} -> {}", params.token_in, params.token_out));
            return Ok(self.next_receipt(0));
        }

        let amount = self.whole(&params.token_in, params.amount_in);
        self.ensure_allowance(&params.token_in, router, params.amount_in)?;
        self.ensure_balance(&params.token_in, amount)?;

        self.spend_allowance(&params.token_in, router, params.amount_in)?;
        self.debit(&params.token_in, amount)?;
        self.credit(&params.token_out, amount);

        self.record(format!(
            "swap {} {} -> {}",
            amount, params.token_in, params.token_out
        ));
        Ok(self.next_receipt(RECEIPT_STATUS_SUCCESS))
    }

    async fn mint_position(&self, manager: &str, params: &MintParams) -> Result<MintReceipt> {
        if self.take_revert() {
            self.record(format!("mint reverted {}/{}", params.token0, params.token1));
            return Ok(MintReceipt {
                receipt: self.next_receipt(0),
                increase_liquidity: None,
            });
        }

        let amount0 = self.whole(&params.token0, params.amount0_desired);
        let amount1 = self.whole(&params.token1, params.amount1_desired);
        self.ensure_allowance(&params.token0, manager, params.amount0_desired)?;
        self.ensure_allowance(&params.token1, manager, params.amount1_desired)?;
        self.ensure_balance(&params.token0, amount0)?;
        self.ensure_balance(&params.token1, amount1)?;

        self.spend_allowance(&params.token0, manager, params.amount0_desired)?;
        self.spend_allowance(&params.token1, manager, params.amount1_desired)?;
        self.debit(&params.token0, amount0)?;
        self.debit(&params.token1, amount1)?;

        let receipt = self.next_receipt(RECEIPT_STATUS_SUCCESS);
        let token_id = receipt.block_number.unwrap_or_default().to_string();
        self.record(format!(
            "mint {} {} + {} {}",
            amount0, params.token0, amount1, params.token1
        ));

        Ok(MintReceipt {
            receipt,
            increase_liquidity: Some(IncreaseLiquidity {
                token_id,
                liquidity: (params.amount0_desired.min(params.amount1_desired)).to_string(),
                amount0: params.amount0_desired,
                amount1: params.amount1_desired,
            }),
        })
    }

    async fn pool_exists(&self, manager: &str, token0: &str, token1: &str, fee: u32) -> Result<bool> {
        Ok(self
            .pools
            .contains(&(key(manager), key(token0), key(token1), fee)))
    }

    async fn create_pool(
        &self,
        manager: &str,
        token0: &str,
        token1: &str,
        fee: u32,
        _sqrt_price_x96: u128,
    ) -> Result<TxReceipt> {
        self.pools
            .insert((key(manager), key(token0), key(token1), fee));
        self.record(format!("create pool {}/{} fee {}", token0, token1, fee));
        Ok(self.next_receipt(RECEIPT_STATUS_SUCCESS))
    }
}

#[async_trait]
impl ArtifactStore for SimulatedLedger {
    async fn upload(&self, path: &Path) -> Result<Vec<String>> {
        if take_one(&self.fail_uploads) {
            return Err(Error::ExternalCall("simulated upload failure".to_string()));
        }
        if take_one(&self.empty_uploads) {
            self.record(format!("upload {} (already stored)", path.display()));
            return Ok(Vec::new());
        }

        let bytes = tokio::fs::read(path).await?;
        let digest = Sha256::digest(&bytes);
        let root: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.record(format!("upload {} ({} bytes)", path.display(), bytes.len()));
        Ok(vec![format!("0x{}", root)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::parse_units;

    const SIGNER: &str = "0x00000000000000000000000000000000000000aa";
    const TOKEN_A: &str = "0x1000000000000000000000000000000000000001";
    const TOKEN_B: &str = "0x2000000000000000000000000000000000000002";
    const ROUTER: &str = "0x9000000000000000000000000000000000000009";

    fn ledger() -> SimulatedLedger {
        let ledger = SimulatedLedger::new(SIGNER);
        for (symbol, address) in [("AAA", TOKEN_A), ("BBB", TOKEN_B)] {
            ledger.register_token(&TokenConfig {
                symbol: symbol.into(),
                address: address.into(),
                decimals: 18,
            });
            ledger.set_token_balance(address, SIGNER, 10.0);
        }
        ledger
    }

    fn swap_params(amount: f64) -> SwapParams {
        SwapParams {
            token_in: TOKEN_A.into(),
            token_out: TOKEN_B.into(),
            fee: 500,
            recipient: SIGNER.into(),
            deadline: 0,
            amount_in: parse_units(amount, 18).unwrap(),
            amount_out_minimum: 0,
            sqrt_price_limit_x96: 0,
        }
    }

    #[tokio::test]
    async fn test_swap_moves_balances() {
        let ledger = ledger();
        let params = swap_params(1.5);
        ledger.approve(TOKEN_A, ROUTER, params.amount_in).await.unwrap();

        let receipt = ledger.swap_exact_input_single(ROUTER, &params).await.unwrap();
        assert!(receipt.is_success());

        let a = ledger.token_balance(TOKEN_A, SIGNER).await.unwrap();
        let b = ledger.token_balance(TOKEN_B, SIGNER).await.unwrap();
        assert!((a.amount - 8.5).abs() < 1e-9);
        assert!((b.amount - 11.5).abs() < 1e-9);
        assert_eq!(ledger.allowance(TOKEN_A, SIGNER, ROUTER).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_swap_without_allowance_fails() {
        let ledger = ledger();
        let result = ledger.swap_exact_input_single(ROUTER, &swap_params(1.0)).await;
        assert!(matches!(result, Err(Error::ExternalCall(_))));
    }

    #[tokio::test]
    async fn test_failed_mint_leaves_state_untouched() {
        const MANAGER: &str = "0x8000000000000000000000000000000000000008";
        let ledger = ledger();
        let amount0 = parse_units(1.0, 18).unwrap();
        let amount1 = parse_units(2.0, 18).unwrap();
        // token1 is never approved
        ledger.approve(TOKEN_A, MANAGER, amount0).await.unwrap();

        let params = MintParams {
            token0: TOKEN_A.into(),
            token1: TOKEN_B.into(),
            fee: 3000,
            tick_lower: -887220,
            tick_upper: 887220,
            amount0_desired: amount0,
            amount1_desired: amount1,
            amount0_min: 0,
            amount1_min: 0,
            recipient: SIGNER.into(),
            deadline: 0,
        };
        let result = ledger.mint_position(MANAGER, &params).await;

        assert!(matches!(result, Err(Error::ExternalCall(_))));
        assert_eq!(ledger.allowance(TOKEN_A, SIGNER, MANAGER).await.unwrap(), amount0);
        let a = ledger.token_balance(TOKEN_A, SIGNER).await.unwrap();
        assert!((a.amount - 10.0).abs() < 1e-9);

        // approved but short on token1 balance
        ledger.approve(TOKEN_B, MANAGER, amount1).await.unwrap();
        ledger.set_token_balance(TOKEN_B, SIGNER, 1.0);
        assert!(ledger.mint_position(MANAGER, &params).await.is_err());
        assert_eq!(ledger.allowance(TOKEN_A, SIGNER, MANAGER).await.unwrap(), amount0);
        assert_eq!(ledger.allowance(TOKEN_B, SIGNER, MANAGER).await.unwrap(), amount1);
        let a = ledger.token_balance(TOKEN_A, SIGNER).await.unwrap();
        assert!((a.amount - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_forced_revert() {
        let ledger = ledger();
        ledger.revert_next(1);
        let receipt = ledger
            .swap_exact_input_single(ROUTER, &swap_params(1.0))
            .await
            .unwrap();
        assert!(!receipt.is_success());
        assert_eq!(ledger.journal().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token_balance_errors() {
        let ledger = ledger();
        let result = ledger
            .token_balance("0x3000000000000000000000000000000000000003", SIGNER)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upload_hashes_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let ids = ledger().upload(&path).await.unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(
            ids[0],
            "0x2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_empty_upload_knob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let ledger = ledger();
        ledger.empty_next_uploads(1);
        assert!(ledger.upload(&path).await.unwrap().is_empty());
        assert_eq!(ledger.upload(&path).await.unwrap().len(), 1);
    }
}
