//! Ledger collaborators
//!
//! The automation core never signs or encodes transactions itself. It talks to
//! three capabilities:
//!
//! ```text
//! BalanceReader  - native / token balances (observability + preflight)
//! LedgerActions  - allowance, approve, swap, mint, pool management
//! ArtifactStore  - storage-network uploads
//! ```
//!
//! Two implementations are provided: [`GatewayClient`] (HTTP signing gateway)
//! and [`SimulatedLedger`] (in-memory, used for dry runs and tests).

pub mod gateway;
pub mod simulated;
pub mod units;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

pub use gateway::GatewayClient;
pub use simulated::SimulatedLedger;
pub use units::{format_units, parse_units, MAX_DECIMALS};

/// Receipt status code for a successfully executed transaction
pub const RECEIPT_STATUS_SUCCESS: u8 = 1;

/// Token balance as read from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub amount: f64,
    pub symbol: String,
    pub decimals: u8,
}

/// Receipt of a finalized transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: u8,
    #[serde(default)]
    pub block_number: Option<u64>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == RECEIPT_STATUS_SUCCESS
    }

    /// Turn a non-success receipt into an external call error
    pub fn ensure_success(self, action: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::TransactionReverted {
                action: action.to_string(),
                tx_hash: self.tx_hash,
            })
        }
    }
}

/// Parameters for a single-hop exact-input swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapParams {
    pub token_in: String,
    pub token_out: String,
    pub fee: u32,
    pub recipient: String,
    pub deadline: u64,
    /// Base units, serialized as a decimal string
    #[serde(with = "u128_string")]
    pub amount_in: u128,
    #[serde(with = "u128_string")]
    pub amount_out_minimum: u128,
    #[serde(with = "u128_string")]
    pub sqrt_price_limit_x96: u128,
}

/// Parameters for minting a concentrated-liquidity position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintParams {
    pub token0: String,
    pub token1: String,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    #[serde(with = "u128_string")]
    pub amount0_desired: u128,
    #[serde(with = "u128_string")]
    pub amount1_desired: u128,
    #[serde(with = "u128_string")]
    pub amount0_min: u128,
    #[serde(with = "u128_string")]
    pub amount1_min: u128,
    pub recipient: String,
    pub deadline: u64,
}

/// `IncreaseLiquidity` event data emitted by a mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncreaseLiquidity {
    pub token_id: String,
    pub liquidity: String,
    #[serde(with = "u128_string")]
    pub amount0: u128,
    #[serde(with = "u128_string")]
    pub amount1: u128,
}

/// Receipt of a mint, with the decoded liquidity event when present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintReceipt {
    #[serde(flatten)]
    pub receipt: TxReceipt,
    #[serde(default)]
    pub increase_liquidity: Option<IncreaseLiquidity>,
}

/// Balance reads against the ledger
#[async_trait]
pub trait BalanceReader: Send + Sync {
    /// Native balance of `address`, in whole units
    async fn native_balance(&self, address: &str) -> Result<f64>;

    /// Balance of `token` held by `owner`, in whole units
    async fn token_balance(&self, token: &str, owner: &str) -> Result<TokenBalance>;
}

/// Transaction-submitting surface of the ledger
///
/// Every submitting method waits for finality and returns the receipt as-is;
/// callers decide what a non-success status means.
#[async_trait]
pub trait LedgerActions: Send + Sync {
    /// Address of the signing identity
    fn signer_address(&self) -> &str;

    async fn allowance(&self, token: &str, owner: &str, spender: &str) -> Result<u128>;

    async fn approve(&self, token: &str, spender: &str, amount: u128) -> Result<TxReceipt>;

    async fn swap_exact_input_single(&self, router: &str, params: &SwapParams) -> Result<TxReceipt>;

    async fn mint_position(&self, manager: &str, params: &MintParams) -> Result<MintReceipt>;

    async fn pool_exists(&self, manager: &str, token0: &str, token1: &str, fee: u32) -> Result<bool>;

    async fn create_pool(
        &self,
        manager: &str,
        token0: &str,
        token1: &str,
        fee: u32,
        sqrt_price_x96: u128,
    ) -> Result<TxReceipt>;
}

/// Storage network upload
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a local file; zero identifiers means the content may already exist
    async fn upload(&self, path: &Path) -> Result<Vec<String>>;
}

/// Serde helper: u128 as decimal string (JSON numbers lose precision)
pub(crate) mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_status() {
        let ok = TxReceipt {
            tx_hash: "0x1".into(),
            status: 1,
            block_number: Some(10),
        };
        assert!(ok.clone().ensure_success("swap").is_ok());

        let reverted = TxReceipt { status: 0, ..ok };
        let err = reverted.ensure_success("swap").unwrap_err();
        assert!(matches!(err, Error::TransactionReverted { .. }));
    }

    #[test]
    fn test_swap_params_serialize_amounts_as_strings() {
        let params = SwapParams {
            token_in: "0xa".into(),
            token_out: "0xb".into(),
            fee: 500,
            recipient: "0xc".into(),
            deadline: 1,
            amount_in: 10_000_000_000_000_000,
            amount_out_minimum: 0,
            sqrt_price_limit_x96: 0,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"amount_in\":\"10000000000000000\""));
    }

    #[test]
    fn test_mint_receipt_flattened() {
        let json = r#"{
            "tx_hash": "0xfeed",
            "status": 1,
            "increase_liquidity": {
                "token_id": "42",
                "liquidity": "1000",
                "amount0": "5",
                "amount1": "7"
            }
        }"#;
        let receipt: MintReceipt = serde_json::from_str(json).unwrap();
        assert!(receipt.receipt.is_success());
        assert_eq!(receipt.increase_liquidity.unwrap().token_id, "42");
    }
}
