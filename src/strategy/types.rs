//! Shared types for the DEX strategy system

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Strategy variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Jaine,
    Zer0,
}

impl StrategyKind {
    /// Lowercase tag used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Jaine => "jaine",
            StrategyKind::Zer0 => "zer0",
        }
    }

    /// Human-readable DEX name
    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Jaine => "Jaine",
            StrategyKind::Zer0 => "Zer0",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jaine" => Ok(StrategyKind::Jaine),
            "zer0" => Ok(StrategyKind::Zer0),
            _ => Err(Error::UnsupportedStrategyType(s.to_string())),
        }
    }
}

/// Token registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

/// Directed pair for a swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPair {
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
}

/// Pair for liquidity provisioning, ordered by address
///
/// `token0.address < token1.address` (case-insensitive) holds for every value
/// built through [`LiquidityPair::ordered`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityPair {
    token0: TokenInfo,
    token1: TokenInfo,
}

impl LiquidityPair {
    /// Build a pair, swapping the tokens if needed
    pub fn ordered(a: TokenInfo, b: TokenInfo) -> Self {
        if a.address.to_lowercase() < b.address.to_lowercase() {
            Self { token0: a, token1: b }
        } else {
            Self { token0: b, token1: a }
        }
    }

    pub fn token0(&self) -> &TokenInfo {
        &self.token0
    }

    pub fn token1(&self) -> &TokenInfo {
        &self.token1
    }
}

/// Result of a finalized swap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapOutcome {
    pub amount: f64,
    pub token_in: String,
    pub token_out: String,
    pub tx_hash: String,
}

/// Result of a finalized liquidity mint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityOutcome {
    /// Position id, `unknown` if the mint event was not reported
    pub token_id: String,
    pub liquidity: String,
    pub token0: String,
    pub token1: String,
    pub amount0: String,
    pub amount1: String,
    pub tx_hash: String,
}

/// Introspection view of a strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDescriptor {
    pub kind: StrategyKind,
    pub name: String,
    pub swap_contract: String,
    pub liquidity_contract: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(symbol: &str, address: &str) -> TokenInfo {
        TokenInfo {
            symbol: symbol.into(),
            address: address.into(),
            decimals: 18,
        }
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("jaine".parse::<StrategyKind>().unwrap(), StrategyKind::Jaine);
        assert_eq!("ZER0".parse::<StrategyKind>().unwrap(), StrategyKind::Zer0);
        let err = "uniswap".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedStrategyType(ref s) if s == "uniswap"));
    }

    #[test]
    fn test_liquidity_pair_orders_case_insensitively() {
        let upper = token("BTC", "0x36f6414FF1df609214dDAbA71c84f18bcf00F67d");
        let lower = token("ETH", "0x0fE9B43625fA7EdD663aDcEC0728DD635e4AbF7c");

        let pair = LiquidityPair::ordered(upper.clone(), lower.clone());
        assert_eq!(pair.token0().symbol, "ETH");
        assert_eq!(pair.token1().symbol, "BTC");

        let same = LiquidityPair::ordered(lower, upper);
        assert_eq!(pair, same);
    }
}
