//! Fixed token registry shared by all strategies

use super::types::TokenInfo;
use crate::config::TokenConfig;
use crate::error::{Error, Result};
use crate::ledger::MAX_DECIMALS;

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<TokenInfo>,
}

impl TokenRegistry {
    /// Build a registry; at least two tokens are needed to form a pair
    pub fn new(tokens: Vec<TokenInfo>) -> Result<Self> {
        if tokens.len() < 2 {
            return Err(Error::Config(format!(
                "token registry needs at least 2 tokens, got {}",
                tokens.len()
            )));
        }
        if let Some(token) = tokens.iter().find(|t| t.decimals > MAX_DECIMALS) {
            return Err(Error::Config(format!(
                "token {} has {} decimals, at most {} are supported",
                token.symbol, token.decimals, MAX_DECIMALS
            )));
        }
        Ok(Self { tokens })
    }

    pub fn from_config(tokens: &[TokenConfig]) -> Result<Self> {
        Self::new(
            tokens
                .iter()
                .map(|t| TokenInfo {
                    symbol: t.symbol.clone(),
                    address: t.address.clone(),
                    decimals: t.decimals,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TokenInfo> {
        self.tokens.get(index)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.symbol.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenInfo> {
        self.tokens.iter()
    }
}
