//! Randomized parameter selection
//!
//! Every random choice a strategy makes (pairs, amounts) goes through one
//! seedable generator so runs can be reproduced.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::sync::Mutex;

use super::registry::TokenRegistry;
use super::types::{LiquidityPair, SwapPair};
use crate::error::{Error, Result};

/// Decimal places kept on sampled swap amounts
pub const SWAP_AMOUNT_DECIMALS: u32 = 4;

/// Decimal places kept on sampled liquidity amounts
pub const LIQUIDITY_AMOUNT_DECIMALS: u32 = 5;

/// Seedable sampler shared by strategies
pub struct TokenSampler {
    rng: Mutex<StdRng>,
}

impl TokenSampler {
    /// Create a new sampler with optional seed
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::Internal("sampler lock poisoned".into()))?;
        Ok(f(&mut rng))
    }

    /// Two distinct indices in `0..len`; the second draw repeats until it differs
    pub fn distinct_indices(&self, len: usize) -> Result<(usize, usize)> {
        if len < 2 {
            return Err(Error::Validation(format!(
                "need at least 2 tokens to form a pair, have {}",
                len
            )));
        }
        self.with_rng(|rng| {
            let first = rng.gen_range(0..len);
            let mut second = rng.gen_range(0..len);
            while second == first {
                second = rng.gen_range(0..len);
            }
            (first, second)
        })
    }

    pub fn swap_pair(&self, registry: &TokenRegistry) -> Result<SwapPair> {
        let (a, b) = self.distinct_indices(registry.len())?;
        Ok(SwapPair {
            token_in: token_at(registry, a)?,
            token_out: token_at(registry, b)?,
        })
    }

    pub fn liquidity_pair(&self, registry: &TokenRegistry) -> Result<LiquidityPair> {
        let (a, b) = self.distinct_indices(registry.len())?;
        Ok(LiquidityPair::ordered(
            token_at(registry, a)?,
            token_at(registry, b)?,
        ))
    }

    /// Uniform draw in `[min, max]`, rounded to `decimals` places
    pub fn amount(&self, min: f64, max: f64, decimals: u32) -> Result<f64> {
        if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
            return Err(Error::Validation(format!(
                "invalid amount range [{}, {}]",
                min, max
            )));
        }
        let raw = self.with_rng(|rng| rng.gen_range(min..=max))?;
        let scale = 10f64.powi(decimals as i32);
        Ok(((raw * scale).round() / scale).clamp(min, max))
    }
}

fn token_at(registry: &TokenRegistry, index: usize) -> Result<super::types::TokenInfo> {
    registry
        .get(index)
        .cloned()
        .ok_or_else(|| Error::Internal(format!("token index {} out of range", index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn registry() -> TokenRegistry {
        TokenRegistry::from_config(&Config::default().tokens).unwrap()
    }

    #[test]
    fn test_liquidity_pair_always_ordered_and_distinct() {
        let sampler = TokenSampler::new(Some(7));
        let registry = registry();
        for _ in 0..500 {
            let pair = sampler.liquidity_pair(&registry).unwrap();
            assert_ne!(pair.token0().symbol, pair.token1().symbol);
            assert!(pair.token0().address.to_lowercase() <= pair.token1().address.to_lowercase());
        }
    }

    #[test]
    fn test_swap_pair_distinct() {
        let sampler = TokenSampler::new(None);
        let registry = registry();
        for _ in 0..500 {
            let pair = sampler.swap_pair(&registry).unwrap();
            assert_ne!(pair.token_in.address, pair.token_out.address);
        }
    }

    #[test]
    fn test_seeded_sequences_repeat() {
        let registry = registry();
        let a = TokenSampler::new(Some(42));
        let b = TokenSampler::new(Some(42));
        for _ in 0..20 {
            assert_eq!(a.swap_pair(&registry).unwrap(), b.swap_pair(&registry).unwrap());
            assert_eq!(
                a.amount(0.01, 0.1, SWAP_AMOUNT_DECIMALS).unwrap(),
                b.amount(0.01, 0.1, SWAP_AMOUNT_DECIMALS).unwrap()
            );
        }
    }

    #[test]
    fn test_amount_precision_and_bounds() {
        let sampler = TokenSampler::new(Some(1));
        for _ in 0..200 {
            let swap = sampler.amount(0.01, 0.1, SWAP_AMOUNT_DECIMALS).unwrap();
            assert!((0.01..=0.1).contains(&swap));
            assert!(((swap * 1e4).round() - swap * 1e4).abs() < 1e-6);

            let liq = sampler
                .amount(0.001, 0.01, LIQUIDITY_AMOUNT_DECIMALS)
                .unwrap();
            assert!((0.001..=0.01).contains(&liq));
            assert!(((liq * 1e5).round() - liq * 1e5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_ranges() {
        let sampler = TokenSampler::new(Some(1));
        assert_eq!(sampler.amount(0.05, 0.05, 4).unwrap(), 0.05);
        assert!(sampler.amount(0.1, 0.01, 4).is_err());
        assert!(sampler.distinct_indices(1).is_err());
    }
}
