//! Decimal <-> base-unit conversion

use crate::error::{Error, Result};

/// Largest decimals count whose scale `10^decimals` fits in a `u128`
pub const MAX_DECIMALS: u8 = 38;

fn scale(decimals: u8) -> Result<u128> {
    10u128.checked_pow(decimals as u32).ok_or_else(|| {
        Error::Validation(format!(
            "Token decimals {} exceed the supported maximum of {}",
            decimals, MAX_DECIMALS
        ))
    })
}

/// Convert a whole-unit amount to base units with `decimals` places.
///
/// Uses the shortest decimal representation of `amount`, so `0.0123` with 18
/// decimals becomes exactly `12300000000000000`. Extra fractional digits are
/// truncated.
pub fn parse_units(amount: f64, decimals: u8) -> Result<u128> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::Validation(format!("Invalid amount: {}", amount)));
    }
    scale(decimals)?;

    let repr = amount.to_string();
    let (whole, frac) = match repr.split_once('.') {
        Some((w, f)) => (w, f),
        None => (repr.as_str(), ""),
    };

    let decimals = decimals as usize;
    let mut frac: String = frac.chars().take(decimals).collect();
    while frac.len() < decimals {
        frac.push('0');
    }

    let digits = format!("{}{}", whole, frac);
    digits
        .trim_start_matches('0')
        .parse::<u128>()
        .or_else(|e| {
            if digits.chars().all(|c| c == '0') {
                Ok(0)
            } else {
                Err(e)
            }
        })
        .map_err(|e| Error::Validation(format!("Amount {} out of range: {}", amount, e)))
}

/// Format base units as a decimal string, trimming trailing zeros
pub fn format_units(value: u128, decimals: u8) -> Result<String> {
    let scale = scale(decimals)?;
    let whole = value / scale;
    let frac = value % scale;

    if frac == 0 {
        return Ok(format!("{}.0", whole));
    }

    let frac = format!("{:0width$}", frac, width = decimals as usize);
    Ok(format!("{}.{}", whole, frac.trim_end_matches('0')))
}
