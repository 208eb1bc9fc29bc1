//! Conversion between human decimal amounts and planck.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("invalid amount: empty")]
    Empty,
    #[error("invalid amount: {0:?} is not a decimal number")]
    NotANumber(String),
    #[error("invalid amount: {value:?} has more than {decimals} fractional digits")]
    TooPrecise { value: String, decimals: u8 },
    #[error("invalid amount: {0:?} overflows")]
    Overflow(String),
}

/// Parse a decimal string such as `"1.5"` into planck for a token with `decimals`.
///
/// Thousands separators (`,` and `_`) are ignored. Negative values and
/// exponents are rejected.
pub fn to_planck(amount: &str, decimals: u8) -> Result<u128, AmountParseError> {
    let cleaned: String = amount
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    if cleaned.is_empty() {
        return Err(AmountParseError::Empty);
    }

    let (whole, frac) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(AmountParseError::NotANumber(amount.to_string()));
    }
    if frac.len() > usize::from(decimals) {
        return Err(AmountParseError::TooPrecise {
            value: amount.to_string(),
            decimals,
        });
    }

    let overflow = || AmountParseError::Overflow(amount.to_string());
    let scale = 10u128.checked_pow(u32::from(decimals)).ok_or_else(overflow)?;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = usize::from(decimals));
        padded.parse().map_err(|_| overflow())?
    };

    whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(overflow)
}

/// Render planck as a decimal amount with the token symbol, trimming trailing zeros.
#[must_use]
pub fn format_balance(planck: u128, decimals: u8, symbol: &str) -> String {
    let Some(scale) = 10u128.checked_pow(u32::from(decimals)) else {
        return format!("{planck} planck");
    };
    let whole = planck / scale;
    let frac = planck % scale;
    if frac == 0 {
        return format!("{whole} {symbol}");
    }
    let frac = format!("{frac:0>width$}", width = usize::from(decimals));
    format!("{whole}.{} {symbol}", frac.trim_end_matches('0'))
}
