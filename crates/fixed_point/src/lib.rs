//! Conversions between on-chain scaled integers and human-facing decimals.
//!
//! Every amount the protocol exchanges is an unsigned integer with an implied
//! number of decimal places: 18 for token amounts, health factors and WAD
//! ratios, 8 for oracle prices, 27 for RAY indices. The exact paths in this
//! crate (`parse_decimal`, `format_fixed` and everything built on it) work on
//! the integer digits directly and never go through `f64`, so 18-decimal values
//! with more than 15 significant digits survive intact.
//!
//! Parsing truncates fractional digits beyond the scale. A transferable amount is
//! never overstated.
//!
//! `to_decimal_number` and the `*_number` helpers are lossy and exist for
//! previews only. Amounts submitted on-chain must come from `parse_decimal` on
//! the text the user typed.

use alloy_primitives::U256;
use thiserror::Error;

pub const TOKEN_DECIMALS: u8 = 18;
pub const PRICE_DECIMALS: u8 = 8;
pub const WAD_DECIMALS: u8 = 18;
pub const RAY_DECIMALS: u8 = 27;

/// Displayed for a health factor with no debt behind it.
pub const INFINITE_HEALTH: &str = "∞";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid amount {input:?}: {reason}")]
    InvalidFormat { input: String, reason: &'static str },
}

impl CodecError {
    fn invalid(input: &str, reason: &'static str) -> Self {
        CodecError::InvalidFormat {
            input: input.to_string(),
            reason,
        }
    }
}

fn pow10(exp: u8) -> Option<U256> {
    let ten = U256::from(10u64);
    (0..exp).try_fold(U256::from(1u64), |acc, _| acc.checked_mul(ten))
}

fn left_pad_zeros(digits: String, width: usize) -> String {
    if digits.len() >= width {
        return digits;
    }
    let mut padded = "0".repeat(width - digits.len());
    padded.push_str(&digits);
    padded
}

/// Integer part and the zero-padded `scale`-digit fraction of `value`.
fn split_scaled(value: U256, scale: u8) -> (U256, String) {
    let width = usize::from(scale);
    match pow10(scale) {
        Some(divisor) => {
            let integer = value / divisor;
            let remainder = value % divisor;
            (integer, left_pad_zeros(remainder.to_string(), width))
        }
        // 10^scale exceeds U256, so the whole value is fractional.
        None => (U256::ZERO, left_pad_zeros(value.to_string(), width)),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse user-entered decimal text into a value scaled by `10^scale`.
///
/// Empty input and `"0"` are zero. Signs, whitespace, a second decimal point or
/// any non-digit are rejected. Fractional digits past `scale` are dropped.
pub fn parse_decimal(input: &str, scale: u8) -> Result<U256, CodecError> {
    if input.is_empty() || input == "0" {
        return Ok(U256::ZERO);
    }
    if input.starts_with('-') {
        return Err(CodecError::invalid(input, "amounts cannot be negative"));
    }
    if input.chars().any(char::is_whitespace) {
        return Err(CodecError::invalid(input, "whitespace is not allowed"));
    }

    let mut parts = input.split('.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(CodecError::invalid(input, "more than one decimal point"));
    }
    if integer.is_empty() && fraction.is_empty() {
        return Err(CodecError::invalid(input, "no digits"));
    }
    if !integer.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(CodecError::invalid(input, "not a decimal number"));
    }

    let width = usize::from(scale);
    let kept = &fraction[..fraction.len().min(width)];
    let padding = width - kept.len();

    let ten = U256::from(10u64);
    let mut value = U256::ZERO;
    for digit in integer.bytes().chain(kept.bytes()) {
        value = value
            .checked_mul(ten)
            .and_then(|v| v.checked_add(U256::from(u64::from(digit - b'0'))))
            .ok_or_else(|| CodecError::invalid(input, "exceeds the 256-bit range"))?;
    }
    for _ in 0..padding {
        value = value
            .checked_mul(ten)
            .ok_or_else(|| CodecError::invalid(input, "exceeds the 256-bit range"))?;
    }

    Ok(value)
}

/// Lossy conversion for display math and previews.
pub fn to_decimal_number(value: U256, scale: u8) -> f64 {
    let (integer, fraction) = split_scaled(value, scale);
    let text = if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{integer}.{fraction}")
    };
    text.parse().unwrap_or(f64::NAN)
}

fn format_fixed_inner(value: U256, scale: u8, fraction_digits: usize, grouped: bool) -> String {
    let (integer, mut fraction) = split_scaled(value, scale);
    let integer = integer.to_string();
    let mut out = if grouped {
        group_thousands(&integer)
    } else {
        integer
    };

    if fraction_digits == 0 {
        return out;
    }
    if fraction.len() > fraction_digits {
        fraction.truncate(fraction_digits);
    } else {
        fraction.push_str(&"0".repeat(fraction_digits - fraction.len()));
    }
    out.push('.');
    out.push_str(&fraction);
    out
}

/// Exact fixed-point rendering with thousands separators. The fraction is
/// truncated or zero-padded to `fraction_digits`.
pub fn format_fixed(value: U256, scale: u8, fraction_digits: usize) -> String {
    format_fixed_inner(value, scale, fraction_digits, true)
}

/// A ratio scaled by `10^scale` rendered as a percentage.
pub fn format_ratio_as_percent(value: U256, scale: u8, fraction_digits: usize) -> String {
    // x * 100 at scale s is the same integer read at scale s - 2.
    let rendered = match scale.checked_sub(2) {
        Some(percent_scale) => format_fixed(value, percent_scale, fraction_digits),
        None => {
            let factor = pow10(2 - scale).unwrap_or(U256::from(100u64));
            format_fixed(value.saturating_mul(factor), 0, fraction_digits)
        }
    };
    format!("{rendered}%")
}

/// WAD ratio (e.g. reserve factor) as a whole percent, `"10%"`.
pub fn format_wad_percent(value: U256) -> String {
    format_ratio_as_percent(value, WAD_DECIMALS, 0)
}

pub fn format_ray_percent(value: U256, fraction_digits: usize) -> String {
    format_ratio_as_percent(value, RAY_DECIMALS, fraction_digits)
}

/// RAY index with four fractional digits, `"1.0051"`.
pub fn format_ray(value: U256) -> String {
    format_fixed_inner(value, RAY_DECIMALS, 4, false)
}

pub fn format_token_amount(value: U256, fraction_digits: usize) -> String {
    format_fixed(value, TOKEN_DECIMALS, fraction_digits)
}

pub fn format_price(value: U256) -> String {
    format!("${}", format_fixed(value, PRICE_DECIMALS, 2))
}

/// Basis points as a whole percent, `6500 -> "65%"`.
pub fn format_bps(bps: u16) -> String {
    format!("{}%", format_fixed(U256::from(u64::from(bps)), 2, 0))
}

/// Both `U256::MAX` and zero mean the position carries no debt.
pub fn is_unconstrained_health(value: U256) -> bool {
    value == U256::MAX || value.is_zero()
}

pub fn format_health_factor(value: U256) -> String {
    if is_unconstrained_health(value) {
        return INFINITE_HEALTH.to_string();
    }
    format_fixed(value, TOKEN_DECIMALS, 2)
}

pub fn health_factor_number(value: U256) -> f64 {
    if is_unconstrained_health(value) {
        return f64::INFINITY;
    }
    to_decimal_number(value, TOKEN_DECIMALS)
}

pub fn token_amount_to_number(value: U256) -> f64 {
    to_decimal_number(value, TOKEN_DECIMALS)
}

pub fn price_to_number(value: U256) -> f64 {
    to_decimal_number(value, PRICE_DECIMALS)
}

/// `0x1234...5678`. Inputs shorter than ten characters are returned unchanged.
pub fn shorten_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
