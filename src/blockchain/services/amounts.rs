// src/blockchain/services/amounts.rs

//! Human-unit <-> smallest-unit conversion and slippage math.
//! Everything that ends up in a transaction argument stays in `U256`.

use ethers::types::U256;
use ethers::utils::{format_units, parse_units};

use crate::blockchain::models::OrchestrationError;

/// Slippage is carried in tenths of a percent: 2.0% -> 20.
pub const SLIPPAGE_SCALE: u32 = 1000;

fn is_plain_decimal(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

/// Converts a positive human-readable amount into smallest units.
/// Digits past the token's precision are truncated.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256, OrchestrationError> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(OrchestrationError::InvalidAmount(format!(
            "'{}' is negative",
            trimmed
        )));
    }
    if !is_plain_decimal(trimmed) {
        return Err(OrchestrationError::InvalidAmount(format!(
            "'{}' is not a number",
            trimmed
        )));
    }
    let value: U256 = parse_units(trimmed, decimals as u32)
        .map_err(|e| OrchestrationError::InvalidAmount(format!("'{}': {}", trimmed, e)))?
        .into();
    if value.is_zero() {
        return Err(OrchestrationError::InvalidAmount(format!(
            "'{}' must be greater than zero",
            trimmed
        )));
    }
    Ok(value)
}

/// Formats smallest units for display, without trailing zeros.
pub fn from_base_units(value: U256, decimals: u8) -> String {
    let formatted = format_units(value, decimals as u32).unwrap_or_else(|_| value.to_string());
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    } else {
        formatted
    }
}

/// Parses a slippage percentage with one decimal of precision ("0.5" -> 5).
pub fn parse_slippage(percent: &str) -> Result<u32, OrchestrationError> {
    let trimmed = percent.trim().trim_end_matches('%').trim();
    if !is_plain_decimal(trimmed) {
        return Err(OrchestrationError::InvalidAmount(format!(
            "slippage '{}' is not a percentage",
            percent
        )));
    }
    let tenths: U256 = parse_units(trimmed, 1u32)
        .map_err(|e| OrchestrationError::InvalidAmount(format!("slippage '{}': {}", percent, e)))?
        .into();
    if tenths >= U256::from(SLIPPAGE_SCALE) {
        return Err(OrchestrationError::InvalidAmount(format!(
            "slippage '{}' must be below 100%",
            percent
        )));
    }
    Ok(tenths.as_u32())
}

/// `expected * (1000 - slippage) / 1000`, rounded down.
pub fn minimum_output(expected: U256, slippage_tenths: u32) -> U256 {
    let keep = U256::from(SLIPPAGE_SCALE.saturating_sub(slippage_tenths));
    let scale = U256::from(SLIPPAGE_SCALE);
    match expected.checked_mul(keep) {
        Some(product) => product / scale,
        None => expected / scale * keep,
    }
}
