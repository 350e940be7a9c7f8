// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Conversions between human-scale token amounts and integer minor units.

use alloy_primitives::{utils::format_units, I256, U256};
use thiserror::Error;

/// Largest decimal-place count whose scale factor fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

/// Errors raised while parsing or scaling token amounts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid numeric literal: {0:?}")]
    InvalidNumericLiteral(String),

    #[error("unsupported decimal count: {0}")]
    InvalidDecimals(u8),

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

fn check_decimals(decimals: u8) -> Result<(), UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::InvalidDecimals(decimals));
    }
    Ok(())
}

/// Returns `10^decimals`.
pub fn pow10(decimals: u8) -> Result<U256, UnitsError> {
    check_decimals(decimals)?;
    Ok(U256::from(10u64).pow(U256::from(decimals)))
}

/// Parse a base-10 integer literal, such as the `value` field of an indexed transaction.
pub fn parse_integer_amount(literal: &str) -> Result<U256, UnitsError> {
    let digits = literal.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UnitsError::InvalidNumericLiteral(literal.to_string()));
    }
    U256::from_str_radix(digits, 10)
        .map_err(|_| UnitsError::InvalidNumericLiteral(literal.to_string()))
}

/// Parse a hex integer literal without `0x` prefix, as found in smart contract call arguments.
pub fn parse_hex_amount(literal: &str) -> Result<U256, UnitsError> {
    if literal.is_empty() || !literal.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(UnitsError::InvalidNumericLiteral(literal.to_string()));
    }
    U256::from_str_radix(literal, 16)
        .map_err(|_| UnitsError::InvalidNumericLiteral(literal.to_string()))
}

fn narrow(formatted: String) -> Result<f64, UnitsError> {
    formatted.parse::<f64>().map_err(|_| UnitsError::InvalidNumericLiteral(formatted))
}

/// Convert an integer literal in minor units to a human-scale float.
///
/// The division by `10^decimals` is done exactly on the integer, the result is only narrowed to
/// `f64` at the end.
pub fn to_human_scale(literal: &str, decimals: u8) -> Result<f64, UnitsError> {
    check_decimals(decimals)?;
    let amount = parse_integer_amount(literal)?;
    let formatted =
        format_units(amount, decimals).map_err(|_| UnitsError::InvalidDecimals(decimals))?;
    narrow(formatted)
}

/// Convert a signed amount in minor units to a human-scale float.
pub fn minor_to_human(amount: I256, decimals: u8) -> Result<f64, UnitsError> {
    check_decimals(decimals)?;
    let formatted =
        format_units(amount, decimals).map_err(|_| UnitsError::InvalidDecimals(decimals))?;
    narrow(formatted)
}

/// Scale a non-negative human-scale float to minor units, truncating toward zero.
pub fn scale_to_minor(human: f64, decimals: u8) -> Result<U256, UnitsError> {
    check_decimals(decimals)?;
    if !human.is_finite() || human < 0.0 {
        return Err(UnitsError::InvalidNumericLiteral(human.to_string()));
    }
    if human == 0.0 {
        return Ok(U256::ZERO);
    }

    // `Display` for f64 yields the shortest round-trip form and never an exponent, so the
    // multiplication by 10^decimals is a shift of the decimal point.
    let repr = human.to_string();
    let (integer, fraction) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    let width = decimals as usize;
    let mut digits = String::with_capacity(integer.len() + width);
    digits.push_str(integer);
    digits.extend(fraction.chars().take(width));
    for _ in fraction.len().min(width)..width {
        digits.push('0');
    }

    U256::from_str_radix(&digits, 10).map_err(|_| UnitsError::Overflow)
}

/// Convert a human-scale float to minor units, hex encoded as [encode_amount_hex] does.
pub fn to_minor_units(human: f64, decimals: u8) -> Result<String, UnitsError> {
    Ok(encode_amount_hex(scale_to_minor(human, decimals)?))
}

/// Multiply a whole-token amount by `10^decimals`.
pub fn whole_to_minor(whole: U256, decimals: u8) -> Result<U256, UnitsError> {
    whole.checked_mul(pow10(decimals)?).ok_or(UnitsError::Overflow)
}

/// Lowercase hex of the minimal big-endian byte representation, without `0x`.
///
/// Zero has no significant bytes and encodes as the empty string.
pub fn encode_amount_hex(amount: U256) -> String {
    hex::encode(amount.to_be_bytes_trimmed_vec())
}
