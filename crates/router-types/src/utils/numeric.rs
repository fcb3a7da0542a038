//! Numeric normalization for heterogeneous provider payloads.
//!
//! Third-party APIs report amounts as decimal strings, JSON integers, or
//! occasionally floats. These helpers normalize all three forms into
//! `U256` (token amounts) or `u64` (gas), and render amount ratios as
//! canonical decimal strings without ever touching binary floating point
//! for token quantities.

use alloy_primitives::{U256, U512};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use thiserror::Error;

/// Scale used when rendering amount ratios: 18 fractional digits.
const RATE_SCALE: u64 = 1_000_000_000_000_000_000;

/// Scale used for score-style ratios in [0, 1]: 9 fractional digits.
const RATIO_SCALE: u64 = 1_000_000_000;

/// Errors produced by the numeric normalizer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumericError {
	/// The JSON value is not a recognizable number form.
	#[error("Value is not a number: {0}")]
	NotANumber(String),
	/// The value is negative where only non-negative amounts make sense.
	#[error("Negative amount: {0}")]
	Negative(String),
	/// The value does not fit the target integer type.
	#[error("Amount out of range: {0}")]
	OutOfRange(String),
}

/// Parses a provider-reported amount that may be a decimal string, a JSON
/// integer, or a float, into a `U256` in smallest units.
///
/// Fractional parts are truncated; providers reporting smallest-unit
/// amounts as floats have already lost sub-unit precision upstream.
pub fn parse_untyped_amount(value: &serde_json::Value) -> Result<U256, NumericError> {
	match value {
		serde_json::Value::String(s) => parse_amount_str(s),
		serde_json::Value::Number(n) => {
			if let Some(u) = n.as_u64() {
				Ok(U256::from(u))
			} else if n.as_i64().is_some() {
				Err(NumericError::Negative(n.to_string()))
			} else {
				let f = n
					.as_f64()
					.ok_or_else(|| NumericError::NotANumber(n.to_string()))?;
				decimal_to_u256(
					Decimal::from_f64(f).ok_or_else(|| NumericError::OutOfRange(n.to_string()))?,
				)
			}
		},
		other => Err(NumericError::NotANumber(other.to_string())),
	}
}

/// Parses a provider-reported gas figure (string or integer) into `u64`.
pub fn parse_untyped_u64(value: &serde_json::Value) -> Result<u64, NumericError> {
	let amount = parse_untyped_amount(value)?;
	amount
		.try_into()
		.map_err(|_| NumericError::OutOfRange(amount.to_string()))
}

fn parse_amount_str(s: &str) -> Result<U256, NumericError> {
	let s = s.trim();
	if s.is_empty() {
		return Err(NumericError::NotANumber("<empty>".to_string()));
	}
	if s.starts_with('-') {
		return Err(NumericError::Negative(s.to_string()));
	}
	if s.contains(['.', 'e', 'E']) {
		let d: Decimal = s
			.parse()
			.map_err(|_| NumericError::NotANumber(s.to_string()))?;
		return decimal_to_u256(d);
	}
	U256::from_str_radix(s, 10).map_err(|_| NumericError::NotANumber(s.to_string()))
}

fn decimal_to_u256(d: Decimal) -> Result<U256, NumericError> {
	if d.is_sign_negative() {
		return Err(NumericError::Negative(d.to_string()));
	}
	let truncated = d.trunc();
	let units = truncated
		.to_u128()
		.ok_or_else(|| NumericError::OutOfRange(d.to_string()))?;
	Ok(U256::from(units))
}

/// Renders `amount_out / amount_in` as a canonical decimal string with up
/// to 18 fractional digits and no trailing zeros. Returns "0" when the
/// input amount is zero.
///
/// The division is done in 512-bit integer space so amounts anywhere in
/// the U256 range keep full precision.
pub fn format_exchange_rate(amount_out: U256, amount_in: U256) -> String {
	if amount_in.is_zero() {
		return "0".to_string();
	}

	let scaled = (U512::from(amount_out) * U512::from(RATE_SCALE)) / U512::from(amount_in);
	let scale = U512::from(RATE_SCALE);
	let integer = scaled / scale;
	let fraction: u64 = (scaled % scale).to::<u64>();

	if fraction == 0 {
		return integer.to_string();
	}
	let rendered = format!("{}.{:018}", integer, fraction);
	rendered.trim_end_matches('0').to_string()
}

/// Computes `numer / denom` as a `Decimal` in [0, 1] with 9 digits of
/// precision. Callers must pass `numer <= denom`; `denom` must be
/// non-zero.
pub fn normalized_ratio(numer: U256, denom: U256) -> Decimal {
	if denom.is_zero() {
		return Decimal::ZERO;
	}
	let scaled: u64 = ((U512::from(numer) * U512::from(RATIO_SCALE)) / U512::from(denom)).to();
	Decimal::from_i128_with_scale(scaled as i128, 9)
}
