//! Quote types for the swap router.
//!
//! This module defines the request accepted by the router, the normalized
//! per-provider quote produced by every aggregator adapter, and the final
//! aggregated response returned to callers. Token amounts are kept as
//! `U256` in smallest units end to end; they are serialized as decimal
//! strings and never pass through binary floating point.

use crate::error::ErrorCode;
use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serde module for U256 serialization as decimal strings.
pub mod u256_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		U256::from_str_radix(&s, 10).map_err(D::Error::custom)
	}
}

/// Serde module for optional U256 fields.
pub mod u256_opt_serde {
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.map(|v| v.to_string()).serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s: Option<String> = Option::deserialize(deserializer)?;
		s.map(|s| U256::from_str_radix(&s, 10).map_err(D::Error::custom))
			.transpose()
	}
}

/// Maximum accepted slippage, as a fraction (50%).
pub const MAX_SLIPPAGE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Errors produced by [`QuoteRequest::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
	/// A token address field is empty.
	#[error("Token address must not be empty")]
	EmptyToken,
	/// Input and output tokens are the same address.
	#[error("Input and output tokens must differ")]
	SameToken,
	/// The input amount is zero.
	#[error("Input amount must be greater than zero")]
	ZeroAmount,
	/// The chain ID is zero.
	#[error("Chain ID must be positive")]
	InvalidChain,
	/// Slippage is outside the accepted [0, 0.5] range.
	#[error("Slippage {0} is outside [0, 0.5]")]
	SlippageOutOfRange(Decimal),
}

/// A request to quote a swap of `amount_in` of `from_token` into
/// `to_token` on `chain_id`.
///
/// Immutable once accepted by the router. If `request_id` is empty the
/// router mints one before processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
	/// Opaque caller-supplied identifier, minted when absent.
	#[serde(default)]
	pub request_id: String,
	/// Chain-native address of the token being sold.
	pub from_token: String,
	/// Chain-native address of the token being bought.
	pub to_token: String,
	/// Input amount in the token's smallest unit.
	#[serde(with = "u256_serde")]
	pub amount_in: U256,
	/// Canonical chain identifier (1 for Ethereum mainnet).
	pub chain_id: u64,
	/// Maximum acceptable slippage as a fraction in [0, 0.5].
	pub slippage: Decimal,
	/// Address the swap would be executed from, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_address: Option<String>,
	/// Gas price hint in wei.
	#[serde(default, with = "u256_opt_serde", skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<U256>,
	/// Unix deadline after which the caller no longer wants the quote.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deadline: Option<u64>,
}

impl QuoteRequest {
	/// Checks the request against the router's acceptance rules.
	///
	/// Token addresses must be non-empty and distinct (case-insensitive),
	/// the amount and chain ID positive, and slippage within [0, 0.5].
	pub fn validate(&self) -> Result<(), RequestValidationError> {
		if self.from_token.trim().is_empty() || self.to_token.trim().is_empty() {
			return Err(RequestValidationError::EmptyToken);
		}
		if self.from_token.eq_ignore_ascii_case(&self.to_token) {
			return Err(RequestValidationError::SameToken);
		}
		if self.amount_in.is_zero() {
			return Err(RequestValidationError::ZeroAmount);
		}
		if self.chain_id == 0 {
			return Err(RequestValidationError::InvalidChain);
		}
		if self.slippage < Decimal::ZERO || self.slippage > MAX_SLIPPAGE {
			return Err(RequestValidationError::SlippageOutOfRange(self.slippage));
		}
		Ok(())
	}

	/// Mints a request ID if the caller did not supply one.
	pub fn ensure_request_id(&mut self) {
		if self.request_id.trim().is_empty() {
			self.request_id = uuid::Uuid::new_v4().to_string();
		}
	}
}

/// One leg of a quote's route decomposition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteHop {
	/// Liquidity venue name as reported by the aggregator.
	pub protocol: String,
	/// Share of the input routed through this venue, as a fraction.
	pub percentage: Decimal,
	/// Pool identifier when the aggregator reports one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pool: Option<String>,
}

/// A normalized quote from a single aggregator.
///
/// Produced exactly once per adapter per request. Failures are reported
/// in-band: `success` is false, `amount_out` is zero, and `error_code` /
/// `error_message` describe what went wrong. Failed quotes are never
/// ranked but always appear in the response's `all_quotes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderQuote {
	/// Stable provider name (configuration key).
	pub provider: String,
	/// Whether the adapter produced a usable quote.
	pub success: bool,
	/// Output amount in the destination token's smallest unit.
	#[serde(with = "u256_serde")]
	pub amount_out: U256,
	/// Estimated gas units for the swap.
	pub gas_estimate: u64,
	/// Estimated relative price impact as a fraction.
	pub price_impact: Decimal,
	/// Per-venue route decomposition; may be empty for batch auctions.
	pub route: Vec<RouteHop>,
	/// Wall-clock time the adapter took to answer, in milliseconds.
	/// Always at least 1.
	pub response_time_ms: u64,
	/// Adapter-internal trustworthiness signal in [0, 1].
	pub confidence: Decimal,
	/// Rank assigned by the scorer; 1 is best. Absent for failures.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rank: Option<u32>,
	/// Machine code describing the failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_code: Option<ErrorCode>,
	/// Human-readable failure description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

impl ProviderQuote {
	/// Builds a successful quote.
	///
	/// A zero `amount_out` cannot win and is converted into a failure so
	/// the scorer never has to special-case it.
	#[allow(clippy::too_many_arguments)]
	pub fn success(
		provider: impl Into<String>,
		amount_out: U256,
		gas_estimate: u64,
		price_impact: Decimal,
		route: Vec<RouteHop>,
		response_time_ms: u64,
		confidence: Decimal,
	) -> Self {
		let provider = provider.into();
		if amount_out.is_zero() {
			return Self::failure(
				provider,
				ErrorCode::ProviderError,
				"Provider returned a zero output amount",
				response_time_ms,
			);
		}
		Self {
			provider,
			success: true,
			amount_out,
			gas_estimate,
			price_impact,
			route,
			response_time_ms: response_time_ms.max(1),
			confidence,
			rank: None,
			error_code: None,
			error_message: None,
		}
	}

	/// Builds a failed quote carrying the error taxonomy entry.
	pub fn failure(
		provider: impl Into<String>,
		code: ErrorCode,
		message: impl Into<String>,
		response_time_ms: u64,
	) -> Self {
		Self {
			provider: provider.into(),
			success: false,
			amount_out: U256::ZERO,
			gas_estimate: 0,
			price_impact: Decimal::ZERO,
			route: Vec::new(),
			response_time_ms: response_time_ms.max(1),
			confidence: Decimal::ZERO,
			rank: None,
			error_code: Some(code),
			error_message: Some(message.into()),
		}
	}
}

/// Telemetry block derived from one aggregation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationPerformance {
	/// End-to-end aggregation wall time in milliseconds.
	pub total_duration_ms: u64,
	/// Number of adapters queried.
	pub providers_queried: u32,
	/// Number of adapters that returned a usable quote.
	pub providers_success: u32,
	/// Provider with the lowest response time, if any responded.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fastest_provider: Option<String>,
	/// Provider with the highest response time, if any responded.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub slowest_provider: Option<String>,
	/// Mean response time across all queried adapters, in milliseconds.
	pub avg_response_time_ms: u64,
	/// success count / queried count, in [0, 1].
	pub quality_score: Decimal,
	/// Aggregation strategy that produced this result.
	pub strategy_used: String,
}

/// The aggregated response returned to callers.
///
/// The `best_*` fields mirror the rank-1 entry of `all_quotes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
	/// Echoes the (possibly minted) request ID.
	pub request_id: String,
	/// Provider of the winning quote.
	pub best_provider: String,
	/// Winning output amount in smallest units.
	#[serde(with = "u256_serde")]
	pub best_amount_out: U256,
	/// Winning gas estimate.
	pub best_gas_estimate: u64,
	/// Winning price impact.
	pub best_price_impact: Decimal,
	/// amount_out / amount_in as a canonical decimal string; "0" when the
	/// input amount is zero.
	pub exchange_rate: String,
	/// Winning route decomposition.
	pub route: Vec<RouteHop>,
	/// Every provider's quote, successes and failures alike.
	pub all_quotes: Vec<ProviderQuote>,
	/// Telemetry for this aggregation round.
	pub performance: AggregationPerformance,
	/// Unix timestamp until which the quote is considered fresh.
	pub valid_until: u64,
	/// True when served from the quote cache.
	pub cache_hit: bool,
	/// Unix timestamp the response was assembled.
	pub timestamp: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request() -> QuoteRequest {
		QuoteRequest {
			request_id: "r1".into(),
			from_token: "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".into(),
			to_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into(),
			amount_in: U256::from(10).pow(U256::from(18)),
			chain_id: 1,
			slippage: Decimal::new(5, 3),
			user_address: None,
			gas_price: None,
			deadline: None,
		}
	}

	#[test]
	fn test_valid_request_passes() {
		assert_eq!(request().validate(), Ok(()));
	}

	#[test]
	fn test_slippage_boundaries() {
		let mut req = request();
		req.slippage = Decimal::ZERO;
		assert_eq!(req.validate(), Ok(()));

		req.slippage = MAX_SLIPPAGE;
		assert_eq!(req.validate(), Ok(()));

		req.slippage = Decimal::new(500_000_001, 9);
		assert!(matches!(
			req.validate(),
			Err(RequestValidationError::SlippageOutOfRange(_))
		));

		req.slippage = Decimal::new(-1, 3);
		assert!(matches!(
			req.validate(),
			Err(RequestValidationError::SlippageOutOfRange(_))
		));
	}

	#[test]
	fn test_same_token_rejected_case_insensitively() {
		let mut req = request();
		req.to_token = req.from_token.to_uppercase();
		assert_eq!(req.validate(), Err(RequestValidationError::SameToken));
	}

	#[test]
	fn test_amount_boundaries_survive_serde() {
		let mut req = request();
		req.amount_in = U256::from(1);
		let json = serde_json::to_string(&req).unwrap();
		let back: QuoteRequest = serde_json::from_str(&json).unwrap();
		assert_eq!(back.amount_in, U256::from(1));

		req.amount_in = U256::MAX;
		let json = serde_json::to_string(&req).unwrap();
		let back: QuoteRequest = serde_json::from_str(&json).unwrap();
		assert_eq!(back.amount_in, U256::MAX);
	}

	#[test]
	fn test_request_id_minted_only_when_empty() {
		let mut req = request();
		req.ensure_request_id();
		assert_eq!(req.request_id, "r1");

		req.request_id.clear();
		req.ensure_request_id();
		assert!(!req.request_id.is_empty());
	}

	#[test]
	fn test_zero_amount_out_becomes_failure() {
		let quote = ProviderQuote::success(
			"oneinch",
			U256::ZERO,
			120_000,
			Decimal::new(1, 3),
			Vec::new(),
			42,
			Decimal::new(9, 1),
		);
		assert!(!quote.success);
		assert_eq!(quote.error_code, Some(ErrorCode::ProviderError));
	}

	#[test]
	fn test_response_time_floor() {
		let quote = ProviderQuote::failure("paraswap", ErrorCode::ProviderTimeout, "deadline", 0);
		assert_eq!(quote.response_time_ms, 1);
	}
}
