//! Stable error codes for the swap router.
//!
//! Every failure the router reports, whether surfaced to the caller or
//! embedded in a per-provider quote, carries one of these machine codes so
//! downstream consumers can branch without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error code.
///
/// Request-level codes (`InvalidRequest`, `UnsupportedChain`,
/// `NoValidQuotes`, `InternalError`) are returned to the caller.
/// Provider-level codes (`ProviderTimeout`, `ProviderError`) are only ever
/// embedded in the failed [`crate::ProviderQuote`] they belong to.
/// `CacheError` is logged and never surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidRequest,
	UnsupportedChain,
	NoValidQuotes,
	ProviderTimeout,
	ProviderError,
	CacheError,
	InternalError,
}

impl ErrorCode {
	/// Returns the wire representation of this code.
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::InvalidRequest => "INVALID_REQUEST",
			ErrorCode::UnsupportedChain => "UNSUPPORTED_CHAIN",
			ErrorCode::NoValidQuotes => "NO_VALID_QUOTES",
			ErrorCode::ProviderTimeout => "PROVIDER_TIMEOUT",
			ErrorCode::ProviderError => "PROVIDER_ERROR",
			ErrorCode::CacheError => "CACHE_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
