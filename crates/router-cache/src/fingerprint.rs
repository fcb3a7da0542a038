//! Request fingerprinting for cache keys.
//!
//! Two requests that would price identically must map to the same key, so
//! the fingerprint covers exactly the price-determining fields: tokens
//! (case-normalized), amount, chain, and slippage. Caller identity
//! (`user_address`, `request_id`) and execution hints (`gas_price`,
//! `deadline`) are deliberately excluded.

use router_types::QuoteRequest;

/// Computes the canonical cache key for a request.
///
/// Token addresses are lowercased and the slippage rendered in normalized
/// decimal form so textual variants ("0.50" vs "0.5") collapse to one key.
pub fn fingerprint(prefix: &str, request: &QuoteRequest) -> String {
	format!(
		"{}{}_{}_{}_{}_{}",
		prefix,
		request.from_token.to_lowercase(),
		request.to_token.to_lowercase(),
		request.amount_in,
		request.chain_id,
		request.slippage.normalize(),
	)
}
