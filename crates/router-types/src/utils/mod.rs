//! Utility functions shared across router crates.

/// Timestamp and ID helpers.
pub mod helpers;
/// Numeric normalization for heterogeneous provider payloads.
pub mod numeric;

pub use helpers::{current_timestamp, truncate_id};
pub use numeric::{
	format_exchange_rate, normalized_ratio, parse_untyped_amount, parse_untyped_u64, NumericError,
};
