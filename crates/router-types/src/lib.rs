//! Common types module for the swap router system.
//!
//! This module defines the core data types and structures shared by every
//! router component: quote requests and responses, provider configuration,
//! the HTTP API envelope, and the configuration validation framework.

/// API envelope and error types for HTTP endpoints.
pub mod api;
/// Stable machine-readable error codes surfaced by the router.
pub mod error;
/// Aggregator provider configuration handed to each adapter.
pub mod provider;
/// Quote request/response types and per-provider quote results.
pub mod quote;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for API keys and other secrets.
pub mod secret_string;
/// Utility functions for numbers and timestamps.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use error::*;
pub use provider::*;
pub use quote::*;
pub use registry::*;
pub use secret_string::*;
pub use utils::{
	current_timestamp, format_exchange_rate, normalized_ratio, parse_untyped_amount,
	parse_untyped_u64, truncate_id,
};
pub use validation::*;
