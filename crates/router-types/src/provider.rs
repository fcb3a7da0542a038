//! Aggregator provider configuration.
//!
//! Each adapter receives its own [`ProviderConfig`] instance, deep-copied
//! from the catalog by the configuration loader. Configs are immutable
//! after handoff; hot reload swaps the whole instance atomically inside
//! the adapter rather than mutating fields in place.

use crate::secret_string::SecretString;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for one third-party aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
	/// Stable identifier, also the configuration key.
	pub name: String,
	/// Human-readable name for responses and logs.
	pub display_name: String,
	/// Base URL of the provider's HTTP API.
	pub base_url: String,
	/// API key; empty when the provider needs none.
	#[serde(default)]
	pub api_key: SecretString,
	/// Per-request timeout in milliseconds.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Additional attempts after the first failed one.
	#[serde(default = "default_retry_count")]
	pub retry_count: u32,
	/// Ordering hint when several providers are otherwise equal.
	#[serde(default)]
	pub priority: u32,
	/// Relative weight for downstream consumers.
	#[serde(default = "default_weight")]
	pub weight: Decimal,
	/// Whether the provider participates in aggregation.
	#[serde(default = "default_is_active")]
	pub is_active: bool,
	/// Chain IDs this provider can quote on.
	#[serde(default)]
	pub supported_chains: BTreeSet<u64>,
}

fn default_timeout_ms() -> u64 {
	5_000
}

fn default_retry_count() -> u32 {
	2
}

fn default_weight() -> Decimal {
	Decimal::ONE
}

fn default_is_active() -> bool {
	true
}

impl ProviderConfig {
	/// Per-request timeout as a [`Duration`].
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	/// True iff this provider can quote on `chain_id`.
	pub fn supports(&self, chain_id: u64) -> bool {
		self.supported_chains.contains(&chain_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_applied_on_deserialize() {
		let config: ProviderConfig = toml::from_str(
			r#"
name = "oneinch"
display_name = "1inch"
base_url = "https://api.1inch.dev/swap/v5.2"
"#,
		)
		.unwrap();

		assert_eq!(config.timeout_ms, 5_000);
		assert_eq!(config.retry_count, 2);
		assert!(config.is_active);
		assert!(config.supported_chains.is_empty());
		assert!(config.api_key.is_empty());
	}

	#[test]
	fn test_supports() {
		let config: ProviderConfig = toml::from_str(
			r#"
name = "zeroex"
display_name = "0x"
base_url = "https://api.0x.org"
supported_chains = [1, 137]
"#,
		)
		.unwrap();

		assert!(config.supports(1));
		assert!(config.supports(137));
		assert!(!config.supports(9999));
	}
}
