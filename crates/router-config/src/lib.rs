//! Configuration module for the swap router.
//!
//! Loads the router's TOML configuration, resolves `${ENV_VAR}` and
//! `${ENV_VAR:-default}` references, validates the result, and prepares
//! one independent provider block per aggregator so adapters never share
//! configuration instances.

use router_types::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub mod loader;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the input dump.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the swap router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Router instance settings.
	pub router: RouterSettings,
	/// Chains the deployment serves, keyed by chain ID.
	#[serde(deserialize_with = "deserialize_chains")]
	pub chains: BTreeMap<u64, ChainConfig>,
	/// Quote cache settings.
	pub cache: CacheSettings,
	/// Aggregator provider catalog.
	pub aggregators: AggregatorsSettings,
	/// HTTP API server settings.
	pub api: Option<ApiConfig>,
}

/// Settings specific to the router instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterSettings {
	/// Unique identifier for this router instance.
	pub id: String,
}

/// One chain the deployment serves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	/// Human-readable chain name ("ethereum", "polygon").
	pub name: String,
	/// Native token symbol, when consumers want it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub native_symbol: Option<String>,
}

/// Quote cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
	/// Which backend implementation to use.
	pub backend: String,
	/// How long an aggregated quote stays fresh, in seconds.
	#[serde(default = "default_ttl_seconds")]
	pub default_ttl_seconds: u64,
	/// Prefix prepended to every cache key.
	#[serde(default = "default_prefix_key")]
	pub prefix_key: String,
	/// Interval between expired-entry sweeps, in seconds.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
	/// Map of backend names to their raw configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

fn default_ttl_seconds() -> u64 {
	30
}

fn default_prefix_key() -> String {
	"quote:".to_string()
}

fn default_cleanup_interval() -> u64 {
	60
}

/// Aggregator provider catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorsSettings {
	/// Map of provider names to their raw configuration blocks.
	pub providers: HashMap<String, toml::Value>,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the server is started at all.
	#[serde(default = "default_api_enabled")]
	pub enabled: bool,
	/// Bind host.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Bind port.
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_enabled() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8080
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: default_api_enabled(),
			host: default_api_host(),
			port: default_api_port(),
		}
	}
}

/// Deserializes the `[chains.<id>]` tables, converting string keys into
/// numeric chain IDs.
fn deserialize_chains<'de, D>(deserializer: D) -> Result<BTreeMap<u64, ChainConfig>, D::Error>
where
	D: Deserializer<'de>,
{
	use serde::de::Error;

	let raw: BTreeMap<String, ChainConfig> = BTreeMap::deserialize(deserializer)?;
	raw.into_iter()
		.map(|(key, value)| {
			let id: u64 = key
				.parse()
				.map_err(|_| D::Error::custom(format!("Invalid chain ID '{}'", key)))?;
			Ok((id, value))
		})
		.collect()
}

impl std::str::FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let config: Config = toml::from_str(s)?;
		config.validate()?;
		Ok(config)
	}
}

impl Config {
	/// Loads configuration from a file, resolving environment variable
	/// references before parsing.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let resolved = resolve_env_vars(&content)?;
		resolved.parse()
	}

	/// Validates cross-field constraints that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.router.id.trim().is_empty() {
			return Err(ConfigError::Validation("router.id must not be empty".into()));
		}
		if self.chains.is_empty() {
			return Err(ConfigError::Validation(
				"at least one chain must be configured".into(),
			));
		}
		if self.cache.default_ttl_seconds == 0 {
			return Err(ConfigError::Validation(
				"cache.default_ttl_seconds must be positive".into(),
			));
		}
		if self.aggregators.providers.is_empty() {
			return Err(ConfigError::Validation(
				"at least one aggregator provider must be configured".into(),
			));
		}
		Ok(())
	}

	/// Produces one independent provider block per registrable aggregator.
	///
	/// Each returned value is a deep copy of the catalog entry with:
	/// - `name` / `display_name` defaulted from the catalog key,
	/// - `supported_chains` intersected with the configured chains,
	/// - providers with `is_active = false` dropped,
	/// - providers that declare `requires_api_key = true` but resolved to
	///   an empty key soft-disabled with a warning.
	///
	/// Handing each adapter its own copy is what prevents configuration
	/// changes in one adapter from bleeding into another.
	pub fn provider_blocks(&self) -> Vec<(String, toml::Value)> {
		let mut blocks = Vec::new();

		for (name, raw) in &self.aggregators.providers {
			let mut block = raw.clone();
			let Some(table) = block.as_table_mut() else {
				tracing::error!(provider = %name, "Provider block is not a table, skipping");
				continue;
			};

			if let Some(false) = table.get("is_active").and_then(|v| v.as_bool()) {
				tracing::info!(provider = %name, "Provider disabled by configuration");
				continue;
			}

			let requires_key = table
				.get("requires_api_key")
				.and_then(|v| v.as_bool())
				.unwrap_or(false);
			// Not part of ProviderConfig; consumed here.
			table.remove("requires_api_key");

			let api_key = table
				.get("api_key")
				.and_then(|v| v.as_str())
				.unwrap_or_default();
			if requires_key && api_key.trim().is_empty() {
				tracing::warn!(
					provider = %name,
					"API key missing, provider disabled"
				);
				continue;
			}

			if !table.contains_key("name") {
				table.insert("name".to_string(), toml::Value::String(name.clone()));
			}
			if !table.contains_key("display_name") {
				table.insert("display_name".to_string(), toml::Value::String(name.clone()));
			}

			// Only chains the deployment actually serves survive the join.
			if let Some(chains) = table.get_mut("supported_chains") {
				if let Some(list) = chains.as_array() {
					let joined: Vec<toml::Value> = list
						.iter()
						.filter(|v| {
							v.as_integer()
								.map(|id| self.chains.contains_key(&(id as u64)))
								.unwrap_or(false)
						})
						.cloned()
						.collect();
					*chains = toml::Value::Array(joined);
				}
			}

			blocks.push((name.clone(), block));
		}

		blocks.sort_by(|a, b| a.0.cmp(&b.0));
		blocks
	}

	/// Masked API-key preview for startup logging.
	pub fn masked_api_key(raw: &toml::Value) -> String {
		raw.get("api_key")
			.and_then(|v| v.as_str())
			.map(|s| SecretString::from(s).masked())
			.unwrap_or_else(|| "<none>".to_string())
	}
}

/// Resolves `${VAR}` and `${VAR:-default}` references against the process
/// environment. A reference without a default for an unset variable is an
/// error; an empty default resolves to the empty string.
pub fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	// Bound input size so a hostile file cannot stall the regex engine.
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let full_match = cap.get(0).expect("capture 0 always present");
		let var_name = cap.get(1).expect("capture 1 always present").as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)));
				}
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply in reverse so earlier offsets stay valid.
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(*start..*end, value);
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;

	const CONFIG: &str = r#"
[router]
id = "router-test"

[chains.1]
name = "ethereum"
native_symbol = "ETH"

[chains.137]
name = "polygon"

[cache]
backend = "memory"
default_ttl_seconds = 10
prefix_key = "quote:"
[cache.implementations.memory]

[aggregators.providers.oneinch]
display_name = "1inch"
base_url = "https://api.1inch.dev/swap/v5.2"
api_key = "test-key"
supported_chains = [1, 137, 42161]

[aggregators.providers.cowswap]
display_name = "CoW Protocol"
base_url = "https://api.cow.fi/mainnet/api/v1"
supported_chains = [1]

[api]
host = "127.0.0.1"
port = 8080
"#;

	#[test]
	fn test_parse_and_validate() {
		let config: Config = CONFIG.parse().unwrap();
		assert_eq!(config.router.id, "router-test");
		assert_eq!(config.chains.len(), 2);
		assert_eq!(config.chains[&1].name, "ethereum");
		assert_eq!(config.cache.default_ttl_seconds, 10);
	}

	#[test]
	fn test_provider_blocks_join_chains() {
		let config: Config = CONFIG.parse().unwrap();
		let blocks = config.provider_blocks();
		assert_eq!(blocks.len(), 2);

		// Arbitrum (42161) is not configured, so the join drops it.
		let (_, oneinch) = blocks.iter().find(|(n, _)| n == "oneinch").unwrap();
		let chains: Vec<i64> = oneinch["supported_chains"]
			.as_array()
			.unwrap()
			.iter()
			.map(|v| v.as_integer().unwrap())
			.collect();
		assert_eq!(chains, vec![1, 137]);
	}

	#[test]
	fn test_inactive_provider_excluded() {
		let mut raw = CONFIG.to_string();
		raw.push_str("\n[aggregators.providers.paraswap]\nbase_url = \"https://api.paraswap.io\"\nis_active = false\nsupported_chains = [1]\n");
		let config: Config = raw.parse().unwrap();
		assert!(!config
			.provider_blocks()
			.iter()
			.any(|(name, _)| name == "paraswap"));
	}

	#[test]
	fn test_missing_required_key_soft_disables() {
		let mut raw = CONFIG.to_string();
		raw.push_str("\n[aggregators.providers.zeroex]\nbase_url = \"https://api.0x.org\"\napi_key = \"\"\nrequires_api_key = true\nsupported_chains = [1]\n");
		let config: Config = raw.parse().unwrap();
		assert!(!config
			.provider_blocks()
			.iter()
			.any(|(name, _)| name == "zeroex"));
	}

	#[test]
	fn test_blocks_are_independent_copies() {
		let config: Config = CONFIG.parse().unwrap();
		let mut first = config.provider_blocks();
		let second = config.provider_blocks();

		// Mutating one run's blocks must not affect another's.
		let (_, block) = first.get_mut(0).unwrap();
		block
			.as_table_mut()
			.unwrap()
			.insert("timeout_ms".into(), toml::Value::Integer(1));
		assert!(second[0].1.get("timeout_ms").is_none());
	}

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("ROUTER_TEST_KEY", "resolved-key");
		let resolved = resolve_env_vars("api_key = \"${ROUTER_TEST_KEY}\"").unwrap();
		assert_eq!(resolved, "api_key = \"resolved-key\"");

		let resolved = resolve_env_vars("api_key = \"${ROUTER_UNSET_VAR:-}\"").unwrap();
		assert_eq!(resolved, "api_key = \"\"");

		assert!(resolve_env_vars("api_key = \"${ROUTER_UNSET_VAR}\"").is_err());
	}

	#[test]
	fn test_empty_chains_rejected() {
		let raw = CONFIG.replace("[chains.1]", "[unused.1]").replace("[chains.137]", "[unused.137]");
		assert!(raw.parse::<Config>().is_err());
	}
}
