//! Aggregator adapter module for the swap router.
//!
//! Each third-party aggregator (1inch, ParaSwap, 0x, CoW) speaks its own
//! wire format; this module hides the differences behind one contract.
//! Adapters perform HTTP, request shaping, response parsing, and
//! normalization, and report failures in-band as failed quotes so the
//! orchestrator never has to unwind a partially collected round.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use router_types::{
	ConfigSchema, ErrorCode, ImplementationRegistry, ProviderConfig, ProviderQuote, QuoteRequest,
	RouteHop,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod cowswap;
	pub mod oneinch;
	pub mod paraswap;
	pub mod zeroex;
}

pub mod client;
pub mod metrics;

pub use client::AggregatorClient;
pub use metrics::{AdapterMetrics, AggregatorMetricsSnapshot};

/// Errors that can occur inside an aggregator adapter.
///
/// These never cross the [`AggregatorInterface::quote`] boundary; they
/// are folded into a failed [`ProviderQuote`] carrying the matching
/// [`ErrorCode`].
#[derive(Debug, Error)]
pub enum AggregatorError {
	/// The request targets a chain this adapter does not serve.
	#[error("Chain {0} is not supported")]
	UnsupportedChain(u64),
	/// Request shaping failed because of bad inputs.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	/// The provider did not answer within the deadline.
	#[error("Provider timed out after {0:?}")]
	Timeout(Duration),
	/// Transport failure, unparseable body, or a provider-signaled
	/// business error.
	#[error("Provider error: {0}")]
	Provider(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl AggregatorError {
	/// Maps the error onto the stable code embedded in failed quotes.
	pub fn code(&self) -> ErrorCode {
		match self {
			AggregatorError::UnsupportedChain(_) => ErrorCode::UnsupportedChain,
			AggregatorError::InvalidRequest(_) => ErrorCode::InvalidRequest,
			AggregatorError::Timeout(_) => ErrorCode::ProviderTimeout,
			AggregatorError::Provider(_) => ErrorCode::ProviderError,
			AggregatorError::Configuration(_) => ErrorCode::ProviderError,
		}
	}
}

/// Normalized payload an adapter extracts from one provider response.
///
/// The shared [`AdapterCore::execute_quote`] wrapper turns this into the
/// final [`ProviderQuote`] with timing and bookkeeping attached.
#[derive(Debug, Clone)]
pub struct QuoteData {
	/// Output amount in the destination token's smallest unit.
	pub amount_out: alloy_primitives::U256,
	/// Estimated gas units.
	pub gas_estimate: u64,
	/// Relative price impact as a fraction.
	pub price_impact: Decimal,
	/// Per-venue route decomposition.
	pub route: Vec<RouteHop>,
	/// Adapter-internal trustworthiness signal in [0, 1].
	pub confidence: Decimal,
}

/// Trait defining the interface for aggregator adapters.
///
/// This trait must be implemented by any aggregator that wants to
/// integrate with the router. Implementations own their HTTP client and
/// an atomically swappable configuration snapshot.
#[async_trait]
pub trait AggregatorInterface: Send + Sync {
	/// Returns the configuration schema for this adapter implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Stable identifier, matching the configuration key.
	fn name(&self) -> &'static str;

	/// Human-readable name for responses and logs.
	fn display_name(&self) -> String {
		self.current_config().display_name.clone()
	}

	/// True iff this adapter can quote on `chain_id`.
	fn supports(&self, chain_id: u64) -> bool {
		self.current_config().supports(chain_id)
	}

	/// Returns the adapter's current configuration snapshot.
	fn current_config(&self) -> Arc<ProviderConfig>;

	/// Atomically replaces the adapter's configuration.
	///
	/// In-flight quotes keep the snapshot they started with.
	fn update_config(&self, config: ProviderConfig);

	/// Fetches and normalizes one quote.
	///
	/// Total function: every failure mode (unsupported chain, transport,
	/// parse, provider business error, deadline) is reported as a failed
	/// quote with `response_time_ms` set. Must respect the configured
	/// per-provider timeout.
	async fn quote(&self, request: &QuoteRequest) -> ProviderQuote;

	/// Lightweight probe against the provider.
	async fn health_check(&self) -> Result<(), AggregatorError>;

	/// Rolling counters for this adapter.
	fn metrics(&self) -> AggregatorMetricsSnapshot;
}

/// Type alias for aggregator adapter factory functions.
pub type AggregatorFactory =
	fn(&toml::Value) -> Result<Box<dyn AggregatorInterface>, AggregatorError>;

/// Registry trait for aggregator implementations.
pub trait AggregatorRegistry: ImplementationRegistry<Factory = AggregatorFactory> {}

/// Get all registered aggregator implementations.
///
/// Returns a vector of (name, factory) tuples for all available adapters.
pub fn get_all_implementations() -> Vec<(&'static str, AggregatorFactory)> {
	use implementations::{cowswap, oneinch, paraswap, zeroex};

	vec![
		(cowswap::Registry::NAME, cowswap::Registry::factory()),
		(oneinch::Registry::NAME, oneinch::Registry::factory()),
		(paraswap::Registry::NAME, paraswap::Registry::factory()),
		(zeroex::Registry::NAME, zeroex::Registry::factory()),
	]
}

/// Shared state every concrete adapter embeds: the swappable config, the
/// pooled HTTP client, and rolling metrics.
pub struct AdapterCore {
	config: ArcSwap<ProviderConfig>,
	client: AggregatorClient,
	metrics: AdapterMetrics,
}

impl AdapterCore {
	/// Builds the core from a parsed provider configuration.
	pub fn new(config: ProviderConfig) -> Result<Self, AggregatorError> {
		Ok(Self {
			config: ArcSwap::from_pointee(config),
			client: AggregatorClient::new()?,
			metrics: AdapterMetrics::default(),
		})
	}

	/// Current configuration snapshot.
	pub fn config(&self) -> Arc<ProviderConfig> {
		self.config.load_full()
	}

	/// Atomically replaces the configuration.
	pub fn swap_config(&self, config: ProviderConfig) {
		self.config.store(Arc::new(config));
	}

	/// The pooled HTTP client.
	pub fn client(&self) -> &AggregatorClient {
		&self.client
	}

	/// Rolling metrics.
	pub fn metrics(&self) -> &AdapterMetrics {
		&self.metrics
	}

	/// Runs one quote attempt under the adapter's timeout, folding every
	/// failure mode into a failed [`ProviderQuote`] and recording metrics.
	pub async fn execute_quote<F, Fut>(
		&self,
		name: &'static str,
		request: &QuoteRequest,
		fetch: F,
	) -> ProviderQuote
	where
		F: FnOnce(Arc<ProviderConfig>) -> Fut,
		Fut: std::future::Future<Output = Result<QuoteData, AggregatorError>>,
	{
		let config = self.config();
		let started = tokio::time::Instant::now();

		let quote = if !config.supports(request.chain_id) {
			ProviderQuote::failure(
				name,
				ErrorCode::UnsupportedChain,
				format!("Chain {} is not supported", request.chain_id),
				elapsed_ms(started),
			)
		} else {
			let timeout = config.timeout();
			match tokio::time::timeout(timeout, fetch(config)).await {
				Ok(Ok(data)) => ProviderQuote::success(
					name,
					data.amount_out,
					data.gas_estimate,
					data.price_impact,
					data.route,
					elapsed_ms(started),
					data.confidence,
				),
				Ok(Err(err)) => {
					tracing::debug!(provider = %name, error = %err, "Quote failed");
					ProviderQuote::failure(name, err.code(), err.to_string(), elapsed_ms(started))
				}
				Err(_) => ProviderQuote::failure(
					name,
					ErrorCode::ProviderTimeout,
					AggregatorError::Timeout(timeout).to_string(),
					elapsed_ms(started),
				),
			}
		};

		self.metrics.record(quote.success, quote.response_time_ms);
		quote
	}
}

fn elapsed_ms(started: tokio::time::Instant) -> u64 {
	(started.elapsed().as_millis() as u64).max(1)
}

/// Parses a provider block into a [`ProviderConfig`], shared by every
/// adapter factory. Each factory call produces an independent instance,
/// so adapters can never alias each other's configuration.
pub fn parse_provider_config(config: &toml::Value) -> Result<ProviderConfig, AggregatorError> {
	config
		.clone()
		.try_into()
		.map_err(|e| AggregatorError::Configuration(format!("Invalid provider config: {}", e)))
}

/// [`ConfigSchema`] shared by the four adapters; their catalog blocks
/// carry the same fields.
pub(crate) struct CatalogSchema;

impl ConfigSchema for CatalogSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), router_types::ValidationError> {
		provider_schema().validate(config)
	}
}

/// Schema shared by the four adapters; they carry the same catalog
/// fields.
pub(crate) fn provider_schema() -> router_types::Schema {
	use router_types::{Field, FieldType};

	router_types::Schema::new(
		vec![
			Field::new("name", FieldType::String),
			Field::new("base_url", FieldType::String),
		],
		vec![
			Field::new("display_name", FieldType::String),
			Field::new("api_key", FieldType::String),
			Field::new(
				"timeout_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(120_000),
				},
			),
			Field::new(
				"retry_count",
				FieldType::Integer {
					min: Some(0),
					max: Some(10),
				},
			),
			Field::new(
				"priority",
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			),
			Field::new("is_active", FieldType::Boolean),
			Field::new(
				"supported_chains",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			),
		],
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_error_code_mapping() {
		assert_eq!(
			AggregatorError::UnsupportedChain(9999).code(),
			ErrorCode::UnsupportedChain
		);
		assert_eq!(
			AggregatorError::Timeout(Duration::from_secs(5)).code(),
			ErrorCode::ProviderTimeout
		);
		assert_eq!(
			AggregatorError::Provider("502".into()).code(),
			ErrorCode::ProviderError
		);
		assert_eq!(
			AggregatorError::InvalidRequest("bad token".into()).code(),
			ErrorCode::InvalidRequest
		);
	}

	#[test]
	fn test_all_adapters_registered() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["cowswap", "oneinch", "paraswap", "zeroex"]);
	}
}
