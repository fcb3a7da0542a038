//! 0x adapter.
//!
//! Permit2 quote API: `{base}/swap/permit2/quote?chainId=…&sellToken=…`.
//! Authentication travels in the `0x-api-key` header together with the
//! protocol version header. The payload carries explicit liquidity and
//! simulation signals which feed the confidence score.

use crate::{
	client::read_body, parse_provider_config, AdapterCore, AggregatorError, AggregatorFactory,
	AggregatorInterface, AggregatorRegistry, CatalogSchema, QuoteData,
};
use async_trait::async_trait;
use router_types::{
	parse_untyped_amount, parse_untyped_u64, ConfigSchema, ImplementationRegistry, ProviderConfig,
	ProviderQuote, QuoteRequest, RouteHop,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;

/// Protocol version header required by the permit2 endpoints.
const API_VERSION: &str = "v2";

/// Gas units assumed when the transaction envelope omits an estimate.
const DEFAULT_GAS_UNITS: u64 = 150_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroExQuote {
	#[serde(default = "liquidity_available_default")]
	liquidity_available: bool,
	#[serde(default)]
	buy_amount: Option<serde_json::Value>,
	#[serde(default)]
	transaction: Option<ZeroExTransaction>,
	#[serde(default)]
	issues: Option<ZeroExIssues>,
	#[serde(default)]
	route: Option<ZeroExRoute>,
}

fn liquidity_available_default() -> bool {
	true
}

#[derive(Debug, Deserialize)]
struct ZeroExTransaction {
	/// Gas limit as a decimal string.
	#[serde(default)]
	gas: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroExIssues {
	#[serde(default)]
	simulation_incomplete: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroExRoute {
	#[serde(default)]
	fills: Vec<ZeroExFill>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroExFill {
	source: String,
	/// Share of the input in basis points.
	proportion_bps: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ZeroExError {
	#[serde(default)]
	reason: Option<String>,
}

fn default_price_impact() -> Decimal {
	Decimal::new(1, 3) // 0.1%
}

/// Adapter for the 0x permit2 swap API.
pub struct ZeroExAggregator {
	core: AdapterCore,
}

impl ZeroExAggregator {
	/// Creates the adapter from its own configuration copy.
	pub fn new(config: ProviderConfig) -> Result<Self, AggregatorError> {
		Ok(Self {
			core: AdapterCore::new(config)?,
		})
	}

	async fn fetch_quote(
		&self,
		config: Arc<ProviderConfig>,
		request: &QuoteRequest,
	) -> Result<QuoteData, AggregatorError> {
		let url = format!(
			"{}/swap/permit2/quote",
			config.base_url.trim_end_matches('/')
		);

		let mut params: Vec<(&str, String)> = vec![
			("chainId", request.chain_id.to_string()),
			("sellToken", request.from_token.clone()),
			("buyToken", request.to_token.clone()),
			("sellAmount", request.amount_in.to_string()),
		];
		if let Some(user) = &request.user_address {
			params.push(("taker", user.clone()));
		}

		let deadline = Instant::now() + config.timeout();
		let response = self
			.core
			.client()
			.execute_with_retry(
				|http| {
					http.get(&url)
						.query(&params)
						.header("0x-api-key", config.api_key.expose_secret())
						.header("0x-version", API_VERSION)
				},
				config.retry_count,
				deadline,
			)
			.await?;

		let (status, body) = read_body(response).await?;
		if status >= 400 {
			return Err(parse_error(status, &body));
		}
		normalize(&body)
	}
}

fn parse_error(status: u16, body: &str) -> AggregatorError {
	match serde_json::from_str::<ZeroExError>(body) {
		Ok(ZeroExError { reason: Some(msg) }) => {
			AggregatorError::Provider(format!("HTTP {}: {}", status, msg))
		}
		_ => AggregatorError::Provider(format!("HTTP {}", status)),
	}
}

/// Normalizes a successful wire response.
fn normalize(body: &str) -> Result<QuoteData, AggregatorError> {
	let quote: ZeroExQuote = serde_json::from_str(body)
		.map_err(|e| AggregatorError::Provider(format!("Unparseable response: {}", e)))?;

	if !quote.liquidity_available {
		return Err(AggregatorError::Provider(
			"No liquidity available for this pair".into(),
		));
	}

	let buy_amount = quote
		.buy_amount
		.ok_or_else(|| AggregatorError::Provider("buyAmount missing".into()))?;
	let amount_out = parse_untyped_amount(&buy_amount)
		.map_err(|e| AggregatorError::Provider(format!("buyAmount: {}", e)))?;

	let gas_estimate = match quote.transaction.as_ref().and_then(|tx| tx.gas.as_ref()) {
		Some(value) => parse_untyped_u64(value)
			.map_err(|e| AggregatorError::Provider(format!("transaction.gas: {}", e)))?,
		None => DEFAULT_GAS_UNITS,
	};

	let mut route = Vec::new();
	if let Some(wire_route) = quote.route {
		for fill in wire_route.fills {
			let bps = parse_untyped_u64(&fill.proportion_bps)
				.map_err(|e| AggregatorError::Provider(format!("proportionBps: {}", e)))?;
			route.push(RouteHop {
				protocol: fill.source,
				percentage: Decimal::new(bps as i64, 4),
				pool: None,
			});
		}
	}

	// Simulation completeness is the strongest trust signal this API
	// gives us.
	let simulation_incomplete = quote
		.issues
		.map(|issues| issues.simulation_incomplete)
		.unwrap_or(false);
	let confidence = if simulation_incomplete {
		Decimal::new(8, 1)
	} else {
		Decimal::new(95, 2)
	};

	Ok(QuoteData {
		amount_out,
		gas_estimate,
		price_impact: default_price_impact(),
		route,
		confidence,
	})
}

#[async_trait]
impl AggregatorInterface for ZeroExAggregator {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(CatalogSchema)
	}

	fn name(&self) -> &'static str {
		Registry::NAME
	}

	fn current_config(&self) -> Arc<ProviderConfig> {
		self.core.config()
	}

	fn update_config(&self, config: ProviderConfig) {
		self.core.swap_config(config);
	}

	async fn quote(&self, request: &QuoteRequest) -> ProviderQuote {
		self.core
			.execute_quote(Registry::NAME, request, |config| {
				self.fetch_quote(config, request)
			})
			.await
	}

	async fn health_check(&self) -> Result<(), AggregatorError> {
		let config = self.core.config();
		let url = format!(
			"{}/swap/permit2/quote",
			config.base_url.trim_end_matches('/')
		);
		self.core.client().probe(&url, config.timeout()).await
	}

	fn metrics(&self) -> crate::AggregatorMetricsSnapshot {
		self.core.metrics().snapshot()
	}
}

/// Registry for the 0x adapter.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "zeroex";
	type Factory = AggregatorFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| {
			let provider = parse_provider_config(config)?;
			Ok(Box::new(ZeroExAggregator::new(provider)?) as Box<dyn AggregatorInterface>)
		}
	}
}

impl AggregatorRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;

	#[test]
	fn test_normalize_full_response() {
		let body = r#"{
			"liquidityAvailable": true,
			"buyAmount": "3910000000",
			"transaction": {"gas": "215000", "to": "0xdef1"},
			"issues": {"simulationIncomplete": false},
			"route": {
				"fills": [
					{"source": "Uniswap_V3", "proportionBps": "7000"},
					{"source": "Curve", "proportionBps": "3000"}
				]
			}
		}"#;

		let data = normalize(body).unwrap();
		assert_eq!(data.amount_out, U256::from(3_910_000_000u64));
		assert_eq!(data.gas_estimate, 215_000);
		assert_eq!(data.confidence, Decimal::new(95, 2));
		assert_eq!(data.route[0].percentage, Decimal::new(7000, 4));
	}

	#[test]
	fn test_no_liquidity_is_provider_error() {
		let body = r#"{"liquidityAvailable": false}"#;
		let err = normalize(body).unwrap_err();
		assert!(err.to_string().contains("No liquidity"));
	}

	#[test]
	fn test_incomplete_simulation_lowers_confidence() {
		let body = r#"{
			"liquidityAvailable": true,
			"buyAmount": "100",
			"issues": {"simulationIncomplete": true}
		}"#;
		let data = normalize(body).unwrap();
		assert_eq!(data.confidence, Decimal::new(8, 1));
		assert_eq!(data.gas_estimate, DEFAULT_GAS_UNITS);
	}

	#[test]
	fn test_missing_buy_amount_is_provider_error() {
		let err = normalize(r#"{"liquidityAvailable": true}"#).unwrap_err();
		assert!(err.to_string().contains("buyAmount"));
	}
}
