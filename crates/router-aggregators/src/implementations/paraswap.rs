//! ParaSwap adapter.
//!
//! GET API with the chain as a query parameter:
//! `{base}/prices?srcToken=…&destToken=…&amount=…&network=…&side=SELL`.
//! The price payload nests under `priceRoute`. ParaSwap reports a gas
//! *cost* in native wei rather than a unit count, so the adapter converts
//! it back into units at an assumed 20 gwei.

use crate::{
	client::read_body, parse_provider_config, AdapterCore, AggregatorError, AggregatorFactory,
	AggregatorInterface, AggregatorRegistry, CatalogSchema, QuoteData,
};
use async_trait::async_trait;
use alloy_primitives::U256;
use router_types::{
	parse_untyped_amount, ConfigSchema, ImplementationRegistry, ProviderConfig, ProviderQuote,
	QuoteRequest, RouteHop,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::Instant;

/// Gas price assumed when converting the reported wei cost to units.
const ASSUMED_GAS_PRICE_WEI: u64 = 20_000_000_000;

/// Gas units assumed when the provider reports no cost at all.
const DEFAULT_GAS_UNITS: u64 = 180_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParaSwapResponse {
	price_route: PriceRoute,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRoute {
	dest_amount: serde_json::Value,
	/// Gas cost of the swap in native wei, not a unit count.
	#[serde(default)]
	gas_cost: Option<serde_json::Value>,
	#[serde(default)]
	best_route: Vec<RouteLeg>,
}

#[derive(Debug, Deserialize)]
struct RouteLeg {
	exchange: String,
	percent: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ParaSwapError {
	#[serde(default)]
	error: Option<String>,
}

fn default_price_impact() -> Decimal {
	Decimal::new(15, 4) // 0.15%
}

fn confidence() -> Decimal {
	Decimal::new(85, 2)
}

/// Adapter for the ParaSwap prices API.
pub struct ParaSwapAggregator {
	core: AdapterCore,
}

impl ParaSwapAggregator {
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
		let url = format!("{}/prices", config.base_url.trim_end_matches('/'));

		let mut params: Vec<(&str, String)> = vec![
			("srcToken", request.from_token.clone()),
			("destToken", request.to_token.clone()),
			("amount", request.amount_in.to_string()),
			("network", request.chain_id.to_string()),
			("side", "SELL".to_string()),
		];
		if let Some(user) = &request.user_address {
			params.push(("userAddress", user.clone()));
		}

		let deadline = Instant::now() + config.timeout();
		let response = self
			.core
			.client()
			.execute_with_retry(
				|http| http.get(&url).query(&params),
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
	match serde_json::from_str::<ParaSwapError>(body) {
		Ok(ParaSwapError { error: Some(msg) }) => {
			AggregatorError::Provider(format!("HTTP {}: {}", status, msg))
		}
		_ => AggregatorError::Provider(format!("HTTP {}", status)),
	}
}

/// Normalizes a successful wire response.
fn normalize(body: &str) -> Result<QuoteData, AggregatorError> {
	let response: ParaSwapResponse = serde_json::from_str(body)
		.map_err(|e| AggregatorError::Provider(format!("Unparseable response: {}", e)))?;
	let price_route = response.price_route;

	let amount_out = parse_untyped_amount(&price_route.dest_amount)
		.map_err(|e| AggregatorError::Provider(format!("destAmount: {}", e)))?;
	let gas_estimate = gas_units_from_cost(price_route.gas_cost.as_ref())?;

	let mut route = Vec::new();
	for leg in price_route.best_route {
		let percent = leg
			.percent
			.as_f64()
			.map(|p| Decimal::try_from(p / 100.0).unwrap_or_default())
			.or_else(|| leg.percent.as_str().and_then(|s| s.parse::<Decimal>().ok().map(|d| d / Decimal::ONE_HUNDRED)))
			.ok_or_else(|| AggregatorError::Provider("bestRoute.percent not a number".into()))?;
		route.push(RouteHop {
			protocol: leg.exchange,
			percentage: percent,
			pool: None,
		});
	}

	Ok(QuoteData {
		amount_out,
		gas_estimate,
		price_impact: default_price_impact(),
		route,
		confidence: confidence(),
	})
}

/// Converts the reported native-wei gas cost into a unit estimate.
fn gas_units_from_cost(cost: Option<&serde_json::Value>) -> Result<u64, AggregatorError> {
	let Some(cost) = cost else {
		return Ok(DEFAULT_GAS_UNITS);
	};
	let cost_wei = parse_untyped_amount(cost)
		.map_err(|e| AggregatorError::Provider(format!("gasCost: {}", e)))?;
	if cost_wei.is_zero() {
		return Ok(DEFAULT_GAS_UNITS);
	}
	let units = cost_wei / U256::from(ASSUMED_GAS_PRICE_WEI);
	units
		.try_into()
		.map_err(|_| AggregatorError::Provider(format!("gasCost out of range: {}", cost_wei)))
}

#[async_trait]
impl AggregatorInterface for ParaSwapAggregator {
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
		let url = format!("{}/prices", config.base_url.trim_end_matches('/'));
		self.core.client().probe(&url, config.timeout()).await
	}

	fn metrics(&self) -> crate::AggregatorMetricsSnapshot {
		self.core.metrics().snapshot()
	}
}

/// Registry for the ParaSwap adapter.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "paraswap";
	type Factory = AggregatorFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| {
			let provider = parse_provider_config(config)?;
			Ok(Box::new(ParaSwapAggregator::new(provider)?) as Box<dyn AggregatorInterface>)
		}
	}
}

impl AggregatorRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_full_response() {
		let body = r#"{
			"priceRoute": {
				"destAmount": "3905000000",
				"gasCost": "3600000000000000",
				"bestRoute": [
					{"exchange": "UniswapV2", "percent": 60},
					{"exchange": "SushiSwap", "percent": 40}
				]
			}
		}"#;

		let data = normalize(body).unwrap();
		assert_eq!(data.amount_out, U256::from(3_905_000_000u64));
		// 3.6e15 wei at 20 gwei = 180_000 units.
		assert_eq!(data.gas_estimate, 180_000);
		assert_eq!(data.route.len(), 2);
		assert_eq!(data.route[0].percentage, Decimal::new(6, 1));
	}

	#[test]
	fn test_missing_gas_cost_falls_back() {
		let body = r#"{"priceRoute": {"destAmount": "5", "bestRoute": []}}"#;
		assert_eq!(normalize(body).unwrap().gas_estimate, DEFAULT_GAS_UNITS);

		let body = r#"{"priceRoute": {"destAmount": "5", "gasCost": "0", "bestRoute": []}}"#;
		assert_eq!(normalize(body).unwrap().gas_estimate, DEFAULT_GAS_UNITS);
	}

	#[test]
	fn test_error_schema() {
		let err = parse_error(400, r#"{"error": "Token not found"}"#);
		assert!(err.to_string().contains("Token not found"));
	}

	#[test]
	fn test_missing_price_route_is_provider_error() {
		let err = normalize(r#"{"unexpected": true}"#).unwrap_err();
		assert!(matches!(err, AggregatorError::Provider(_)));
	}
}
