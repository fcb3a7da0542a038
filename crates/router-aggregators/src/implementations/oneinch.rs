//! 1inch adapter.
//!
//! Generic GET API with the chain ID in the path:
//! `{base}/{chain_id}/quote?fromTokenAddress=…&toTokenAddress=…&amount=…`.
//! The API key travels as a bearer token. Routes come back as an array of
//! arrays of `{name, part}` legs where `part` is an integer percentage.

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

/// Wire format of a successful quote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OneInchQuote {
	to_token_amount: serde_json::Value,
	#[serde(default)]
	estimated_gas: Option<serde_json::Value>,
	#[serde(default)]
	protocols: Vec<Vec<OneInchHop>>,
}

/// One route leg; `part` is an integer in 0..=100.
#[derive(Debug, Deserialize)]
struct OneInchHop {
	name: String,
	part: serde_json::Value,
}

/// Wire format of an error response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OneInchError {
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	error: Option<String>,
}

/// 1inch does not report price impact on the quote endpoint; this
/// constant stands in and is reflected in the confidence signal.
fn default_price_impact() -> Decimal {
	Decimal::new(1, 3) // 0.1%
}

fn confidence() -> Decimal {
	Decimal::new(9, 1)
}

/// Adapter for the 1inch aggregation API.
pub struct OneInchAggregator {
	core: AdapterCore,
}

impl OneInchAggregator {
	/// Creates the adapter from its own configuration copy.
	pub fn new(config: ProviderConfig) -> Result<Self, AggregatorError> {
		Ok(Self {
			core: AdapterCore::new(config)?,
		})
	}

	fn quote_url(config: &ProviderConfig, request: &QuoteRequest) -> String {
		format!(
			"{}/{}/quote",
			config.base_url.trim_end_matches('/'),
			request.chain_id
		)
	}

	async fn fetch_quote(
		&self,
		config: Arc<ProviderConfig>,
		request: &QuoteRequest,
	) -> Result<QuoteData, AggregatorError> {
		let url = Self::quote_url(&config, request);
		// Wire slippage is a percentage, not a fraction.
		let slippage_pct = (request.slippage * Decimal::ONE_HUNDRED).normalize().to_string();

		let mut params: Vec<(&str, String)> = vec![
			("fromTokenAddress", request.from_token.clone()),
			("toTokenAddress", request.to_token.clone()),
			("amount", request.amount_in.to_string()),
			("slippage", slippage_pct),
		];
		if let Some(user) = &request.user_address {
			params.push(("fromAddress", user.clone()));
		}

		let deadline = Instant::now() + config.timeout();
		let response = self
			.core
			.client()
			.execute_with_retry(
				|http| {
					let mut builder = http.get(&url).query(&params);
					if !config.api_key.is_empty() {
						builder = builder.bearer_auth(config.api_key.expose_secret());
					}
					builder
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

/// Maps a non-2xx body onto the provider error taxonomy.
fn parse_error(status: u16, body: &str) -> AggregatorError {
	match serde_json::from_str::<OneInchError>(body) {
		Ok(err) => AggregatorError::Provider(format!(
			"HTTP {}: {}",
			status,
			err.description
				.or(err.error)
				.unwrap_or_else(|| "unknown error".to_string())
		)),
		Err(_) => AggregatorError::Provider(format!("HTTP {}", status)),
	}
}

/// Normalizes a successful wire response.
fn normalize(body: &str) -> Result<QuoteData, AggregatorError> {
	let quote: OneInchQuote = serde_json::from_str(body)
		.map_err(|e| AggregatorError::Provider(format!("Unparseable response: {}", e)))?;

	let amount_out = parse_untyped_amount(&quote.to_token_amount)
		.map_err(|e| AggregatorError::Provider(format!("toTokenAmount: {}", e)))?;
	let gas_estimate = match &quote.estimated_gas {
		Some(value) => parse_untyped_u64(value)
			.map_err(|e| AggregatorError::Provider(format!("estimatedGas: {}", e)))?,
		None => 0,
	};

	let mut route = Vec::new();
	for hop in quote.protocols.into_iter().flatten() {
		let part = parse_untyped_u64(&hop.part)
			.map_err(|e| AggregatorError::Provider(format!("protocols.part: {}", e)))?;
		route.push(RouteHop {
			protocol: hop.name,
			percentage: Decimal::new(part as i64, 2),
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

#[async_trait]
impl AggregatorInterface for OneInchAggregator {
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
		let chain = config.supported_chains.iter().next().copied().unwrap_or(1);
		let url = format!(
			"{}/{}/healthcheck",
			config.base_url.trim_end_matches('/'),
			chain
		);
		self.core.client().probe(&url, config.timeout()).await
	}

	fn metrics(&self) -> crate::AggregatorMetricsSnapshot {
		self.core.metrics().snapshot()
	}
}

/// Registry for the 1inch adapter.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "oneinch";
	type Factory = AggregatorFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| {
			let provider = parse_provider_config(config)?;
			Ok(Box::new(OneInchAggregator::new(provider)?) as Box<dyn AggregatorInterface>)
		}
	}
}

impl AggregatorRegistry for Registry {}
