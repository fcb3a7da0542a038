//! CoW Protocol adapter.
//!
//! Batch-auction quote API: POST `{base}/quote` with a full order
//! skeleton. The `appDataHash` field must be the keccak-256 digest of the
//! exact `appData` string sent, and the order uses the caller's token
//! addresses verbatim; the orderbook rejects a hash mismatch and a
//! silently wrapped token would quote a different asset than requested.

use crate::{
	client::read_body, parse_provider_config, AdapterCore, AggregatorError, AggregatorFactory,
	AggregatorInterface, AggregatorRegistry, CatalogSchema, QuoteData,
};
use alloy_primitives::keccak256;
use async_trait::async_trait;
use router_types::{
	parse_untyped_amount, ConfigSchema, ImplementationRegistry, ProviderConfig, ProviderQuote,
	QuoteRequest,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

/// Order metadata document sent with every quote request.
const APP_DATA: &str = r#"{"appCode":"swap-router","metadata":{},"version":"1.1.0"}"#;

/// Receiver/from placeholder when the caller did not supply an address.
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CowQuoteBody<'a> {
	sell_token: &'a str,
	buy_token: &'a str,
	receiver: &'a str,
	sell_amount_before_fee: String,
	kind: &'static str,
	signing_scheme: &'static str,
	app_data: &'static str,
	app_data_hash: String,
	from: &'a str,
	price_quality: &'static str,
	onchain_order: bool,
	timeout: u64,
	sell_token_balance: &'static str,
	buy_token_balance: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CowQuoteResponse {
	quote: CowQuote,
	#[serde(default)]
	verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CowQuote {
	buy_amount: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CowError {
	#[serde(default)]
	error_type: Option<String>,
	#[serde(default)]
	description: Option<String>,
}

fn default_price_impact() -> Decimal {
	Decimal::new(2, 3) // 0.2%
}

/// Hex-encoded keccak-256 digest of the app data document.
fn app_data_hash() -> String {
	format!("0x{}", hex::encode(keccak256(APP_DATA.as_bytes())))
}

/// Adapter for the CoW Protocol orderbook quote API.
pub struct CowSwapAggregator {
	core: AdapterCore,
}

impl CowSwapAggregator {
	/// Creates the adapter from its own configuration copy.
	pub fn new(config: ProviderConfig) -> Result<Self, AggregatorError> {
		Ok(Self {
			core: AdapterCore::new(config)?,
		})
	}

	fn build_body<'a>(request: &'a QuoteRequest) -> CowQuoteBody<'a> {
		let trader = request.user_address.as_deref().unwrap_or(ZERO_ADDRESS);
		CowQuoteBody {
			sell_token: &request.from_token,
			buy_token: &request.to_token,
			receiver: trader,
			sell_amount_before_fee: request.amount_in.to_string(),
			kind: "sell",
			signing_scheme: "eip712",
			app_data: APP_DATA,
			app_data_hash: app_data_hash(),
			from: trader,
			price_quality: "fast",
			onchain_order: false,
			timeout: 0,
			sell_token_balance: "erc20",
			buy_token_balance: "erc20",
		}
	}

	async fn fetch_quote(
		&self,
		config: Arc<ProviderConfig>,
		request: &QuoteRequest,
	) -> Result<QuoteData, AggregatorError> {
		let url = format!("{}/quote", config.base_url.trim_end_matches('/'));
		let body = Self::build_body(request);

		let deadline = Instant::now() + config.timeout();
		let response = self
			.core
			.client()
			.execute_with_retry(
				|http| http.post(&url).json(&body),
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
	match serde_json::from_str::<CowError>(body) {
		Ok(err) => {
			let kind = err.error_type.unwrap_or_else(|| "unknown".to_string());
			let detail = err.description.unwrap_or_default();
			AggregatorError::Provider(format!("HTTP {}: {} {}", status, kind, detail))
		}
		Err(_) => AggregatorError::Provider(format!("HTTP {}", status)),
	}
}

/// Normalizes a successful wire response.
///
/// Batch auctions have no per-venue leg decomposition, so the route stays
/// empty.
fn normalize(body: &str) -> Result<QuoteData, AggregatorError> {
	let response: CowQuoteResponse = serde_json::from_str(body)
		.map_err(|e| AggregatorError::Provider(format!("Unparseable response: {}", e)))?;

	let amount_out = parse_untyped_amount(&response.quote.buy_amount)
		.map_err(|e| AggregatorError::Provider(format!("buyAmount: {}", e)))?;

	let confidence = if response.verified {
		Decimal::new(95, 2)
	} else {
		Decimal::new(85, 2)
	};

	Ok(QuoteData {
		amount_out,
		// Settlement gas is borne by the winning solver, not the trader.
		gas_estimate: 0,
		price_impact: default_price_impact(),
		route: Vec::new(),
		confidence,
	})
}

#[async_trait]
impl AggregatorInterface for CowSwapAggregator {
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
		let url = format!("{}/version", config.base_url.trim_end_matches('/'));
		self.core.client().probe(&url, config.timeout()).await
	}

	fn metrics(&self) -> crate::AggregatorMetricsSnapshot {
		self.core.metrics().snapshot()
	}
}

/// Registry for the CoW Protocol adapter.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "cowswap";
	type Factory = AggregatorFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| {
			let provider = parse_provider_config(config)?;
			Ok(Box::new(CowSwapAggregator::new(provider)?) as Box<dyn AggregatorInterface>)
		}
	}
}

impl AggregatorRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;

	fn request() -> QuoteRequest {
		QuoteRequest {
			request_id: "r1".into(),
			from_token: "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".into(),
			to_token: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".into(),
			amount_in: U256::from(10).pow(U256::from(18)),
			chain_id: 1,
			slippage: Decimal::new(5, 3),
			user_address: None,
			gas_price: None,
			deadline: None,
		}
	}

	#[test]
	fn test_app_data_hash_matches_document() {
		let expected = format!("0x{}", hex::encode(keccak256(APP_DATA.as_bytes())));
		assert_eq!(app_data_hash(), expected);
		// A zero hash would be rejected by the orderbook.
		assert_ne!(
			app_data_hash(),
			"0x0000000000000000000000000000000000000000000000000000000000000000"
		);
	}

	#[test]
	fn test_body_uses_caller_tokens_verbatim() {
		let request = request();
		let body = CowSwapAggregator::build_body(&request);
		let json = serde_json::to_value(&body).unwrap();

		// The native-token placeholder must not be swapped for WETH.
		assert_eq!(json["sellToken"], request.from_token);
		assert_eq!(json["buyToken"], request.to_token);
		assert_eq!(json["kind"], "sell");
		assert_eq!(json["sellAmountBeforeFee"], "1000000000000000000");
		assert_eq!(json["onchainOrder"], false);
		assert_eq!(json["sellTokenBalance"], "erc20");
		assert_eq!(json["appDataHash"], app_data_hash());
		assert_eq!(json["from"], ZERO_ADDRESS);
	}

	#[test]
	fn test_body_uses_user_address_when_present() {
		let mut request = request();
		request.user_address = Some("0x1111111111111111111111111111111111111111".into());
		let json = serde_json::to_value(CowSwapAggregator::build_body(&request)).unwrap();
		assert_eq!(json["from"], "0x1111111111111111111111111111111111111111");
		assert_eq!(json["receiver"], "0x1111111111111111111111111111111111111111");
	}

	#[test]
	fn test_normalize_verified_quote() {
		let body = r#"{
			"quote": {
				"sellToken": "0xeee",
				"buyToken": "0xa0b",
				"sellAmount": "999000000000000000",
				"buyAmount": "3900000000",
				"feeAmount": "1000000000000000",
				"validTo": 1700000000
			},
			"verified": true
		}"#;

		let data = normalize(body).unwrap();
		assert_eq!(data.amount_out, U256::from(3_900_000_000u64));
		assert_eq!(data.confidence, Decimal::new(95, 2));
		assert!(data.route.is_empty());
		assert_eq!(data.gas_estimate, 0);
	}

	#[test]
	fn test_normalize_unverified_quote() {
		let body = r#"{"quote": {"buyAmount": "5"}, "verified": false}"#;
		assert_eq!(normalize(body).unwrap().confidence, Decimal::new(85, 2));
	}

	#[test]
	fn test_error_schema() {
		let err = parse_error(
			400,
			r#"{"errorType": "NoLiquidity", "description": "no route found"}"#,
		);
		assert!(err.to_string().contains("NoLiquidity"));
	}
}
