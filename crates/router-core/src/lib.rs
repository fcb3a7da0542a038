//! Core router engine for the swap router system.
//!
//! The engine owns one aggregation round end to end: validate the
//! request, probe the quote cache, fan out to every adapter that serves
//! the target chain, collect results under a deadline, rank them, and
//! assemble the final response. Per-adapter failures never abort a round;
//! only request-level preconditions or a round with zero successes
//! surface as errors.

use router_aggregators::AggregatorInterface;
use router_cache::QuoteCacheService;
use router_types::{
	current_timestamp, format_exchange_rate, truncate_id, AggregationPerformance, ErrorCode,
	ProviderQuote, QuoteRequest, QuoteResponse,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::instrument;

pub mod metrics;
pub mod scoring;

pub use metrics::{RouterMetrics, RouterMetricsSnapshot};

/// Name recorded in the performance block for the one strategy the
/// engine currently implements.
const STRATEGY: &str = "parallel_best_score";

/// Errors surfaced to callers of the router engine.
///
/// Adapter-level failures are not represented here; they travel inside
/// [`ProviderQuote`] entries of the response.
#[derive(Debug, Error)]
pub enum RouterError {
	/// The request failed validation.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	/// No registered adapter supports the requested chain.
	#[error("No provider supports chain {0}")]
	UnsupportedChain(u64),
	/// Every queried adapter failed; the quotes carry the details.
	#[error("All queried providers failed to produce a quote")]
	NoValidQuotes { quotes: Vec<ProviderQuote> },
	/// Unexpected internal failure.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl RouterError {
	/// Maps the error onto the stable machine code.
	pub fn code(&self) -> ErrorCode {
		match self {
			RouterError::InvalidRequest(_) => ErrorCode::InvalidRequest,
			RouterError::UnsupportedChain(_) => ErrorCode::UnsupportedChain,
			RouterError::NoValidQuotes { .. } => ErrorCode::NoValidQuotes,
			RouterError::Internal(_) => ErrorCode::InternalError,
		}
	}
}

/// Health probe result for one adapter.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
	pub provider: String,
	pub healthy: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Per-adapter metrics labelled with the provider name.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetrics {
	pub provider: String,
	#[serde(flatten)]
	pub counters: router_aggregators::AggregatorMetricsSnapshot,
}

/// Main router engine that orchestrates quote aggregation.
///
/// Stateless per request; the only shared state is the cache and the
/// rolling metrics, both safe for concurrent use.
pub struct RouterEngine {
	/// Registered aggregator adapters.
	adapters: Vec<Arc<dyn AggregatorInterface>>,
	/// Quote cache service.
	cache: Arc<QuoteCacheService>,
	/// Router-level rolling counters.
	metrics: RouterMetrics,
}

impl RouterEngine {
	/// Creates a new engine over the given adapters and cache.
	pub fn new(adapters: Vec<Arc<dyn AggregatorInterface>>, cache: Arc<QuoteCacheService>) -> Self {
		Self {
			adapters,
			cache,
			metrics: RouterMetrics::default(),
		}
	}

	/// Returns the registered adapters.
	pub fn adapters(&self) -> &[Arc<dyn AggregatorInterface>] {
		&self.adapters
	}

	/// Returns the cache service, shared with the sweep task.
	pub fn cache(&self) -> &Arc<QuoteCacheService> {
		&self.cache
	}

	/// Produces the best available quote for a swap request.
	///
	/// Consults the cache first; on a miss, fans out to every adapter
	/// supporting the chain, ranks the results, stores the response, and
	/// returns it. At least one adapter must succeed.
	#[instrument(skip_all, fields(request_id = %truncate_id(&request.request_id), chain_id = request.chain_id))]
	pub async fn get_optimal_quote(
		&self,
		mut request: QuoteRequest,
	) -> Result<QuoteResponse, RouterError> {
		let started = Instant::now();
		self.metrics.record_request();

		request
			.validate()
			.map_err(|e| RouterError::InvalidRequest(e.to_string()))?;
		request.ensure_request_id();

		// Cache probe. Read failures degrade to a miss and are never
		// surfaced.
		let key = self.cache.fingerprint(&request);
		match self.cache.load(&key).await {
			Ok(Some(mut cached)) => {
				self.metrics.record_cache_hit();
				cached.cache_hit = true;
				cached.request_id = request.request_id.clone();
				tracing::debug!(provider = %cached.best_provider, "Cache hit");
				return Ok(cached);
			}
			Ok(None) => self.metrics.record_cache_miss(),
			Err(e) => {
				tracing::warn!(code = %ErrorCode::CacheError, error = %e, "Cache read failed");
				self.metrics.record_cache_miss();
			}
		}

		// Adapter selection.
		let selected: Vec<Arc<dyn AggregatorInterface>> = self
			.adapters
			.iter()
			.filter(|adapter| adapter.supports(request.chain_id))
			.cloned()
			.collect();
		if selected.is_empty() {
			return Err(RouterError::UnsupportedChain(request.chain_id));
		}

		let all_quotes = self.fan_out(&selected, &request).await;

		let response = self.assemble(&request, all_quotes, started)?;

		if let Err(e) = self.cache.store(&key, &response).await {
			tracing::warn!(code = %ErrorCode::CacheError, error = %e, "Cache write failed");
		}

		self.metrics
			.record_aggregation(started.elapsed().as_millis() as u64);
		Ok(response)
	}

	/// Spawns one task per selected adapter and collects every quote,
	/// bounded by the largest per-adapter timeout. Adapters that fail to
	/// report by then are recorded as timed out.
	async fn fan_out(
		&self,
		selected: &[Arc<dyn AggregatorInterface>],
		request: &QuoteRequest,
	) -> Vec<ProviderQuote> {
		let (tx, mut rx) = mpsc::channel(selected.len());
		for adapter in selected {
			let adapter = Arc::clone(adapter);
			let tx = tx.clone();
			let request = request.clone();
			tokio::spawn(async move {
				let quote = adapter.quote(&request).await;
				// The receiver only closes once the round is over.
				let _ = tx.send(quote).await;
			});
		}
		drop(tx);

		let overall = selected
			.iter()
			.map(|adapter| adapter.current_config().timeout())
			.max()
			.unwrap_or(Duration::from_secs(5));
		let deadline = Instant::now() + overall;

		let mut quotes = Vec::with_capacity(selected.len());
		while quotes.len() < selected.len() {
			let remaining = deadline.saturating_duration_since(Instant::now());
			match tokio::time::timeout(remaining, rx.recv()).await {
				Ok(Some(quote)) => quotes.push(quote),
				Ok(None) => break,
				Err(_) => break,
			}
		}

		// Stragglers count as timed out; their tasks die with the
		// channel.
		if quotes.len() < selected.len() {
			let reported: HashSet<String> =
				quotes.iter().map(|q| q.provider.clone()).collect();
			for adapter in selected {
				if !reported.contains(adapter.name()) {
					quotes.push(ProviderQuote::failure(
						adapter.name(),
						ErrorCode::ProviderTimeout,
						"Aggregation deadline exceeded",
						overall.as_millis() as u64,
					));
				}
			}
		}

		quotes
	}

	/// Ranks the round and builds the final response.
	fn assemble(
		&self,
		request: &QuoteRequest,
		mut all_quotes: Vec<ProviderQuote>,
		started: Instant,
	) -> Result<QuoteResponse, RouterError> {
		let winner_index = scoring::rank_quotes(&mut all_quotes);
		let Some(winner_index) = winner_index else {
			return Err(RouterError::NoValidQuotes { quotes: all_quotes });
		};
		let winner = all_quotes[winner_index].clone();

		// Ranked quotes first, failures after, both deterministic.
		all_quotes.sort_by(|a, b| match (a.rank, b.rank) {
			(Some(x), Some(y)) => x.cmp(&y),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => a.provider.cmp(&b.provider),
		});

		let performance = build_performance(&all_quotes, started.elapsed());
		tracing::info!(
			provider = %winner.provider,
			amount_out = %winner.amount_out,
			providers_success = performance.providers_success,
			duration_ms = performance.total_duration_ms,
			"Aggregation complete"
		);

		let now = current_timestamp();
		Ok(QuoteResponse {
			request_id: request.request_id.clone(),
			best_provider: winner.provider.clone(),
			best_amount_out: winner.amount_out,
			best_gas_estimate: winner.gas_estimate,
			best_price_impact: winner.price_impact,
			exchange_rate: format_exchange_rate(winner.amount_out, request.amount_in),
			route: winner.route.clone(),
			all_quotes,
			performance,
			valid_until: now + self.cache.default_ttl().as_secs(),
			cache_hit: false,
			timestamp: now,
		})
	}

	/// Probes every registered adapter concurrently.
	pub async fn provider_health(&self) -> Vec<ProviderHealth> {
		let probes = self.adapters.iter().map(|adapter| {
			let adapter = Arc::clone(adapter);
			async move {
				match adapter.health_check().await {
					Ok(()) => ProviderHealth {
						provider: adapter.name().to_string(),
						healthy: true,
						error: None,
					},
					Err(e) => ProviderHealth {
						provider: adapter.name().to_string(),
						healthy: false,
						error: Some(e.to_string()),
					},
				}
			}
		});
		futures::future::join_all(probes).await
	}

	/// Router-level counters.
	pub fn metrics_snapshot(&self) -> RouterMetricsSnapshot {
		self.metrics.snapshot()
	}

	/// Per-adapter counters, labelled by provider.
	pub fn provider_metrics(&self) -> Vec<ProviderMetrics> {
		self.adapters
			.iter()
			.map(|adapter| ProviderMetrics {
				provider: adapter.name().to_string(),
				counters: adapter.metrics(),
			})
			.collect()
	}
}

/// Derives the telemetry block from one round's quotes.
fn build_performance(quotes: &[ProviderQuote], total: Duration) -> AggregationPerformance {
	let queried = quotes.len() as u32;
	let success = quotes.iter().filter(|q| q.success).count() as u32;

	let fastest = quotes
		.iter()
		.min_by_key(|q| q.response_time_ms)
		.map(|q| q.provider.clone());
	let slowest = quotes
		.iter()
		.max_by_key(|q| q.response_time_ms)
		.map(|q| q.provider.clone());
	let avg = if quotes.is_empty() {
		0
	} else {
		quotes.iter().map(|q| q.response_time_ms).sum::<u64>() / quotes.len() as u64
	};

	AggregationPerformance {
		total_duration_ms: total.as_millis() as u64,
		providers_queried: queried,
		providers_success: success,
		fastest_provider: fastest,
		slowest_provider: slowest,
		avg_response_time_ms: avg,
		quality_score: if queried == 0 {
			Decimal::ZERO
		} else {
			Decimal::from(success) / Decimal::from(queried)
		},
		strategy_used: STRATEGY.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::U256;
	use async_trait::async_trait;
	use router_aggregators::{AggregatorError, AggregatorMetricsSnapshot};
	use router_cache::implementations::memory::MemoryCache;
	use router_types::{ConfigSchema, ProviderConfig, SecretString, ValidationError};
	use std::collections::BTreeSet;
	use std::sync::atomic::{AtomicU64, Ordering};

	struct NoopSchema;

	impl ConfigSchema for NoopSchema {
		fn validate(&self, _config: &toml::Value) -> Result<(), ValidationError> {
			Ok(())
		}
	}

	#[derive(Clone)]
	enum Behavior {
		Quote {
			amount_out: u64,
			gas: u64,
			confidence: Decimal,
			response_time_ms: u64,
		},
		Fail {
			code: ErrorCode,
			message: &'static str,
		},
		Hang,
	}

	struct MockAggregator {
		name: &'static str,
		config: Arc<ProviderConfig>,
		behavior: Behavior,
		delay: Duration,
		calls: AtomicU64,
	}

	impl MockAggregator {
		fn new(name: &'static str, chains: &[u64], behavior: Behavior, delay: Duration) -> Arc<Self> {
			Arc::new(Self {
				name,
				config: Arc::new(ProviderConfig {
					name: name.to_string(),
					display_name: name.to_string(),
					base_url: format!("https://{}.invalid", name),
					api_key: SecretString::default(),
					timeout_ms: 1_000,
					retry_count: 0,
					priority: 0,
					weight: Decimal::ONE,
					is_active: true,
					supported_chains: BTreeSet::from_iter(chains.iter().copied()),
				}),
				behavior,
				delay,
				calls: AtomicU64::new(0),
			})
		}

		fn calls(&self) -> u64 {
			self.calls.load(Ordering::Relaxed)
		}
	}

	#[async_trait]
	impl AggregatorInterface for MockAggregator {
		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(NoopSchema)
		}

		fn name(&self) -> &'static str {
			self.name
		}

		fn current_config(&self) -> Arc<ProviderConfig> {
			self.config.clone()
		}

		fn update_config(&self, _config: ProviderConfig) {}

		async fn quote(&self, _request: &QuoteRequest) -> ProviderQuote {
			self.calls.fetch_add(1, Ordering::Relaxed);
			tokio::time::sleep(self.delay).await;
			match &self.behavior {
				Behavior::Quote {
					amount_out,
					gas,
					confidence,
					response_time_ms,
				} => ProviderQuote::success(
					self.name,
					U256::from(*amount_out),
					*gas,
					Decimal::new(1, 3),
					Vec::new(),
					*response_time_ms,
					*confidence,
				),
				Behavior::Fail { code, message } => {
					ProviderQuote::failure(self.name, *code, *message, 120)
				}
				Behavior::Hang => {
					tokio::time::sleep(Duration::from_secs(3600)).await;
					ProviderQuote::failure(self.name, ErrorCode::ProviderTimeout, "hung", 1)
				}
			}
		}

		async fn health_check(&self) -> Result<(), AggregatorError> {
			Ok(())
		}

		fn metrics(&self) -> AggregatorMetricsSnapshot {
			AggregatorMetricsSnapshot {
				total_requests: self.calls(),
				success_count: 0,
				failure_count: 0,
				avg_response_time_ms: 0.0,
			}
		}
	}

	fn engine_with(adapters: Vec<Arc<MockAggregator>>, ttl: Duration) -> RouterEngine {
		let cache = QuoteCacheService::new(Box::new(MemoryCache::new()), ttl, "quote:".into());
		let adapters: Vec<Arc<dyn AggregatorInterface>> = adapters
			.into_iter()
			.map(|a| a as Arc<dyn AggregatorInterface>)
			.collect();
		RouterEngine::new(adapters, Arc::new(cache))
	}

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

	fn four_mocks() -> Vec<Arc<MockAggregator>> {
		let c = Decimal::new(9, 1);
		vec![
			MockAggregator::new(
				"cowswap",
				&[1],
				Behavior::Quote {
					amount_out: 3_900_000_000,
					gas: 0,
					confidence: c,
					response_time_ms: 180,
				},
				Duration::from_millis(180),
			),
			MockAggregator::new(
				"oneinch",
				&[1, 137],
				Behavior::Quote {
					amount_out: 3_917_634_720,
					gas: 189_000,
					confidence: c,
					response_time_ms: 240,
				},
				Duration::from_millis(240),
			),
			MockAggregator::new(
				"paraswap",
				&[1, 137],
				Behavior::Quote {
					amount_out: 3_910_000_000,
					gas: 180_000,
					confidence: c,
					response_time_ms: 420,
				},
				Duration::from_millis(420),
			),
			MockAggregator::new(
				"zeroex",
				&[1],
				Behavior::Quote {
					amount_out: 3_905_000_000,
					gas: 215_000,
					confidence: c,
					response_time_ms: 560,
				},
				Duration::from_millis(560),
			),
		]
	}

	#[tokio::test(start_paused = true)]
	async fn test_happy_path_best_quote_wins() {
		let engine = engine_with(four_mocks(), Duration::from_secs(30));
		let response = engine.get_optimal_quote(request()).await.unwrap();

		assert_eq!(response.request_id, "r1");
		assert_eq!(response.best_provider, "oneinch");
		assert_eq!(response.best_amount_out, U256::from(3_917_634_720u64));
		assert!(!response.cache_hit);
		assert_eq!(response.all_quotes.len(), 4);

		let mut ranks: Vec<u32> = response
			.all_quotes
			.iter()
			.map(|q| q.rank.unwrap())
			.collect();
		ranks.sort();
		assert_eq!(ranks, vec![1, 2, 3, 4]);
		assert_eq!(response.all_quotes[0].rank, Some(1));
		assert_eq!(response.all_quotes[0].provider, "oneinch");

		assert_eq!(response.performance.providers_queried, 4);
		assert_eq!(response.performance.providers_success, 4);
		assert_eq!(response.performance.fastest_provider.as_deref(), Some("cowswap"));
		assert_eq!(response.performance.slowest_provider.as_deref(), Some("zeroex"));
		assert_eq!(response.performance.quality_score, Decimal::ONE);

		// rate = 3_917_634_720 / 1e18
		assert_eq!(response.exchange_rate, "0.00000000391763472");
		assert!(response.valid_until > response.timestamp);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cache_hit_within_ttl() {
		let mocks = four_mocks();
		let engine = engine_with(mocks.clone(), Duration::from_secs(30));

		let first = engine.get_optimal_quote(request()).await.unwrap();
		assert!(!first.cache_hit);

		let mut second_request = request();
		second_request.request_id = "r2".into();
		second_request.user_address =
			Some("0x1111111111111111111111111111111111111111".into());
		let second = engine.get_optimal_quote(second_request).await.unwrap();

		assert!(second.cache_hit);
		assert_eq!(second.request_id, "r2");
		assert_eq!(second.best_provider, first.best_provider);
		assert_eq!(second.best_amount_out, first.best_amount_out);
		assert_eq!(second.best_gas_estimate, first.best_gas_estimate);

		// No adapter was re-queried.
		for mock in &mocks {
			assert_eq!(mock.calls(), 1);
		}

		let snapshot = engine.metrics_snapshot();
		assert_eq!(snapshot.total_requests, 2);
		assert_eq!(snapshot.cache_hits, 1);
		assert_eq!(snapshot.cache_misses, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cache_expires_after_ttl() {
		let mocks = four_mocks();
		let engine = engine_with(mocks.clone(), Duration::from_secs(5));

		engine.get_optimal_quote(request()).await.unwrap();
		tokio::time::advance(Duration::from_secs(6)).await;
		let second = engine.get_optimal_quote(request()).await.unwrap();

		assert!(!second.cache_hit);
		for mock in &mocks {
			assert_eq!(mock.calls(), 2);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_partial_failure_still_succeeds() {
		let mut mocks = four_mocks();
		mocks[3] = MockAggregator::new(
			"zeroex",
			&[1],
			Behavior::Fail {
				code: ErrorCode::ProviderError,
				message: "HTTP 502",
			},
			Duration::from_millis(120),
		);
		let engine = engine_with(mocks, Duration::from_secs(30));

		let response = engine.get_optimal_quote(request()).await.unwrap();
		assert_eq!(response.all_quotes.len(), 4);
		assert_eq!(response.performance.providers_success, 3);
		assert_eq!(response.best_provider, "oneinch");

		let failed = response
			.all_quotes
			.iter()
			.find(|q| q.provider == "zeroex")
			.unwrap();
		assert!(!failed.success);
		assert_eq!(failed.error_code, Some(ErrorCode::ProviderError));
		assert_eq!(failed.rank, None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unsupported_chain_no_outbound_calls() {
		let mocks = four_mocks();
		let engine = engine_with(mocks.clone(), Duration::from_secs(30));

		let mut req = request();
		req.chain_id = 9999;
		let err = engine.get_optimal_quote(req).await.unwrap_err();
		assert!(matches!(err, RouterError::UnsupportedChain(9999)));
		assert_eq!(err.code(), ErrorCode::UnsupportedChain);

		for mock in &mocks {
			assert_eq!(mock.calls(), 0);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_all_providers_fail() {
		let mocks: Vec<Arc<MockAggregator>> = ["cowswap", "oneinch", "paraswap", "zeroex"]
			.iter()
			.map(|&name| {
				MockAggregator::new(
					name,
					&[1],
					Behavior::Fail {
						code: ErrorCode::ProviderError,
						message: "HTTP 503",
					},
					Duration::from_millis(50),
				)
			})
			.collect();
		let engine = engine_with(mocks, Duration::from_secs(30));

		let err = engine.get_optimal_quote(request()).await.unwrap_err();
		let RouterError::NoValidQuotes { quotes } = err else {
			panic!("expected NoValidQuotes");
		};
		assert_eq!(quotes.len(), 4);
		assert!(quotes.iter().all(|q| !q.success));
	}

	#[tokio::test(start_paused = true)]
	async fn test_hung_adapter_reported_as_timeout() {
		let mut mocks = four_mocks();
		mocks[2] = MockAggregator::new("paraswap", &[1], Behavior::Hang, Duration::ZERO);
		let engine = engine_with(mocks, Duration::from_secs(30));

		let response = engine.get_optimal_quote(request()).await.unwrap();
		assert_eq!(response.all_quotes.len(), 4);

		let hung = response
			.all_quotes
			.iter()
			.find(|q| q.provider == "paraswap")
			.unwrap();
		assert!(!hung.success);
		assert_eq!(hung.error_code, Some(ErrorCode::ProviderTimeout));
		assert_eq!(response.performance.providers_success, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_invalid_request_rejected() {
		let engine = engine_with(four_mocks(), Duration::from_secs(30));

		let mut req = request();
		req.slippage = Decimal::new(6, 1);
		let err = engine.get_optimal_quote(req).await.unwrap_err();
		assert_eq!(err.code(), ErrorCode::InvalidRequest);
	}

	#[tokio::test(start_paused = true)]
	async fn test_request_id_minted_when_absent() {
		let engine = engine_with(four_mocks(), Duration::from_secs(30));

		let mut req = request();
		req.request_id = String::new();
		let response = engine.get_optimal_quote(req).await.unwrap();
		assert!(!response.request_id.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn test_tie_break_prefers_faster_provider() {
		let c = Decimal::new(9, 1);
		let mocks = vec![
			MockAggregator::new(
				"slowpoke",
				&[1],
				Behavior::Quote {
					amount_out: 100,
					gas: 120_000,
					confidence: c,
					response_time_ms: 250,
				},
				Duration::from_millis(250),
			),
			MockAggregator::new(
				"speedy",
				&[1],
				Behavior::Quote {
					amount_out: 100,
					gas: 120_000,
					confidence: c,
					response_time_ms: 150,
				},
				Duration::from_millis(150),
			),
		];
		let engine = engine_with(mocks, Duration::from_secs(30));

		let response = engine.get_optimal_quote(request()).await.unwrap();
		assert_eq!(response.best_provider, "speedy");
	}
}
