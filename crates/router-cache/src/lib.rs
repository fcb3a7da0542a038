//! Quote cache module for the swap router.
//!
//! Aggregated quotes are expensive to produce (one HTTP round trip per
//! provider), so the router keeps them for a short TTL keyed by a
//! normalized request fingerprint. This module defines the backend
//! interface, the typed service wrapper the orchestrator talks to, and
//! the fingerprint computation.

use async_trait::async_trait;
use router_types::{ConfigSchema, ImplementationRegistry, QuoteRequest, QuoteResponse};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

pub mod fingerprint;

pub use fingerprint::fingerprint;

/// Errors that can occur during cache operations.
///
/// Cache failures are never surfaced to callers; the orchestrator logs
/// them and proceeds as if the lookup missed.
#[derive(Debug, Error)]
pub enum CacheError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the cache backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for cache backends.
///
/// Backends store opaque bytes under string keys with a mandatory TTL.
/// Expired entries must be invisible to readers even before a sweep
/// physically removes them.
#[async_trait]
pub trait CacheInterface: Send + Sync {
	/// Retrieves the value for `key`, or `None` on a miss or an expired
	/// entry.
	async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

	/// Stores `value` under `key`, expiring after `ttl`. Overwrites any
	/// previous entry and resets its expiry.
	async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration)
		-> Result<(), CacheError>;

	/// Removes the entry for `key` if present.
	async fn remove(&self, key: &str) -> Result<(), CacheError>;

	/// Physically removes expired entries, returning how many were
	/// dropped. Backends with native expiry can return 0.
	async fn purge_expired(&self) -> Result<usize, CacheError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for cache backend factory functions.
pub type CacheFactory = fn(&toml::Value) -> Result<Box<dyn CacheInterface>, CacheError>;

/// Registry trait for cache implementations.
pub trait CacheRegistry: ImplementationRegistry<Factory = CacheFactory> {}

/// Get all registered cache implementations.
///
/// Returns a vector of (name, factory) tuples used by the service wiring
/// to register every available backend.
pub fn get_all_implementations() -> Vec<(&'static str, CacheFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// Typed cache service the orchestrator talks to.
///
/// Wraps a backend with JSON (de)serialization of [`QuoteResponse`]
/// values, the configured default TTL, and fingerprint computation.
pub struct QuoteCacheService {
	/// The underlying cache backend implementation.
	backend: Box<dyn CacheInterface>,
	/// TTL applied to every stored quote.
	default_ttl: Duration,
	/// Prefix prepended to every fingerprint.
	prefix: String,
}

impl QuoteCacheService {
	/// Creates a new service over the given backend.
	pub fn new(backend: Box<dyn CacheInterface>, default_ttl: Duration, prefix: String) -> Self {
		Self {
			backend,
			default_ttl,
			prefix,
		}
	}

	/// Computes the cache key for a request.
	pub fn fingerprint(&self, request: &QuoteRequest) -> String {
		fingerprint(&self.prefix, request)
	}

	/// TTL applied to stored quotes; also how long a returned quote stays
	/// valid.
	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}

	/// Loads a cached response, or `None` on a miss.
	pub async fn load(&self, key: &str) -> Result<Option<QuoteResponse>, CacheError> {
		let Some(bytes) = self.backend.get_bytes(key).await? else {
			return Ok(None);
		};
		serde_json::from_slice(&bytes)
			.map(Some)
			.map_err(|e| CacheError::Serialization(e.to_string()))
	}

	/// Stores a response under `key` with the default TTL.
	pub async fn store(&self, key: &str, response: &QuoteResponse) -> Result<(), CacheError> {
		let bytes = serde_json::to_vec(response)
			.map_err(|e| CacheError::Serialization(e.to_string()))?;
		self.backend.set_bytes(key, bytes, self.default_ttl).await
	}

	/// Physically removes expired entries from the backend.
	pub async fn purge_expired(&self) -> Result<usize, CacheError> {
		self.backend.purge_expired().await
	}
}
