//! In-memory cache backend for the swap router.
//!
//! Stores entries in a HashMap behind an async read-write lock. Expiry is
//! checked on every read so stale entries are invisible immediately; a
//! periodic sweep (driven by the service binary) physically removes them.

use crate::{CacheError, CacheFactory, CacheInterface, CacheRegistry};
use async_trait::async_trait;
use router_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// One stored entry with its expiry.
struct CacheEntry {
	value: Vec<u8>,
	expires_at: Instant,
}

impl CacheEntry {
	fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}
}

/// In-memory cache implementation.
pub struct MemoryCache {
	/// The entry map protected by a read-write lock.
	store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
	/// Creates a new empty MemoryCache.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryCache {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CacheInterface for MemoryCache {
	async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
		let store = self.store.read().await;
		let now = Instant::now();
		Ok(store
			.get(key)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| entry.value.clone()))
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Duration,
	) -> Result<(), CacheError> {
		let mut store = self.store.write().await;
		store.insert(
			key.to_string(),
			CacheEntry {
				value,
				expires_at: Instant::now() + ttl,
			},
		);
		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<(), CacheError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn purge_expired(&self) -> Result<usize, CacheError> {
		let mut store = self.store.write().await;
		let now = Instant::now();
		let before = store.len();
		store.retain(|_, entry| !entry.is_expired(now));
		Ok(before - store.len())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryCacheSchema)
	}
}

/// Configuration schema for MemoryCache.
pub struct MemoryCacheSchema;

impl MemoryCacheSchema {
	/// Static validation method for use before instance creation.
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		let instance = Self;
		instance.validate(config)
	}
}

impl ConfigSchema for MemoryCacheSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory cache has no required configuration.
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory cache backend from configuration.
pub fn create_cache(config: &toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> {
	MemoryCacheSchema::validate_config(config)
		.map_err(|e| CacheError::Configuration(format!("Invalid configuration: {}", e)))?;

	Ok(Box::new(MemoryCache::new()))
}

/// Registry for the memory cache implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = CacheFactory;

	fn factory() -> Self::Factory {
		create_cache
	}
}

impl CacheRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_set_get_remove() {
		let cache = MemoryCache::new();

		cache
			.set_bytes("k", b"v".to_vec(), Duration::from_secs(10))
			.await
			.unwrap();
		assert_eq!(cache.get_bytes("k").await.unwrap(), Some(b"v".to_vec()));

		cache.remove("k").await.unwrap();
		assert_eq!(cache.get_bytes("k").await.unwrap(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_expired_entries_invisible() {
		let cache = MemoryCache::new();
		cache
			.set_bytes("k", b"v".to_vec(), Duration::from_secs(5))
			.await
			.unwrap();

		tokio::time::advance(Duration::from_secs(4)).await;
		assert!(cache.get_bytes("k").await.unwrap().is_some());

		tokio::time::advance(Duration::from_secs(2)).await;
		assert_eq!(cache.get_bytes("k").await.unwrap(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_overwrite_resets_expiry() {
		let cache = MemoryCache::new();
		cache
			.set_bytes("k", b"old".to_vec(), Duration::from_secs(5))
			.await
			.unwrap();

		tokio::time::advance(Duration::from_secs(4)).await;
		cache
			.set_bytes("k", b"new".to_vec(), Duration::from_secs(5))
			.await
			.unwrap();

		tokio::time::advance(Duration::from_secs(4)).await;
		assert_eq!(cache.get_bytes("k").await.unwrap(), Some(b"new".to_vec()));
	}

	#[tokio::test(start_paused = true)]
	async fn test_purge_expired() {
		let cache = MemoryCache::new();
		cache
			.set_bytes("short", b"a".to_vec(), Duration::from_secs(1))
			.await
			.unwrap();
		cache
			.set_bytes("long", b"b".to_vec(), Duration::from_secs(60))
			.await
			.unwrap();

		tokio::time::advance(Duration::from_secs(2)).await;
		assert_eq!(cache.purge_expired().await.unwrap(), 1);
		assert!(cache.get_bytes("long").await.unwrap().is_some());
	}
}
