//! Router-level rolling metrics.
//!
//! Request, cache, and aggregation-duration counters updated across
//! concurrent requests, exposed as a snapshot through `/metrics`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Rolling counters for the router engine.
#[derive(Default)]
pub struct RouterMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	aggregations: AtomicU64,
	total_aggregation_ms: AtomicU64,
}

impl RouterMetrics {
	pub fn record_request(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_cache_miss(&self) {
		self.cache_misses.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_aggregation(&self, duration_ms: u64) {
		self.aggregations.fetch_add(1, Ordering::Relaxed);
		self.total_aggregation_ms
			.fetch_add(duration_ms, Ordering::Relaxed);
	}

	/// Point-in-time copy of the counters.
	pub fn snapshot(&self) -> RouterMetricsSnapshot {
		let aggregations = self.aggregations.load(Ordering::Relaxed);
		let total_ms = self.total_aggregation_ms.load(Ordering::Relaxed);
		RouterMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			cache_misses: self.cache_misses.load(Ordering::Relaxed),
			aggregations,
			avg_aggregation_ms: if aggregations == 0 {
				0.0
			} else {
				total_ms as f64 / aggregations as f64
			},
		}
	}
}

/// Serializable snapshot exposed through `/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct RouterMetricsSnapshot {
	pub total_requests: u64,
	pub cache_hits: u64,
	pub cache_misses: u64,
	pub aggregations: u64,
	pub avg_aggregation_ms: f64,
}
