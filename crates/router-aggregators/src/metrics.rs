//! Rolling per-adapter metrics.
//!
//! Counters are atomics updated from the adapter task; the average
//! response time is an exponentially weighted moving average so a slow
//! provider shows up quickly without a full histogram.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Smoothing factor for the response-time EWMA.
const EWMA_ALPHA: f64 = 0.1;

/// Rolling counters for one adapter.
#[derive(Default)]
pub struct AdapterMetrics {
	total: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	avg_response_ms: Mutex<f64>,
}

impl AdapterMetrics {
	/// Records the outcome of one quote attempt.
	pub fn record(&self, success: bool, response_time_ms: u64) {
		let prior = self.total.fetch_add(1, Ordering::Relaxed);
		if success {
			self.success.fetch_add(1, Ordering::Relaxed);
		} else {
			self.failure.fetch_add(1, Ordering::Relaxed);
		}

		let sample = response_time_ms as f64;
		let mut avg = self
			.avg_response_ms
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		if prior == 0 {
			*avg = sample;
		} else {
			*avg = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * *avg;
		}
	}

	/// Point-in-time copy of the counters.
	pub fn snapshot(&self) -> AggregatorMetricsSnapshot {
		let avg = self
			.avg_response_ms
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		AggregatorMetricsSnapshot {
			total_requests: self.total.load(Ordering::Relaxed),
			success_count: self.success.load(Ordering::Relaxed),
			failure_count: self.failure.load(Ordering::Relaxed),
			avg_response_time_ms: *avg,
		}
	}
}

/// Serializable snapshot exposed through `/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatorMetricsSnapshot {
	pub total_requests: u64,
	pub success_count: u64,
	pub failure_count: u64,
	pub avg_response_time_ms: f64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_counters() {
		let metrics = AdapterMetrics::default();
		metrics.record(true, 100);
		metrics.record(false, 300);
		metrics.record(true, 100);

		let snapshot = metrics.snapshot();
		assert_eq!(snapshot.total_requests, 3);
		assert_eq!(snapshot.success_count, 2);
		assert_eq!(snapshot.failure_count, 1);
	}

	#[test]
	fn test_ewma_seeds_then_smooths() {
		let metrics = AdapterMetrics::default();
		metrics.record(true, 200);
		assert_eq!(metrics.snapshot().avg_response_time_ms, 200.0);

		metrics.record(true, 400);
		// 0.1 * 400 + 0.9 * 200
		let avg = metrics.snapshot().avg_response_time_ms;
		assert!((avg - 220.0).abs() < 1e-9);
	}
}
