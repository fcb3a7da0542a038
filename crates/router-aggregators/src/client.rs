//! Shared HTTP execution for aggregator adapters.
//!
//! Every adapter drives its provider through [`AggregatorClient`]: a
//! pooled `reqwest` client plus a retry loop with linear back-off and a
//! hard deadline. Transport failures and 5xx responses are retried; 4xx
//! responses are terminal and handed back so the adapter can parse the
//! provider's error schema.

use crate::AggregatorError;
use std::time::Duration;
use tokio::time::Instant;

/// Idle connections are kept warm this long for reuse across requests.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// Idle connections retained per provider host.
const POOL_MAX_IDLE_PER_HOST: usize = 10;
/// Back-off before retry N is N times this.
const RETRY_BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Pooled HTTP client shared by all requests of one adapter.
pub struct AggregatorClient {
	http: reqwest::Client,
}

impl AggregatorClient {
	/// Builds a client with connection pooling. Timeouts are applied per
	/// request from the remaining deadline, so configuration hot reloads
	/// take effect without rebuilding the client.
	pub fn new() -> Result<Self, AggregatorError> {
		let http = reqwest::Client::builder()
			.pool_idle_timeout(POOL_IDLE_TIMEOUT)
			.pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
			.build()
			.map_err(|e| AggregatorError::Configuration(format!("HTTP client: {}", e)))?;
		Ok(Self { http })
	}

	/// Access to the underlying client for request building.
	pub fn http(&self) -> &reqwest::Client {
		&self.http
	}

	/// Executes a request with up to `retry_count` additional attempts.
	///
	/// `build` is invoked once per attempt because a `RequestBuilder` is
	/// consumed on send. Retries happen on transport errors and 5xx
	/// status; any response below 500 (success or client error) is
	/// returned for the adapter to interpret. The remaining deadline is
	/// checked before every attempt and every back-off sleep.
	pub async fn execute_with_retry<F>(
		&self,
		build: F,
		retry_count: u32,
		deadline: Instant,
	) -> Result<reqwest::Response, AggregatorError>
	where
		F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
	{
		let mut last_error: Option<AggregatorError> = None;

		for attempt in 0..=retry_count {
			let now = Instant::now();
			if now >= deadline {
				return Err(last_error
					.unwrap_or(AggregatorError::Timeout(Duration::ZERO)));
			}

			if attempt > 0 {
				let backoff = RETRY_BACKOFF_STEP * attempt;
				let remaining = deadline - now;
				if backoff >= remaining {
					return Err(last_error
						.unwrap_or(AggregatorError::Timeout(remaining)));
				}
				tokio::time::sleep(backoff).await;
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			let request = build(&self.http).timeout(remaining);

			match request.send().await {
				Ok(response) => {
					let status = response.status();
					if status.is_server_error() {
						tracing::debug!(
							status = status.as_u16(),
							attempt,
							"Server error, will retry"
						);
						last_error = Some(AggregatorError::Provider(format!(
							"HTTP {}",
							status.as_u16()
						)));
						continue;
					}
					return Ok(response);
				}
				Err(e) if e.is_timeout() => {
					return Err(AggregatorError::Timeout(remaining));
				}
				Err(e) => {
					tracing::debug!(error = %e, attempt, "Transport error, will retry");
					last_error = Some(AggregatorError::Provider(format!("Transport: {}", e)));
				}
			}
		}

		Err(last_error.unwrap_or_else(|| AggregatorError::Provider("Request failed".into())))
	}

	/// Lightweight liveness probe: the provider counts as healthy when it
	/// answers at all with a non-5xx status.
	pub async fn probe(&self, url: &str, timeout: Duration) -> Result<(), AggregatorError> {
		let response = self
			.http
			.get(url)
			.timeout(timeout)
			.send()
			.await
			.map_err(|e| AggregatorError::Provider(format!("Probe failed: {}", e)))?;

		if response.status().is_server_error() {
			return Err(AggregatorError::Provider(format!(
				"Probe returned HTTP {}",
				response.status().as_u16()
			)));
		}
		Ok(())
	}
}

/// Reads a response body, mapping transport failures.
pub async fn read_body(response: reqwest::Response) -> Result<(u16, String), AggregatorError> {
	let status = response.status().as_u16();
	let body = response
		.text()
		.await
		.map_err(|e| AggregatorError::Provider(format!("Body read: {}", e)))?;
	Ok((status, body))
}
