//! HTTP server for the swap router API.
//!
//! Exposes the single core endpoint `POST /quote` plus the observability
//! surface: `GET /health` (optionally with per-provider probes) and
//! `GET /metrics` (router and per-adapter counters).

use axum::{
	extract::{Query, State},
	response::Json,
	routing::{get, post},
	Router,
};
use router_config::ApiConfig;
use router_core::{RouterEngine, RouterError};
use router_types::{current_timestamp, ApiError, ApiResponse, QuoteRequest, QuoteResponse};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the router engine for processing requests.
	pub engine: Arc<RouterEngine>,
}

/// Starts the HTTP server for the API.
///
/// Runs until the process receives Ctrl+C, then shuts down gracefully.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<RouterEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.route("/quote", post(handle_quote))
		.route("/health", get(handle_health))
		.route("/metrics", get(handle_metrics))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Swap router API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!("Failed to install Ctrl+C handler: {}", e);
	}
}

/// Handles POST /quote requests.
///
/// Runs one aggregation round (or serves a cached response) and wraps the
/// result in the standard envelope.
async fn handle_quote(
	State(state): State<AppState>,
	Json(request): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteResponse>>, ApiError> {
	let request_id = request.request_id.clone();
	match state.engine.get_optimal_quote(request).await {
		Ok(response) => {
			let request_id = response.request_id.clone();
			Ok(Json(ApiResponse::ok(request_id, response)))
		}
		Err(e) => {
			tracing::warn!("Quote request failed: {}", e);
			Err(map_router_error(e, request_id))
		}
	}
}

/// Maps an engine error onto the HTTP error envelope. A round where
/// every provider failed still exposes the per-provider quotes so
/// callers can see what went wrong where.
fn map_router_error(err: RouterError, request_id: String) -> ApiError {
	let code = err.code();
	let mut api_error = ApiError::new(code, err.to_string());
	if let RouterError::NoValidQuotes { quotes } = err {
		if let Ok(details) = serde_json::to_value(&quotes) {
			api_error = api_error.with_details(serde_json::json!({ "all_quotes": details }));
		}
	}
	if !request_id.is_empty() {
		api_error = api_error.with_request_id(request_id);
	}
	api_error
}

#[derive(Debug, Deserialize)]
struct HealthQuery {
	/// Include per-provider probe results.
	#[serde(default)]
	providers: bool,
}

/// Handles GET /health requests.
async fn handle_health(
	State(state): State<AppState>,
	Query(query): Query<HealthQuery>,
) -> Json<serde_json::Value> {
	let mut body = serde_json::json!({
		"status": "ok",
		"timestamp": current_timestamp(),
	});

	if query.providers {
		let health = state.engine.provider_health().await;
		body["providers"] = serde_json::to_value(health).unwrap_or_default();
	}

	Json(body)
}

/// Handles GET /metrics requests.
async fn handle_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"router": state.engine.metrics_snapshot(),
		"providers": state.engine.provider_metrics(),
	}))
}
