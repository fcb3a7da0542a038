//! Main entry point for the swap router service.
//!
//! This binary wires the pluggable pieces together: it loads the TOML
//! configuration, builds the cache backend and one adapter per active
//! aggregator through their factory registries, starts the periodic
//! cache sweep, and serves the HTTP API until interrupted.

use clap::Parser;
use router_config::{Config, ConfigLoader};
use router_core::RouterEngine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod server;

/// Command-line arguments for the router service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the router service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file (with includes)
/// 4. Builds the router engine with all implementations
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started swap router");

	// Load configuration
	let base_path = args
		.config
		.parent()
		.filter(|p| !p.as_os_str().is_empty())
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from("."));
	let mut loader = ConfigLoader::new(base_path);
	let config = loader.load_config(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.router.id);

	// Build router engine with implementations
	let engine = Arc::new(build_engine(&config)?);
	tracing::info!("Loaded router engine");

	// Periodically drop expired cache entries.
	let sweep_cache = Arc::clone(engine.cache());
	let sweep_interval = config.cache.cleanup_interval_seconds;
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval));
		loop {
			interval.tick().await;
			match sweep_cache.purge_expired().await {
				Ok(count) if count > 0 => {
					tracing::debug!("Cache sweep: removed {} expired entries", count);
				}
				Err(e) => {
					tracing::warn!("Cache sweep failed: {}", e);
				}
				_ => {} // Nothing expired
			}
		}
	});

	let api_config = config.api.clone().unwrap_or_default();
	if !api_config.enabled {
		tracing::warn!("API server disabled by configuration, exiting");
		return Ok(());
	}

	server::start_server(api_config, engine).await?;

	tracing::info!("Stopped swap router");
	Ok(())
}

/// Builds the router engine from configuration.
///
/// Each aggregator factory receives its own copy of the provider block,
/// validated by the implementation's schema; a provider that fails to
/// build or validate is skipped so one bad entry cannot take the whole
/// service down.
fn build_engine(config: &Config) -> Result<RouterEngine, Box<dyn std::error::Error>> {
	// Create cache backend
	let cache_factories: HashMap<&str, router_cache::CacheFactory> =
		router_cache::get_all_implementations().into_iter().collect();
	let cache_factory = cache_factories
		.get(config.cache.backend.as_str())
		.ok_or_else(|| format!("Unknown cache backend '{}'", config.cache.backend))?;
	let backend_config = config
		.cache
		.implementations
		.get(&config.cache.backend)
		.cloned()
		.unwrap_or_else(|| toml::Value::Table(Default::default()));
	let backend = cache_factory(&backend_config).map_err(|e| {
		tracing::error!(
			component = "cache",
			implementation = %config.cache.backend,
			error = %e,
			"Failed to create cache backend"
		);
		format!(
			"Failed to create cache backend '{}': {}",
			config.cache.backend, e
		)
	})?;
	backend
		.config_schema()
		.validate(&backend_config)
		.map_err(|e| format!("Invalid cache configuration: {}", e))?;
	let cache = router_cache::QuoteCacheService::new(
		backend,
		Duration::from_secs(config.cache.default_ttl_seconds),
		config.cache.prefix_key.clone(),
	);
	tracing::info!(component = "cache", implementation = %config.cache.backend, "Loaded");

	// Create aggregator adapters
	let aggregator_factories: HashMap<&str, router_aggregators::AggregatorFactory> =
		router_aggregators::get_all_implementations()
			.into_iter()
			.collect();

	let mut adapters: Vec<Arc<dyn router_aggregators::AggregatorInterface>> = Vec::new();
	for (name, block) in config.provider_blocks() {
		let Some(factory) = aggregator_factories.get(name.as_str()) else {
			tracing::error!(
				component = "aggregator",
				implementation = %name,
				"No adapter registered for provider, skipping"
			);
			continue;
		};

		match factory(&block) {
			Ok(adapter) => match adapter.config_schema().validate(&block) {
				Ok(_) => {
					tracing::info!(
						component = "aggregator",
						implementation = %name,
						api_key = %Config::masked_api_key(&block),
						"Loaded"
					);
					adapters.push(Arc::from(adapter));
				}
				Err(e) => {
					tracing::error!(
						component = "aggregator",
						implementation = %name,
						error = %e,
						"Invalid configuration for aggregator, skipping"
					);
				}
			},
			Err(e) => {
				tracing::error!(
					component = "aggregator",
					implementation = %name,
					error = %e,
					"Failed to create aggregator, skipping"
				);
			}
		}
	}

	if adapters.is_empty() {
		tracing::warn!("No aggregators available - every quote request will fail");
	}
	adapters.sort_by_key(|adapter| adapter.current_config().priority);

	Ok(RouterEngine::new(adapters, Arc::new(cache)))
}
