//! Registry trait for self-registering implementations.
//!
//! Pluggable components (cache backends, aggregator adapters) each provide
//! a `Registry` struct implementing this trait, tying their configuration
//! name to a factory function.

/// Base trait for implementation registries.
///
/// The `NAME` constant must match the key used in the TOML configuration,
/// for example "memory" for `cache.implementations.memory` or "oneinch"
/// for `aggregators.providers.oneinch`.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	///
	/// Each module defines its own factory type, for example
	/// `AggregatorFactory` for adapters or `CacheFactory` for cache
	/// backends.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
