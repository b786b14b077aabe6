// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for burst.
//!
//! Configuration is assembled from built-in defaults, an optional TOML file
//! and `BURST_*` environment variables, in that order of precedence. Each
//! source yields a [`BurstConfigLayer`] of optional fields. The layers are
//! merged and then finalized into a fully resolved [`BurstConfig`].
//!
//! ```ignore
//! use burst_config::load_config;
//!
//! let config = load_config()?;
//! println!("heartbeat timeout: {:?}", config.orchestration.heartbeat_timeout());
//! ```

pub mod error;
pub mod layer;
pub mod secret;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::BurstConfigLayer;
pub use secret::{Secret, SecretString, REDACTED};
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BurstConfig {
	pub logging: LoggingConfig,
	pub substrate: SubstrateConfig,
	pub provider: ProviderConfig,
	pub orchestration: OrchestrationConfig,
}

/// Load configuration from the defaults, `/etc/burst/burst.toml` and the
/// process environment.
pub fn load_config() -> Result<BurstConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::process()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<BurstConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::process()),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<BurstConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = BurstConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved config.
pub fn finalize(layer: BurstConfigLayer) -> Result<BurstConfig, ConfigError> {
	let logging = layer.logging.unwrap_or_default().finalize();
	let substrate = layer.substrate.unwrap_or_default().finalize();
	let provider = layer.provider.unwrap_or_default().finalize()?;
	let orchestration = layer.orchestration.unwrap_or_default().finalize()?;

	info!(
		log_level = %logging.level,
		default_channel = %substrate.default_channel,
		provider_api = %provider.api_url,
		provider_token_configured = provider.token.is_some(),
		heartbeat_timeout_secs = orchestration.heartbeat_timeout_secs,
		max_attempts = orchestration.max_attempts,
		"Configuration loaded"
	);

	Ok(BurstConfig {
		logging,
		substrate,
		provider,
		orchestration,
	})
}
