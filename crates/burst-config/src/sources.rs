// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::BurstConfigLayer;
use crate::secret::{Secret, SecretString};
use crate::sections::{
	substrate, LogFormat, LoggingConfigLayer, OrchestrationConfigLayer, ProviderConfigLayer,
	SubstrateConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<BurstConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<BurstConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(BurstConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/burst/burst.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<BurstConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(BurstConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: BurstConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `BURST_<SECTION>_<FIELD>`. Secrets additionally accept
/// `<NAME>_FILE` pointing at a file holding the value.
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn process() -> Self {
		Self { vars: None }
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn u32(&self, name: &str) -> Result<Option<u32>, ConfigError> {
		self.parsed(name, "u32")
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		self.parsed(name, "u64")
	}

	fn f64(&self, name: &str) -> Result<Option<f64>, ConfigError> {
		self.parsed(name, "f64")
	}

	/// `NAME` wins over `NAME_FILE`. File contents are trimmed.
	fn secret(&self, name: &str) -> Result<Option<SecretString>, ConfigError> {
		if let Some(value) = self.var(name) {
			return Ok(Some(Secret::new(value)));
		}

		let file_var = format!("{name}_FILE");
		let Some(path) = self.var(&file_var) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&path).map_err(|e| {
			ConfigError::Secret(format!("failed to read {file_var} ({path}): {e}"))
		})?;
		let value = content.trim().to_string();
		if value.is_empty() {
			return Ok(None);
		}
		Ok(Some(Secret::new(value)))
	}

	fn logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		Ok(LoggingConfigLayer {
			level: self.var("BURST_LOG_LEVEL"),
			format: self
				.var("BURST_LOG_FORMAT")
				.map(|v| v.parse::<LogFormat>())
				.transpose()?,
		})
	}

	fn substrate(&self) -> Result<SubstrateConfigLayer, ConfigError> {
		Ok(SubstrateConfigLayer {
			default_channel: self.var("BURST_DEFAULT_CHANNEL"),
			address: self.var(substrate::ADDRESS_ENV),
			namespace: self.var(substrate::NAMESPACE_ENV),
			api_key: self.secret(substrate::API_KEY_ENV)?,
			tls_cert_path: self.var(substrate::TLS_CERT_PATH_ENV),
			tls_key_path: self.var(substrate::TLS_KEY_PATH_ENV),
		})
	}

	fn provider(&self) -> Result<ProviderConfigLayer, ConfigError> {
		Ok(ProviderConfigLayer {
			api_url: self.var("BURST_PROVIDER_API_URL"),
			token: self.secret("BURST_PROVIDER_TOKEN")?,
			instance_size: self.var("BURST_PROVIDER_INSTANCE_SIZE"),
			component_name: self.var("BURST_PROVIDER_COMPONENT_NAME"),
			name_prefix: self.var("BURST_PROVIDER_NAME_PREFIX"),
			request_timeout_secs: self.u64("BURST_PROVIDER_REQUEST_TIMEOUT_SECS")?,
		})
	}

	fn orchestration(&self) -> Result<OrchestrationConfigLayer, ConfigError> {
		Ok(OrchestrationConfigLayer {
			heartbeat_timeout_secs: self.u64("BURST_HEARTBEAT_TIMEOUT_SECS")?,
			start_to_close_secs: self.u64("BURST_START_TO_CLOSE_SECS")?,
			schedule_to_start_secs: self.u64("BURST_SCHEDULE_TO_START_SECS")?,
			poll_interval_secs: self.u64("BURST_POLL_INTERVAL_SECS")?,
			pause_secs: self.u64("BURST_PAUSE_SECS")?,
			work_duration_secs: self.u64("BURST_WORK_DURATION_SECS")?,
			initial_interval_ms: self.u64("BURST_RETRY_INITIAL_INTERVAL_MS")?,
			backoff_coefficient: self.f64("BURST_RETRY_BACKOFF_COEFFICIENT")?,
			max_interval_secs: self.u64("BURST_RETRY_MAX_INTERVAL_SECS")?,
			max_attempts: self.u32("BURST_RETRY_MAX_ATTEMPTS")?,
		})
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<BurstConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(BurstConfigLayer {
			logging: Some(self.logging()?),
			substrate: Some(self.substrate()?),
			provider: Some(self.provider()?),
			orchestration: Some(self.orchestration()?),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Defaults < Precedence::ConfigFile);
		assert!(Precedence::ConfigFile < Precedence::Environment);
	}

	#[test]
	fn test_missing_toml_file_is_empty_layer() {
		let source = TomlSource::new("/nonexistent/burst.toml");
		assert_eq!(source.load().unwrap(), BurstConfigLayer::default());
	}

	#[test]
	fn test_invalid_toml_reports_path() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[orchestration\nheartbeat_timeout_secs = ").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { ref path, .. } if path == file.path()));
	}

	#[test]
	fn test_env_parses_numbers() {
		let source = EnvSource::from_vars([
			("BURST_HEARTBEAT_TIMEOUT_SECS", "20"),
			("BURST_RETRY_BACKOFF_COEFFICIENT", "1.5"),
			("BURST_RETRY_MAX_ATTEMPTS", "3"),
		]);
		let layer = source.load().unwrap().orchestration.unwrap();
		assert_eq!(layer.heartbeat_timeout_secs, Some(20));
		assert_eq!(layer.backoff_coefficient, Some(1.5));
		assert_eq!(layer.max_attempts, Some(3));
		assert_eq!(layer.pause_secs, None);
	}

	#[test]
	fn test_env_invalid_number_names_variable() {
		let source = EnvSource::from_vars([("BURST_POLL_INTERVAL_SECS", "soon")]);
		let err = source.load().unwrap_err();
		assert!(
			matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BURST_POLL_INTERVAL_SECS")
		);
	}

	#[test]
	fn test_env_empty_values_are_unset() {
		let source = EnvSource::from_vars([("BURST_DEFAULT_CHANNEL", ""), ("BURST_LOG_LEVEL", "")]);
		let layer = source.load().unwrap();
		assert!(layer.substrate.unwrap().default_channel.is_none());
		assert!(layer.logging.unwrap().level.is_none());
	}

	#[test]
	fn test_secret_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "dop_v1_from_file").unwrap();
		let path = file.path().to_string_lossy().to_string();

		let source = EnvSource::from_vars([("BURST_PROVIDER_TOKEN_FILE", path)]);
		let provider = source.load().unwrap().provider.unwrap();
		assert_eq!(provider.token.unwrap().expose(), "dop_v1_from_file");
	}

	#[test]
	fn test_secret_direct_value_wins_over_file() {
		let source = EnvSource::from_vars([
			("BURST_PROVIDER_TOKEN", "direct"),
			("BURST_PROVIDER_TOKEN_FILE", "/nonexistent/token"),
		]);
		let provider = source.load().unwrap().provider.unwrap();
		assert_eq!(provider.token.unwrap().expose(), "direct");
	}

	#[test]
	fn test_secret_missing_file_is_error() {
		let source = EnvSource::from_vars([("BURST_SUBSTRATE_API_KEY_FILE", "/nonexistent/key")]);
		assert!(matches!(source.load(), Err(ConfigError::Secret(_))));
	}
}
