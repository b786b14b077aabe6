// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Substrate configuration section.
//!
//! Holds the channel the orchestrator's own worker listens on and the
//! connection parameters an ephemeral worker needs to reach the substrate.
//! The connection parameters are forwarded verbatim into the hosted app's
//! environment under the same variable names they are read from.

use serde::{Deserialize, Serialize};

use crate::secret::SecretString;

pub const DEFAULT_CHANNEL: &str = "burst-orchestrator";

pub const ADDRESS_ENV: &str = "BURST_SUBSTRATE_ADDRESS";
pub const NAMESPACE_ENV: &str = "BURST_SUBSTRATE_NAMESPACE";
pub const API_KEY_ENV: &str = "BURST_SUBSTRATE_API_KEY";
pub const TLS_CERT_PATH_ENV: &str = "BURST_SUBSTRATE_TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "BURST_SUBSTRATE_TLS_KEY_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubstrateConfigLayer {
	pub default_channel: Option<String>,
	pub address: Option<String>,
	pub namespace: Option<String>,
	pub api_key: Option<SecretString>,
	pub tls_cert_path: Option<String>,
	pub tls_key_path: Option<String>,
}

impl SubstrateConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.default_channel.is_some() {
			self.default_channel = other.default_channel;
		}
		if other.address.is_some() {
			self.address = other.address;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.api_key.is_some() {
			self.api_key = other.api_key;
		}
		if other.tls_cert_path.is_some() {
			self.tls_cert_path = other.tls_cert_path;
		}
		if other.tls_key_path.is_some() {
			self.tls_key_path = other.tls_key_path;
		}
	}

	pub fn finalize(self) -> SubstrateConfig {
		SubstrateConfig {
			default_channel: self
				.default_channel
				.filter(|c| !c.is_empty())
				.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
			address: self.address,
			namespace: self.namespace,
			api_key: self.api_key,
			tls_cert_path: self.tls_cert_path,
			tls_key_path: self.tls_key_path,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubstrateConfig {
	pub default_channel: String,
	pub address: Option<String>,
	pub namespace: Option<String>,
	pub api_key: Option<SecretString>,
	pub tls_cert_path: Option<String>,
	pub tls_key_path: Option<String>,
}

impl Default for SubstrateConfig {
	fn default() -> Self {
		SubstrateConfigLayer::default().finalize()
	}
}

impl SubstrateConfig {
	/// Connection parameters to hand to an ephemeral worker, skipping unset
	/// and empty values.
	pub fn connection_env(&self) -> Vec<(String, String)> {
		let api_key = self.api_key.as_ref().map(|k| k.expose().clone());
		[
			(ADDRESS_ENV, self.address.clone()),
			(NAMESPACE_ENV, self.namespace.clone()),
			(API_KEY_ENV, api_key),
			(TLS_CERT_PATH_ENV, self.tls_cert_path.clone()),
			(TLS_KEY_PATH_ENV, self.tls_key_path.clone()),
		]
		.into_iter()
		.filter_map(|(key, value)| match value {
			Some(v) if !v.is_empty() => Some((key.to_string(), v)),
			_ => None,
		})
		.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::secret::Secret;

	#[test]
	fn test_default_channel() {
		let config = SubstrateConfig::default();
		assert_eq!(config.default_channel, DEFAULT_CHANNEL);
		assert!(config.connection_env().is_empty());
	}

	#[test]
	fn test_empty_channel_falls_back_to_default() {
		let config = SubstrateConfigLayer {
			default_channel: Some(String::new()),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.default_channel, DEFAULT_CHANNEL);
	}

	#[test]
	fn test_connection_env_skips_empty_values() {
		let config = SubstrateConfigLayer {
			address: Some("substrate.internal:7233".to_string()),
			namespace: Some(String::new()),
			api_key: Some(Secret::new("key-123".to_string())),
			..Default::default()
		}
		.finalize();

		let env = config.connection_env();
		assert_eq!(
			env,
			vec![
				(ADDRESS_ENV.to_string(), "substrate.internal:7233".to_string()),
				(API_KEY_ENV.to_string(), "key-123".to_string()),
			]
		);
	}

	#[test]
	fn test_api_key_not_in_debug_output() {
		let config = SubstrateConfigLayer {
			api_key: Some(Secret::new("key-123".to_string())),
			..Default::default()
		}
		.finalize();
		assert!(!format!("{config:?}").contains("key-123"));
	}
}
