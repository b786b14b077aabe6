// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hosting provider configuration section.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secret::SecretString;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfigLayer {
	pub api_url: Option<String>,
	pub token: Option<SecretString>,
	pub instance_size: Option<String>,
	pub component_name: Option<String>,
	pub name_prefix: Option<String>,
	pub request_timeout_secs: Option<u64>,
}

impl ProviderConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.token.is_some() {
			self.token = other.token;
		}
		if other.instance_size.is_some() {
			self.instance_size = other.instance_size;
		}
		if other.component_name.is_some() {
			self.component_name = other.component_name;
		}
		if other.name_prefix.is_some() {
			self.name_prefix = other.name_prefix;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<ProviderConfig, ConfigError> {
		let config = ProviderConfig {
			api_url: self
				.api_url
				.unwrap_or_else(|| "https://api.digitalocean.com".to_string())
				.trim_end_matches('/')
				.to_string(),
			token: self.token.filter(|t| !t.is_empty()),
			instance_size: self.instance_size.unwrap_or_else(|| "basic-xxs".to_string()),
			component_name: self
				.component_name
				.unwrap_or_else(|| "external-worker".to_string()),
			name_prefix: self.name_prefix.unwrap_or_else(|| "external-app".to_string()),
			request_timeout_secs: self.request_timeout_secs.unwrap_or(30),
		};

		if config.api_url.is_empty() {
			return Err(ConfigError::InvalidValue {
				key: "provider.api_url".to_string(),
				message: "must not be empty".to_string(),
			});
		}
		if config.request_timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "provider.request_timeout_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		Ok(config)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
	pub api_url: String,
	/// Absent in simulated runs.
	pub token: Option<SecretString>,
	pub instance_size: String,
	pub component_name: String,
	pub name_prefix: String,
	pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		Self {
			api_url: "https://api.digitalocean.com".to_string(),
			token: None,
			instance_size: "basic-xxs".to_string(),
			component_name: "external-worker".to_string(),
			name_prefix: "external-app".to_string(),
			request_timeout_secs: 30,
		}
	}
}
