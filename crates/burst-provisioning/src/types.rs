// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Container image to run on the ephemeral worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionRequest {
	pub registry: String,
	pub repository: String,
	pub tag: String,
}

impl ProvisionRequest {
	pub fn new(
		registry: impl Into<String>,
		repository: impl Into<String>,
		tag: impl Into<String>,
	) -> Self {
		Self {
			registry: registry.into(),
			repository: repository.into(),
			tag: tag.into(),
		}
	}
}

/// Deployment status of a provisioned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
	Pending,
	Active,
	Error,
	Canceled,
	Superseded,
}

impl ResourceStatus {
	/// Map a provider deployment phase. Unknown and in-progress phases, and a
	/// missing deployment, are `Pending`.
	pub fn from_phase(phase: Option<&str>) -> Self {
		match phase.map(|p| p.to_ascii_uppercase()).as_deref() {
			Some("ACTIVE") => ResourceStatus::Active,
			Some("ERROR") => ResourceStatus::Error,
			Some("CANCELED") => ResourceStatus::Canceled,
			Some("SUPERSEDED") => ResourceStatus::Superseded,
			_ => ResourceStatus::Pending,
		}
	}

	/// Provider phase string for this status.
	pub fn as_phase(&self) -> &'static str {
		match self {
			ResourceStatus::Pending => "PENDING_DEPLOY",
			ResourceStatus::Active => "ACTIVE",
			ResourceStatus::Error => "ERROR",
			ResourceStatus::Canceled => "CANCELED",
			ResourceStatus::Superseded => "SUPERSEDED",
		}
	}

	/// Terminal phases that will never become `Active`.
	pub fn is_failed(&self) -> bool {
		matches!(
			self,
			ResourceStatus::Error | ResourceStatus::Canceled | ResourceStatus::Superseded
		)
	}
}

impl fmt::Display for ResourceStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ResourceStatus::Pending => "Pending",
			ResourceStatus::Active => "Active",
			ResourceStatus::Error => "Error",
			ResourceStatus::Canceled => "Canceled",
			ResourceStatus::Superseded => "Superseded",
		};
		f.write_str(s)
	}
}

/// A hosted app created for one orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedResource {
	pub id: String,
	/// Channel the app's worker serves. Also the app's name.
	pub routing_key: String,
	pub status: ResourceStatus,
}

/// Hosted app definition: a single worker component running one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
	pub name: String,
	pub component_name: String,
	pub instance_size: String,
	pub instance_count: u32,
	pub image: ImageSpec,
	pub envs: Vec<EnvVar>,
}

impl AppSpec {
	pub fn env(&self, key: &str) -> Option<&str> {
		self.envs
			.iter()
			.find(|e| e.key == key)
			.map(|e| e.value.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
	pub registry_type: String,
	pub registry: String,
	pub repository: String,
	pub tag: String,
}

/// Runtime environment variable. Values may carry credentials, so `Debug`
/// prints only the key.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvVar {
	pub key: String,
	pub value: String,
}

impl EnvVar {
	pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			value: value.into(),
		}
	}
}

impl fmt::Debug for EnvVar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EnvVar")
			.field("key", &self.key)
			.field("value", &burst_config::REDACTED)
			.finish()
	}
}

/// Provider view of an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App {
	pub id: String,
	pub name: String,
	/// Phase of the active deployment, if there is one.
	pub active_deployment_phase: Option<String>,
}

impl App {
	pub fn status(&self) -> ResourceStatus {
		ResourceStatus::from_phase(self.active_deployment_phase.as_deref())
	}
}
