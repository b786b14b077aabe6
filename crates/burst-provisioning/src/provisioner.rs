// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use burst_config::{BurstConfig, ProviderConfig, SubstrateConfig};
use rand::Rng;
use tracing::{info, instrument, warn};

use crate::api::ProviderApi;
use crate::error::ProvisionerError;
use crate::types::{AppSpec, EnvVar, ImageSpec, ProvisionRequest, ProvisionedResource, ResourceStatus};

/// Env var telling the ephemeral worker which channel to serve.
pub const EXTERNAL_TASK_QUEUE_ENV: &str = "EXTERNAL_TASK_QUEUE";

const ROUTING_SUFFIX_MIN: u32 = 100_000;
const ROUTING_SUFFIX_MAX: u32 = 999_999;
const MAX_ROUTING_KEY_DRAWS: usize = 64;

/// App shape and forwarded environment for created resources.
#[derive(Debug, Clone)]
pub struct ProvisionerSettings {
	pub name_prefix: String,
	pub component_name: String,
	pub instance_size: String,
	/// Substrate connection parameters handed to every created worker.
	pub connection_env: Vec<EnvVar>,
}

impl ProvisionerSettings {
	pub fn new(provider: &ProviderConfig, substrate: &SubstrateConfig) -> Self {
		Self {
			name_prefix: provider.name_prefix.clone(),
			component_name: provider.component_name.clone(),
			instance_size: provider.instance_size.clone(),
			connection_env: substrate
				.connection_env()
				.into_iter()
				.map(|(key, value)| EnvVar::new(key, value))
				.collect(),
		}
	}
}

impl Default for ProvisionerSettings {
	fn default() -> Self {
		Self::new(&ProviderConfig::default(), &SubstrateConfig::default())
	}
}

#[derive(Default)]
struct InFlight {
	keys: HashSet<String>,
	by_id: HashMap<String, String>,
}

/// Creates, inspects and deletes ephemeral worker apps.
///
/// Routing keys of live resources are tracked so concurrent runs in this
/// process never share one.
pub struct Provisioner {
	api: Arc<dyn ProviderApi>,
	settings: ProvisionerSettings,
	in_flight: Mutex<InFlight>,
}

impl Provisioner {
	pub fn new(api: Arc<dyn ProviderApi>, settings: ProvisionerSettings) -> Self {
		Self {
			api,
			settings,
			in_flight: Mutex::new(InFlight::default()),
		}
	}

	pub fn from_config(api: Arc<dyn ProviderApi>, config: &BurstConfig) -> Self {
		Self::new(api, ProvisionerSettings::new(&config.provider, &config.substrate))
	}

	pub fn settings(&self) -> &ProvisionerSettings {
		&self.settings
	}

	fn in_flight(&self) -> MutexGuard<'_, InFlight> {
		self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Reserve a fresh `<prefix>-<6 digits>` routing key.
	pub fn generate_routing_key(&self) -> String {
		let mut rng = rand::thread_rng();
		self.reserve_routing_key(|| rng.gen_range(ROUTING_SUFFIX_MIN..=ROUTING_SUFFIX_MAX))
	}

	fn reserve_routing_key(&self, mut next_suffix: impl FnMut() -> u32) -> String {
		let mut in_flight = self.in_flight();
		let mut key = format!("{}-{}", self.settings.name_prefix, next_suffix());
		for _ in 1..MAX_ROUTING_KEY_DRAWS {
			if !in_flight.keys.contains(&key) {
				break;
			}
			key = format!("{}-{}", self.settings.name_prefix, next_suffix());
		}
		if !in_flight.keys.insert(key.clone()) {
			warn!(routing_key = %key, "routing key already in flight, reusing");
		}
		key
	}

	fn release(&self, routing_key: &str) {
		self.in_flight().keys.remove(routing_key);
	}

	/// Routing keys currently reserved by this provisioner.
	pub fn in_flight_keys(&self) -> Vec<String> {
		let mut keys: Vec<String> = self.in_flight().keys.iter().cloned().collect();
		keys.sort();
		keys
	}

	/// App spec for `request`, named and routed by `routing_key`.
	pub fn build_app_spec(&self, request: &ProvisionRequest, routing_key: &str) -> AppSpec {
		let mut envs = vec![EnvVar::new(EXTERNAL_TASK_QUEUE_ENV, routing_key)];
		envs.extend(
			self.settings
				.connection_env
				.iter()
				.filter(|env| !env.value.is_empty())
				.cloned(),
		);

		AppSpec {
			name: routing_key.to_string(),
			component_name: self.settings.component_name.clone(),
			instance_size: self.settings.instance_size.clone(),
			instance_count: 1,
			image: ImageSpec {
				registry_type: "DOCR".to_string(),
				registry: request.registry.clone(),
				repository: request.repository.clone(),
				tag: request.tag.clone(),
			},
			envs,
		}
	}

	#[instrument(skip(self), fields(registry = %request.registry, repository = %request.repository, tag = %request.tag))]
	pub async fn create(
		&self,
		request: &ProvisionRequest,
	) -> Result<ProvisionedResource, ProvisionerError> {
		let routing_key = self.generate_routing_key();
		let spec = self.build_app_spec(request, &routing_key);
		info!(routing_key = %routing_key, "Building app");

		match self.api.create_app(&spec).await {
			Ok(app) => {
				self.in_flight()
					.by_id
					.insert(app.id.clone(), routing_key.clone());
				info!(resource_id = %app.id, routing_key = %routing_key, "App created");
				Ok(ProvisionedResource {
					id: app.id,
					routing_key,
					status: ResourceStatus::Pending,
				})
			}
			Err(source) => {
				self.release(&routing_key);
				warn!(routing_key = %routing_key, error = %source, "Error creating app");
				Err(ProvisionerError::Provision { source })
			}
		}
	}

	#[instrument(skip(self))]
	pub async fn delete(&self, id: &str) -> Result<(), ProvisionerError> {
		info!(resource_id = %id, "Deleting app");
		self.api
			.delete_app(id)
			.await
			.map_err(|source| {
				warn!(resource_id = %id, error = %source, "Error deleting app");
				ProvisionerError::Deprovision {
					id: id.to_string(),
					source,
				}
			})?;

		let routing_key = self.in_flight().by_id.remove(id);
		if let Some(key) = routing_key {
			self.release(&key);
		}
		Ok(())
	}

	pub async fn get_status(&self, id: &str) -> Result<ResourceStatus, ProvisionerError> {
		let app = self
			.api
			.get_app(id)
			.await
			.map_err(|source| ProvisionerError::StatusQuery {
				id: id.to_string(),
				source,
			})?;
		Ok(app.status())
	}
}
