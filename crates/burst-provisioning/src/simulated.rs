// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory provider for tests and `--simulate` runs.
//!
//! Every created app walks through a scripted sequence of deployment phases,
//! one per status query, staying on the last one. Calls are recorded and
//! failures can be queued per operation. A boot hook fires the first time an
//! app is observed `Active`, a teardown hook when it is deleted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::ProviderApi;
use crate::error::ProviderError;
use crate::types::{App, AppSpec, EnvVar, ResourceStatus};

/// What a booted simulated app exposes to its hook.
#[derive(Debug, Clone)]
pub struct SimulatedBoot {
	pub app_id: String,
	pub name: String,
	pub envs: Vec<EnvVar>,
}

impl SimulatedBoot {
	pub fn env(&self, key: &str) -> Option<&str> {
		self.envs
			.iter()
			.find(|e| e.key == key)
			.map(|e| e.value.as_str())
	}
}

pub type BootHook = Arc<dyn Fn(&SimulatedBoot) + Send + Sync>;
pub type TeardownHook = Arc<dyn Fn(&SimulatedBoot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOperation {
	Create,
	Get,
	Delete,
}

struct SimulatedApp {
	spec: AppSpec,
	phases: VecDeque<ResourceStatus>,
	current: ResourceStatus,
	booted: bool,
}

impl SimulatedApp {
	fn boot_info(&self, app_id: &str) -> SimulatedBoot {
		SimulatedBoot {
			app_id: app_id.to_string(),
			name: self.spec.name.clone(),
			envs: self.spec.envs.clone(),
		}
	}
}

#[derive(Default)]
struct SimulatedState {
	apps: HashMap<String, SimulatedApp>,
	next_ids: VecDeque<String>,
	issued: u64,
	failures: HashMap<SimulatedOperation, VecDeque<ProviderError>>,
	created: Vec<AppSpec>,
	deleted: Vec<String>,
	status_queries: u32,
}

pub struct SimulatedApi {
	state: Mutex<SimulatedState>,
	phases: Vec<ResourceStatus>,
	create_latency: Duration,
	on_boot: Option<BootHook>,
	on_teardown: Option<TeardownHook>,
}

impl Default for SimulatedApi {
	fn default() -> Self {
		Self::new()
	}
}

impl SimulatedApi {
	/// Apps report `Pending` once, then `Active`.
	pub fn new() -> Self {
		Self {
			state: Mutex::new(SimulatedState::default()),
			phases: vec![ResourceStatus::Pending, ResourceStatus::Active],
			create_latency: Duration::ZERO,
			on_boot: None,
			on_teardown: None,
		}
	}

	/// Phase sequence reported by each created app, one per status query.
	pub fn with_phases(mut self, phases: Vec<ResourceStatus>) -> Self {
		if !phases.is_empty() {
			self.phases = phases;
		}
		self
	}

	/// Delay before a create call answers. The app already exists on the
	/// provider side while the call is outstanding.
	pub fn with_create_latency(mut self, latency: Duration) -> Self {
		self.create_latency = latency;
		self
	}

	/// Ids handed out to created apps in order, before falling back to
	/// generated ones.
	pub fn with_app_ids<I, S>(self, ids: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.lock().next_ids = ids.into_iter().map(Into::into).collect();
		self
	}

	pub fn on_boot(mut self, hook: impl Fn(&SimulatedBoot) + Send + Sync + 'static) -> Self {
		self.on_boot = Some(Arc::new(hook));
		self
	}

	pub fn on_teardown(mut self, hook: impl Fn(&SimulatedBoot) + Send + Sync + 'static) -> Self {
		self.on_teardown = Some(Arc::new(hook));
		self
	}

	/// Queue a failure for the next call of `operation`.
	pub fn fail_next(&self, operation: SimulatedOperation, error: ProviderError) {
		self.lock()
			.failures
			.entry(operation)
			.or_default()
			.push_back(error);
	}

	pub fn created(&self) -> Vec<AppSpec> {
		self.lock().created.clone()
	}

	pub fn deleted(&self) -> Vec<String> {
		self.lock().deleted.clone()
	}

	pub fn status_queries(&self) -> u32 {
		self.lock().status_queries
	}

	pub fn live_apps(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.lock().apps.keys().cloned().collect();
		ids.sort();
		ids
	}

	fn lock(&self) -> MutexGuard<'_, SimulatedState> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn injected_failure(
		state: &mut SimulatedState,
		operation: SimulatedOperation,
	) -> Option<ProviderError> {
		state.failures.get_mut(&operation).and_then(VecDeque::pop_front)
	}
}

#[async_trait]
impl ProviderApi for SimulatedApi {
	async fn create_app(&self, spec: &AppSpec) -> Result<App, ProviderError> {
		let id = {
			let mut state = self.lock();
			if let Some(err) = Self::injected_failure(&mut state, SimulatedOperation::Create) {
				return Err(err);
			}

			state.issued += 1;
			let issued = state.issued;
			let id = state
				.next_ids
				.pop_front()
				.unwrap_or_else(|| format!("sim-app-{issued}"));

			state.created.push(spec.clone());
			state.apps.insert(
				id.clone(),
				SimulatedApp {
					spec: spec.clone(),
					phases: self.phases.iter().copied().collect(),
					current: ResourceStatus::Pending,
					booted: false,
				},
			);
			id
		};
		debug!(app_id = %id, name = %spec.name, "simulated app created");

		if !self.create_latency.is_zero() {
			tokio::time::sleep(self.create_latency).await;
		}

		Ok(App {
			id,
			name: spec.name.clone(),
			active_deployment_phase: None,
		})
	}

	async fn get_app(&self, id: &str) -> Result<App, ProviderError> {
		let (app, boot) = {
			let mut state = self.lock();
			state.status_queries += 1;
			if let Some(err) = Self::injected_failure(&mut state, SimulatedOperation::Get) {
				return Err(err);
			}

			let sim = state
				.apps
				.get_mut(id)
				.ok_or_else(|| ProviderError::NotFound { id: id.to_string() })?;

			if let Some(next) = sim.phases.pop_front() {
				sim.current = next;
			}

			let boot = if sim.current == ResourceStatus::Active && !sim.booted {
				sim.booted = true;
				Some(sim.boot_info(id))
			} else {
				None
			};

			let app = App {
				id: id.to_string(),
				name: sim.spec.name.clone(),
				active_deployment_phase: match sim.current {
					ResourceStatus::Pending => None,
					other => Some(other.as_phase().to_string()),
				},
			};
			(app, boot)
		};

		if let (Some(boot), Some(hook)) = (boot, &self.on_boot) {
			debug!(app_id = %boot.app_id, name = %boot.name, "simulated app booted");
			hook(&boot);
		}

		Ok(app)
	}

	async fn delete_app(&self, id: &str) -> Result<(), ProviderError> {
		let removed = {
			let mut state = self.lock();
			state.deleted.push(id.to_string());
			if let Some(err) = Self::injected_failure(&mut state, SimulatedOperation::Delete) {
				return Err(err);
			}
			state
				.apps
				.remove(id)
				.ok_or_else(|| ProviderError::NotFound { id: id.to_string() })?
		};

		debug!(app_id = %id, "simulated app deleted");
		if let Some(hook) = &self.on_teardown {
			hook(&removed.boot_info(id));
		}
		Ok(())
	}
}
