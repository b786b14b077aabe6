// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle of one ephemeral worker run.
//!
//! ```text
//! Idle -> Created -> Ready -> Dispatched -> CleanedUp
//!    \________\________\__________\______> Failed
//! ```
//!
//! A run pauses, creates a resource, waits for it to become ready, dispatches
//! the long-running command to the resource's own channel and pauses again.
//! Once a resource exists, exactly one `delete` step is scheduled when the
//! body ends, on a context the run's cancellation does not reach. The
//! `create` step runs on such a context too: a create the provider may
//! already have acted on is always waited out, so its resource is known and
//! can be deleted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use burst_config::BurstConfig;
use burst_provisioning::{ProvisionRequest, ProvisionedResource, ResourceStatus};
use burst_substrate::{
	duration_millis, execute_typed, RetryPolicy, RunContext, StepFailure, StepOptions, StepRequest,
	Substrate,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn, Instrument};

use crate::activities::{
	AwaitReadyInput, DeleteInput, AWAIT_READY_ACTIVITY, CREATE_ACTIVITY, DELETE_ACTIVITY,
};
use crate::error::OrchestrationError;
use crate::external::{LongRunningCommandInput, LONG_RUNNING_COMMAND_ACTIVITY};

pub const PRE_WORK_PAUSE_TIMER: &str = "pre-work-pause";
pub const POST_WORK_PAUSE_TIMER: &str = "post-work-pause";
pub const DISPATCH_STEP: &str = "dispatch";

const DEPLOYMENT_FAILED_KIND: &str = "DeploymentFailed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
	Idle,
	Created,
	Ready,
	Dispatched,
	CleanedUp,
	Failed,
}

impl fmt::Display for LifecycleState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			LifecycleState::Idle => "idle",
			LifecycleState::Created => "created",
			LifecycleState::Ready => "ready",
			LifecycleState::Dispatched => "dispatched",
			LifecycleState::CleanedUp => "cleaned_up",
			LifecycleState::Failed => "failed",
		};
		f.write_str(name)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum CleanupOutcome {
	/// No resource was created.
	NotRequired,
	Deleted,
	Failed(OrchestrationError),
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
	pub run_id: String,
	pub resource: Option<ProvisionedResource>,
	/// Every state the run passed through, starting at `Idle`.
	pub transitions: Vec<LifecycleState>,
	pub cleanup: CleanupOutcome,
	/// The first terminal error of the run.
	pub error: Option<OrchestrationError>,
	pub started_at: DateTime<Utc>,
	pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
	fn new(run_id: &str) -> Self {
		Self {
			run_id: run_id.to_string(),
			resource: None,
			transitions: vec![LifecycleState::Idle],
			cleanup: CleanupOutcome::NotRequired,
			error: None,
			started_at: Utc::now(),
			finished_at: None,
		}
	}

	pub fn final_state(&self) -> LifecycleState {
		self.transitions
			.last()
			.copied()
			.unwrap_or(LifecycleState::Idle)
	}

	pub fn cleanup_attempted(&self) -> bool {
		self.cleanup != CleanupOutcome::NotRequired
	}

	pub fn is_success(&self) -> bool {
		self.error.is_none()
	}

	pub fn into_result(self) -> Result<RunReport, OrchestrationError> {
		match self.error.clone() {
			Some(err) => Err(err),
			None => Ok(self),
		}
	}

	fn transition(&mut self, state: LifecycleState) {
		info!(from = %self.final_state(), to = %state, "lifecycle transition");
		self.transitions.push(state);
		if matches!(state, LifecycleState::CleanedUp | LifecycleState::Failed) {
			self.finished_at = Some(Utc::now());
		}
	}

	fn fail(&mut self, err: OrchestrationError) {
		if self.error.is_none() {
			self.error = Some(err);
		}
		self.transition(LifecycleState::Failed);
	}

	fn settle(
		&mut self,
		body: Result<(), OrchestrationError>,
		cleanup: Result<(), OrchestrationError>,
	) {
		self.cleanup = match &cleanup {
			Ok(()) => CleanupOutcome::Deleted,
			Err(err) => CleanupOutcome::Failed(err.clone()),
		};

		match (body, cleanup) {
			(Ok(()), Ok(())) => self.transition(LifecycleState::CleanedUp),
			(Ok(()), Err(cleanup_err)) => self.fail(cleanup_err),
			(Err(body_err), Ok(())) => self.fail(body_err),
			(Err(body_err), Err(cleanup_err)) => {
				error!(
					resource_id = cleanup_err.resource_id().unwrap_or_default(),
					error = %cleanup_err,
					"Cleanup failed after an earlier error"
				);
				self.fail(body_err);
			}
		}
	}
}

/// Timing and supervision of a run.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
	/// Channel serving the provisioning activities.
	pub channel: String,
	pub heartbeat_timeout: Duration,
	pub start_to_close_timeout: Duration,
	pub schedule_to_start_timeout: Option<Duration>,
	pub retry_policy: RetryPolicy,
	/// Pause before creating the resource and after the work completes.
	pub pause: Duration,
	pub work_duration: Duration,
}

impl OrchestratorSettings {
	pub fn from_config(config: &BurstConfig) -> Self {
		let orchestration = &config.orchestration;
		Self {
			channel: config.substrate.default_channel.clone(),
			heartbeat_timeout: orchestration.heartbeat_timeout(),
			start_to_close_timeout: orchestration.start_to_close(),
			schedule_to_start_timeout: orchestration.schedule_to_start(),
			retry_policy: RetryPolicy {
				initial_interval: orchestration.initial_interval(),
				backoff_coefficient: orchestration.backoff_coefficient,
				max_interval: orchestration.max_interval(),
				max_attempts: orchestration.max_attempts,
			},
			pause: orchestration.pause(),
			work_duration: orchestration.work_duration(),
		}
	}

	/// Options for steps that heartbeat while they run.
	pub fn supervised_options(&self) -> StepOptions {
		StepOptions {
			start_to_close_timeout: self.start_to_close_timeout,
			heartbeat_timeout: Some(self.heartbeat_timeout),
			schedule_to_start_timeout: self.schedule_to_start_timeout,
			retry_policy: self.retry_policy.clone(),
		}
	}

	/// Options for single provider calls, which do not heartbeat.
	pub fn call_options(&self) -> StepOptions {
		StepOptions {
			heartbeat_timeout: None,
			..self.supervised_options()
		}
	}
}

impl Default for OrchestratorSettings {
	fn default() -> Self {
		Self::from_config(&BurstConfig::default())
	}
}

pub struct LifecycleOrchestrator {
	substrate: Arc<dyn Substrate>,
	settings: OrchestratorSettings,
}

impl LifecycleOrchestrator {
	pub fn new(substrate: Arc<dyn Substrate>, settings: OrchestratorSettings) -> Self {
		Self {
			substrate,
			settings,
		}
	}

	pub fn settings(&self) -> &OrchestratorSettings {
		&self.settings
	}

	/// Run one orchestration under a fresh run id.
	pub async fn run(&self, request: ProvisionRequest) -> RunReport {
		self.run_with_context(&RunContext::generate(), request).await
	}

	/// Run (or replay) the orchestration identified by `run`.
	///
	/// Steps already completed under `run.run_id` are replayed from the
	/// substrate's journal instead of executing again.
	pub async fn run_with_context(&self, run: &RunContext, request: ProvisionRequest) -> RunReport {
		let span = run.span.clone();
		self.drive(run, &request).instrument(span).await
	}

	async fn drive(&self, run: &RunContext, request: &ProvisionRequest) -> RunReport {
		let mut report = RunReport::new(&run.run_id);
		info!(
			registry = %request.registry,
			repository = %request.repository,
			tag = %request.tag,
			"Trigger external orchestration started"
		);

		if let Err(err) = self.pause(run, PRE_WORK_PAUSE_TIMER).await {
			report.fail(err);
			return report;
		}

		if run.is_cancelled() && self.substrate.recorded(&run.run_id, CREATE_ACTIVITY).is_none() {
			report.fail(OrchestrationError::Cancelled);
			return report;
		}

		let resource = match self.create(run, request).await {
			Ok(resource) => resource,
			Err(err) => {
				error!(error = %err, "Error creating app");
				report.fail(err);
				return report;
			}
		};
		report.resource = Some(resource.clone());
		report.transition(LifecycleState::Created);

		let body = if run.is_cancelled() {
			warn!(resource_id = %resource.id, "Run cancelled while creating app");
			Err(OrchestrationError::Cancelled)
		} else {
			self.use_resource(run, &resource, &mut report).await
		};
		let cleanup = self.release(run, &resource).await;
		report.settle(body, cleanup);

		match &report.error {
			None => info!(resource_id = %resource.id, "Trigger external orchestration finished"),
			Some(err) => error!(resource_id = %resource.id, error = %err, "Trigger external orchestration failed"),
		}
		report
	}

	async fn use_resource(
		&self,
		run: &RunContext,
		resource: &ProvisionedResource,
		report: &mut RunReport,
	) -> Result<(), OrchestrationError> {
		self.ensure_unreleased(run, resource, AWAIT_READY_ACTIVITY)?;
		self.await_ready(run, resource).await?;
		report.transition(LifecycleState::Ready);

		self.ensure_unreleased(run, resource, DISPATCH_STEP)?;
		self.dispatch(run, resource).await?;
		report.transition(LifecycleState::Dispatched);

		self.ensure_unreleased(run, resource, POST_WORK_PAUSE_TIMER)?;
		self.pause(run, POST_WORK_PAUSE_TIMER).await
	}

	/// A resumed run must not execute `step_id` against a resource an earlier
	/// execution of the run already deleted. Recorded steps still replay.
	fn ensure_unreleased(
		&self,
		run: &RunContext,
		resource: &ProvisionedResource,
		step_id: &str,
	) -> Result<(), OrchestrationError> {
		let released = self.substrate.recorded(&run.run_id, step_id).is_none()
			&& self.substrate.recorded(&run.run_id, DELETE_ACTIVITY).is_some();
		if released {
			warn!(resource_id = %resource.id, step_id = %step_id, "App already deleted by an earlier execution");
			return Err(OrchestrationError::Released {
				resource_id: resource.id.clone(),
			});
		}
		Ok(())
	}

	async fn pause(&self, run: &RunContext, timer_id: &str) -> Result<(), OrchestrationError> {
		self.substrate
			.sleep(run, timer_id, self.settings.pause)
			.await
			.map_err(|failure| {
				if failure.is_cancelled() {
					OrchestrationError::Cancelled
				} else {
					OrchestrationError::Substrate(failure)
				}
			})
	}

	/// Create the resource on a context detached from the run's
	/// cancellation. The caller checks for cancellation once it returns.
	async fn create(
		&self,
		run: &RunContext,
		request: &ProvisionRequest,
	) -> Result<ProvisionedResource, OrchestrationError> {
		let step = StepRequest::new(CREATE_ACTIVITY, &self.settings.channel, CREATE_ACTIVITY)
			.input(request)
			.map_err(OrchestrationError::Provision)?
			.options(self.settings.call_options());

		execute_typed(self.substrate.as_ref(), &run.detached(), step)
			.await
			.map_err(OrchestrationError::Provision)
	}

	async fn await_ready(
		&self,
		run: &RunContext,
		resource: &ProvisionedResource,
	) -> Result<(), OrchestrationError> {
		info!(resource_id = %resource.id, "Waiting for app to be ready");
		let input = AwaitReadyInput {
			resource_id: resource.id.clone(),
			heartbeat_timeout_ms: duration_millis(self.settings.heartbeat_timeout),
		};
		let step = StepRequest::new(AWAIT_READY_ACTIVITY, &self.settings.channel, AWAIT_READY_ACTIVITY)
			.input(&input)
			.map_err(OrchestrationError::Readiness)?
			.options(self.settings.supervised_options());

		self.substrate
			.execute(run, step)
			.await
			.map(|_| ())
			.map_err(|failure| readiness_error(&resource.id, failure))
	}

	async fn dispatch(
		&self,
		run: &RunContext,
		resource: &ProvisionedResource,
	) -> Result<(), OrchestrationError> {
		info!(
			resource_id = %resource.id,
			routing_key = %resource.routing_key,
			"Dispatching long-running command"
		);
		let input =
			LongRunningCommandInput::new(self.settings.work_duration, self.settings.heartbeat_timeout);
		let dispatch_error = |failure: StepFailure| {
			if failure.is_cancelled() {
				OrchestrationError::Cancelled
			} else {
				OrchestrationError::Dispatch {
					resource_id: resource.id.clone(),
					source: failure,
				}
			}
		};
		let step = StepRequest::new(DISPATCH_STEP, &resource.routing_key, LONG_RUNNING_COMMAND_ACTIVITY)
			.input(&input)
			.map_err(dispatch_error)?
			.options(self.settings.supervised_options());

		self.substrate
			.execute(run, step)
			.await
			.map(|_| ())
			.map_err(dispatch_error)
	}

	/// Delete `resource` on a context detached from the run's cancellation.
	async fn release(
		&self,
		run: &RunContext,
		resource: &ProvisionedResource,
	) -> Result<(), OrchestrationError> {
		let cleanup_run = run.detached();
		info!(resource_id = %resource.id, "Cleaning up app");

		let deprovision_error = |failure: StepFailure| OrchestrationError::Deprovision {
			resource_id: resource.id.clone(),
			source: failure,
		};
		let input = DeleteInput {
			resource_id: resource.id.clone(),
		};
		let step = StepRequest::new(DELETE_ACTIVITY, &self.settings.channel, DELETE_ACTIVITY)
			.input(&input)
			.map_err(deprovision_error)?
			.options(self.settings.call_options());

		self.substrate
			.execute(&cleanup_run, step)
			.await
			.map(|_| ())
			.map_err(|failure| {
				warn!(resource_id = %resource.id, error = %failure, "Error deleting app");
				deprovision_error(failure)
			})
	}
}

/// A failed deployment arrives as an activity error carrying the phase; it is
/// surfaced as `DeploymentFailed` rather than a generic readiness failure.
fn readiness_error(resource_id: &str, failure: StepFailure) -> OrchestrationError {
	if failure.is_cancelled() {
		return OrchestrationError::Cancelled;
	}

	let phase = failure
		.error
		.activity_error()
		.filter(|e| e.kind == DEPLOYMENT_FAILED_KIND)
		.and_then(|e| e.details.as_ref())
		.and_then(|details| details.get("phase"))
		.and_then(|phase| serde_json::from_value::<ResourceStatus>(phase.clone()).ok());

	match phase {
		Some(phase) => OrchestrationError::DeploymentFailed {
			resource_id: resource_id.to_string(),
			phase,
		},
		None => OrchestrationError::Readiness(failure),
	}
}

/// A run executing in the background.
pub struct RunHandle {
	run: RunContext,
	task: JoinHandle<RunReport>,
}

impl RunHandle {
	pub fn run_id(&self) -> &str {
		&self.run.run_id
	}

	pub fn context(&self) -> &RunContext {
		&self.run
	}

	/// Cancel the run. Cleanup of a created resource still happens.
	pub fn cancel(&self) {
		warn!(run_id = %self.run.run_id, "Cancelling orchestration");
		self.run.cancel();
	}

	pub async fn wait(self) -> Result<RunReport, JoinError> {
		self.task.await
	}
}

/// Start an orchestration on the runtime and return a handle to it.
pub fn start_orchestration(
	orchestrator: Arc<LifecycleOrchestrator>,
	request: ProvisionRequest,
) -> RunHandle {
	let run = RunContext::generate();
	let task_run = run.clone();
	let task = tokio::spawn(async move { orchestrator.run_with_context(&task_run, request).await });
	RunHandle { run, task }
}
