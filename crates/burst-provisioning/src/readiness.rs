// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Polls a provisioned resource until its deployment settles.

use std::sync::Arc;
use std::time::Duration;

use burst_substrate::{start_heartbeat, StepContext};
use tracing::{debug, error, info, instrument};

use crate::error::ProvisionerError;
use crate::provisioner::Provisioner;
use crate::types::ResourceStatus;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct ReadinessPoller {
	provisioner: Arc<Provisioner>,
	poll_interval: Duration,
}

impl ReadinessPoller {
	pub fn new(provisioner: Arc<Provisioner>, poll_interval: Duration) -> Self {
		Self {
			provisioner,
			poll_interval,
		}
	}

	/// Wait until `resource_id` is `Active`.
	///
	/// Heartbeats on `ctx` every `heartbeat_timeout / 2` while polling. A
	/// failed terminal phase ends the wait with `DeploymentFailed`. There is
	/// no attempt cap: the caller's heartbeat supervision and cancellation
	/// bound the wait. The ticker is stopped before returning.
	#[instrument(skip(self, ctx), fields(run_id = %ctx.run_id))]
	pub async fn await_ready(
		&self,
		ctx: &StepContext,
		resource_id: &str,
		heartbeat_timeout: Duration,
	) -> Result<(), ProvisionerError> {
		let mut ticker = start_heartbeat(ctx, heartbeat_timeout / 2);
		let result = self.poll(ticker.context(), resource_id).await;
		ticker.stop();
		result
	}

	async fn poll(&self, ctx: &StepContext, resource_id: &str) -> Result<(), ProvisionerError> {
		loop {
			let status = tokio::select! {
				biased;
				_ = ctx.cancelled() => return Err(ProvisionerError::Cancelled),
				status = self.provisioner.get_status(resource_id) => status?,
			};

			match status {
				ResourceStatus::Active => {
					info!(resource_id = %resource_id, "App is built");
					return Ok(());
				}
				phase if phase.is_failed() => {
					error!(resource_id = %resource_id, phase = %phase, "Deployment failed");
					return Err(ProvisionerError::DeploymentFailed {
						id: resource_id.to_string(),
						phase,
					});
				}
				_ => debug!(resource_id = %resource_id, status = %status, "App not ready yet"),
			}

			tokio::select! {
				biased;
				_ = ctx.cancelled() => return Err(ProvisionerError::Cancelled),
				_ = tokio::time::sleep(self.poll_interval) => {}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provisioner::ProvisionerSettings;
	use crate::simulated::SimulatedApi;
	use crate::types::ProvisionRequest;
	use tokio::time::Instant;

	async fn setup(phases: Vec<ResourceStatus>) -> (Arc<SimulatedApi>, ReadinessPoller, String) {
		let api = Arc::new(SimulatedApi::new().with_phases(phases));
		let provisioner = Arc::new(Provisioner::new(
			Arc::clone(&api) as Arc<dyn crate::ProviderApi>,
			ProvisionerSettings::default(),
		));
		let resource = provisioner
			.create(&ProvisionRequest::new("r", "app", "v1"))
			.await
			.unwrap();
		(api, ReadinessPoller::new(provisioner, DEFAULT_POLL_INTERVAL), resource.id)
	}

	/// Purpose: `[Pending, Pending, Active]` succeeds after exactly two poll
	/// sleeps.
	#[tokio::test(start_paused = true)]
	async fn test_ready_after_two_sleeps() {
		let (api, poller, id) = setup(vec![
			ResourceStatus::Pending,
			ResourceStatus::Pending,
			ResourceStatus::Active,
		])
		.await;
		let ctx = StepContext::standalone("run-1", "await-ready");

		let start = Instant::now();
		poller
			.await_ready(&ctx, &id, Duration::from_secs(10))
			.await
			.unwrap();

		assert_eq!(start.elapsed(), Duration::from_secs(10));
		assert_eq!(api.status_queries(), 3);
	}

	/// Purpose: `[Pending, Error]` fails with phase `Error` after one sleep.
	#[tokio::test(start_paused = true)]
	async fn test_error_phase_fails_after_one_sleep() {
		let (api, poller, id) = setup(vec![ResourceStatus::Pending, ResourceStatus::Error]).await;
		let ctx = StepContext::standalone("run-1", "await-ready");

		let start = Instant::now();
		let err = poller
			.await_ready(&ctx, &id, Duration::from_secs(10))
			.await
			.unwrap_err();

		assert_eq!(start.elapsed(), Duration::from_secs(5));
		assert_eq!(api.status_queries(), 2);
		assert!(matches!(
			err,
			ProvisionerError::DeploymentFailed {
				phase: ResourceStatus::Error,
				..
			}
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_canceled_and_superseded_are_failures() {
		for phase in [ResourceStatus::Canceled, ResourceStatus::Superseded] {
			let (_, poller, id) = setup(vec![phase]).await;
			let ctx = StepContext::standalone("run-1", "await-ready");
			let err = poller
				.await_ready(&ctx, &id, Duration::from_secs(10))
				.await
				.unwrap_err();
			assert!(matches!(err, ProvisionerError::DeploymentFailed { phase: p, .. } if p == phase));
		}
	}

	/// Purpose: heartbeats are emitted while polling and stop once
	/// `await_ready` returns.
	#[tokio::test(start_paused = true)]
	async fn test_heartbeats_while_polling_and_not_after() {
		let mut phases = vec![ResourceStatus::Pending; 6];
		phases.push(ResourceStatus::Active);
		let (_, poller, id) = setup(phases).await;
		let ctx = StepContext::standalone("run-1", "await-ready");

		poller
			.await_ready(&ctx, &id, Duration::from_secs(10))
			.await
			.unwrap();

		let beats = ctx.heartbeat_count();
		assert!(beats >= 5, "expected a heartbeat per 5s over 30s, got {beats}");

		tokio::time::sleep(Duration::from_secs(60)).await;
		assert_eq!(ctx.heartbeat_count(), beats);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancellation_ends_wait() {
		let (_, poller, id) = setup(vec![ResourceStatus::Pending]).await;
		let ctx = StepContext::standalone("run-1", "await-ready");

		let canceller = ctx.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(12)).await;
			canceller.cancellation_token.cancel();
		});

		let err = poller
			.await_ready(&ctx, &id, Duration::from_secs(10))
			.await
			.unwrap_err();
		assert_eq!(err, ProvisionerError::Cancelled);
	}

	#[tokio::test(start_paused = true)]
	async fn test_status_query_error_surfaces() {
		let api = Arc::new(SimulatedApi::new());
		let provisioner = Arc::new(Provisioner::new(api, ProvisionerSettings::default()));
		let poller = ReadinessPoller::new(provisioner, DEFAULT_POLL_INTERVAL);
		let ctx = StepContext::standalone("run-1", "await-ready");

		let err = poller
			.await_ready(&ctx, "missing", Duration::from_secs(10))
			.await
			.unwrap_err();
		assert!(matches!(err, ProvisionerError::StatusQuery { .. }));
		assert!(err.is_retryable());
	}
}
