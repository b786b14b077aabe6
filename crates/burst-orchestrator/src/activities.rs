// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning activities served on the orchestrator's own channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use burst_provisioning::{ProvisionRequest, Provisioner, ProvisionerError, ReadinessPoller};
use burst_substrate::{decode_input, encode_output, Activity, ActivityError, StepContext, Worker};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CREATE_ACTIVITY: &str = "create";
pub const AWAIT_READY_ACTIVITY: &str = "await-ready";
pub const DELETE_ACTIVITY: &str = "delete";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitReadyInput {
	pub resource_id: String,
	pub heartbeat_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteInput {
	pub resource_id: String,
}

pub struct CreateActivity {
	provisioner: Arc<Provisioner>,
}

impl CreateActivity {
	pub fn new(provisioner: Arc<Provisioner>) -> Self {
		Self { provisioner }
	}
}

#[async_trait]
impl Activity for CreateActivity {
	fn name(&self) -> &str {
		CREATE_ACTIVITY
	}

	/// Not raced against cancellation: once the provider call is out the app
	/// may exist, and only a completed call tells which one to delete.
	async fn run(&self, _ctx: &StepContext, input: Value) -> Result<Value, ActivityError> {
		let request: ProvisionRequest = decode_input(input)?;
		let resource = self.provisioner.create(&request).await?;
		encode_output(&resource)
	}
}

pub struct AwaitReadyActivity {
	poller: Arc<ReadinessPoller>,
}

impl AwaitReadyActivity {
	pub fn new(poller: Arc<ReadinessPoller>) -> Self {
		Self { poller }
	}
}

#[async_trait]
impl Activity for AwaitReadyActivity {
	fn name(&self) -> &str {
		AWAIT_READY_ACTIVITY
	}

	async fn run(&self, ctx: &StepContext, input: Value) -> Result<Value, ActivityError> {
		let input: AwaitReadyInput = decode_input(input)?;
		self.poller
			.await_ready(
				ctx,
				&input.resource_id,
				Duration::from_millis(input.heartbeat_timeout_ms),
			)
			.await?;
		Ok(Value::Null)
	}
}

pub struct DeleteActivity {
	provisioner: Arc<Provisioner>,
}

impl DeleteActivity {
	pub fn new(provisioner: Arc<Provisioner>) -> Self {
		Self { provisioner }
	}
}

#[async_trait]
impl Activity for DeleteActivity {
	fn name(&self) -> &str {
		DELETE_ACTIVITY
	}

	async fn run(&self, ctx: &StepContext, input: Value) -> Result<Value, ActivityError> {
		let input: DeleteInput = decode_input(input)?;
		tokio::select! {
			biased;
			_ = ctx.cancelled() => return Err(ProvisionerError::Cancelled.into()),
			result = self.provisioner.delete(&input.resource_id) => result?,
		}
		Ok(Value::Null)
	}
}

/// Worker serving the provisioning activities on `channel`.
pub fn provisioning_worker(
	channel: impl Into<String>,
	provisioner: Arc<Provisioner>,
	poll_interval: Duration,
) -> Worker {
	let poller = Arc::new(ReadinessPoller::new(Arc::clone(&provisioner), poll_interval));
	Worker::new(channel)
		.register(CreateActivity::new(Arc::clone(&provisioner)))
		.register(AwaitReadyActivity::new(poller))
		.register(DeleteActivity::new(provisioner))
}
