// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The work executed on an ephemeral worker's own channel.

use std::time::Duration;

use async_trait::async_trait;
use burst_provisioning::EXTERNAL_TASK_QUEUE_ENV;
use burst_substrate::{
	decode_input, duration_millis, encode_output, start_heartbeat, Activity, ActivityError,
	StepContext, Worker,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

pub const LONG_RUNNING_COMMAND_ACTIVITY: &str = "long-running-command";

/// Channel served when `EXTERNAL_TASK_QUEUE` is unset.
pub const DEFAULT_EXTERNAL_TASK_QUEUE: &str = "externalTaskQueue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRunningCommandInput {
	pub duration_ms: u64,
	pub heartbeat_timeout_ms: u64,
}

impl LongRunningCommandInput {
	pub fn new(duration: Duration, heartbeat_timeout: Duration) -> Self {
		Self {
			duration_ms: duration_millis(duration),
			heartbeat_timeout_ms: duration_millis(heartbeat_timeout),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRunningCommandOutput {
	pub heartbeats: u64,
}

/// Sleeps for the requested duration, heartbeating at half the heartbeat
/// timeout.
#[derive(Debug, Default)]
pub struct LongRunningCommand;

#[async_trait]
impl Activity for LongRunningCommand {
	fn name(&self) -> &str {
		LONG_RUNNING_COMMAND_ACTIVITY
	}

	async fn run(&self, ctx: &StepContext, input: Value) -> Result<Value, ActivityError> {
		let input: LongRunningCommandInput = decode_input(input)?;
		let duration = Duration::from_millis(input.duration_ms);
		let heartbeat_timeout = Duration::from_millis(input.heartbeat_timeout_ms);
		if heartbeat_timeout.is_zero() {
			return Err(ActivityError::non_retryable(
				"InvalidInput",
				"heartbeat timeout must be positive",
			));
		}

		info!(
			parent: &ctx.span,
			duration_ms = input.duration_ms,
			"Running long-running command"
		);

		let mut ticker = start_heartbeat(ctx, heartbeat_timeout / 2);
		let result = tokio::select! {
			biased;
			_ = ticker.context().cancelled() => Err(ActivityError::cancelled()),
			_ = tokio::time::sleep(duration) => Ok(()),
		};
		ticker.stop();
		result?;

		info!(parent: &ctx.span, "Long-running command finished");
		encode_output(&LongRunningCommandOutput {
			heartbeats: ctx.heartbeat_count(),
		})
	}
}

/// Worker serving the long-running command on `channel`.
pub fn external_worker(channel: impl Into<String>) -> Worker {
	Worker::new(channel).register(LongRunningCommand)
}

/// Channel named by `EXTERNAL_TASK_QUEUE`, falling back to
/// [`DEFAULT_EXTERNAL_TASK_QUEUE`] when unset or empty.
pub fn external_channel(lookup: impl Fn(&str) -> Option<String>) -> String {
	lookup(EXTERNAL_TASK_QUEUE_ENV)
		.filter(|v| !v.is_empty())
		.unwrap_or_else(|| DEFAULT_EXTERNAL_TASK_QUEUE.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio::time::Instant;

	fn input(duration_secs: u64) -> Value {
		serde_json::to_value(LongRunningCommandInput::new(
			Duration::from_secs(duration_secs),
			Duration::from_secs(10),
		))
		.unwrap()
	}

	/// Purpose: the command runs for its full duration and heartbeats every
	/// half heartbeat timeout while doing so.
	#[tokio::test(start_paused = true)]
	async fn test_runs_for_duration_with_heartbeats() {
		let ctx = StepContext::standalone("run-1", "dispatch");
		let start = Instant::now();

		let output = LongRunningCommand.run(&ctx, input(60)).await.unwrap();
		let output: LongRunningCommandOutput = serde_json::from_value(output).unwrap();

		assert_eq!(start.elapsed(), Duration::from_secs(60));
		assert!(output.heartbeats >= 10, "got {} heartbeats", output.heartbeats);

		let beats = ctx.heartbeat_count();
		tokio::time::sleep(Duration::from_secs(30)).await;
		assert_eq!(ctx.heartbeat_count(), beats);
	}

	#[tokio::test(start_paused = true)]
	async fn test_cancellation_stops_command() {
		let ctx = StepContext::standalone("run-1", "dispatch");
		let canceller = ctx.cancellation_token.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_secs(7)).await;
			canceller.cancel();
		});

		let start = Instant::now();
		let err = LongRunningCommand.run(&ctx, input(60)).await.unwrap_err();

		assert!(err.is_cancelled());
		assert_eq!(start.elapsed(), Duration::from_secs(7));
	}

	#[test]
	fn test_input_millis_saturate() {
		let input = LongRunningCommandInput::new(Duration::MAX, Duration::from_secs(10));
		assert_eq!(input.duration_ms, u64::MAX);
		assert_eq!(input.heartbeat_timeout_ms, 10_000);
	}

	#[tokio::test]
	async fn test_zero_heartbeat_timeout_rejected() {
		let ctx = StepContext::standalone("run-1", "dispatch");
		let input = serde_json::json!({ "duration_ms": 10, "heartbeat_timeout_ms": 0 });

		let err = LongRunningCommand.run(&ctx, input).await.unwrap_err();
		assert_eq!(err.kind, "InvalidInput");
	}

	#[test]
	fn test_external_channel_defaults() {
		assert_eq!(external_channel(|_| None), "externalTaskQueue");
		assert_eq!(external_channel(|_| Some(String::new())), "externalTaskQueue");
		assert_eq!(
			external_channel(|_| Some("external-app-482913".to_string())),
			"external-app-482913"
		);
	}

	#[test]
	fn test_external_worker_registers_command() {
		let worker = external_worker("external-app-482913");
		assert_eq!(worker.channel(), "external-app-482913");
		assert_eq!(worker.activity_names(), vec!["long-running-command"]);
	}
}
