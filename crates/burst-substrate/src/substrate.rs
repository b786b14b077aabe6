// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{StepError, StepFailure};
use crate::journal::StepOutcome;
use crate::policy::StepOptions;

/// One step to execute: which activity, on which channel, with what input.
#[derive(Debug, Clone)]
pub struct StepRequest {
	/// Identity of the step within its run. Outcomes are memoized under it.
	pub step_id: String,
	pub channel: String,
	pub activity: String,
	pub input: Value,
	pub options: StepOptions,
}

impl StepRequest {
	pub fn new(
		step_id: impl Into<String>,
		channel: impl Into<String>,
		activity: impl Into<String>,
	) -> Self {
		Self {
			step_id: step_id.into(),
			channel: channel.into(),
			activity: activity.into(),
			input: Value::Null,
			options: StepOptions::default(),
		}
	}

	pub fn input<T: Serialize>(mut self, input: &T) -> Result<Self, StepFailure> {
		self.input = serde_json::to_value(input).map_err(|e| {
			StepFailure::new(self.step_id.clone(), 0, StepError::Serialization(e.to_string()))
		})?;
		Ok(self)
	}

	pub fn options(mut self, options: StepOptions) -> Self {
		self.options = options;
		self
	}
}

/// Durable execution substrate.
///
/// `execute` runs a step to a terminal outcome under the request's
/// supervision options and retry policy. `sleep` is a substrate-managed pause
/// that honours run cancellation. Both are memoized per run, so executing a
/// run a second time replays what already completed.
#[async_trait]
pub trait Substrate: Send + Sync {
	async fn execute(&self, run: &RunContext, request: StepRequest) -> Result<Value, StepFailure>;

	async fn sleep(
		&self,
		run: &RunContext,
		timer_id: &str,
		duration: Duration,
	) -> Result<(), StepFailure>;

	/// Outcome recorded for `step_id` by an earlier execution of the run, if
	/// any. Substrates that keep no history report `None`.
	fn recorded(&self, _run_id: &str, _step_id: &str) -> Option<StepOutcome> {
		None
	}
}

/// Execute a step and decode its output.
pub async fn execute_typed<O: DeserializeOwned>(
	substrate: &dyn Substrate,
	run: &RunContext,
	request: StepRequest,
) -> Result<O, StepFailure> {
	let step_id = request.step_id.clone();
	let output = substrate.execute(run, request).await?;
	serde_json::from_value(output)
		.map_err(|e| StepFailure::new(step_id, 1, StepError::Serialization(e.to_string())))
}
