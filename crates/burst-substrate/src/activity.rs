// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::StepContext;
use crate::error::ActivityError;

/// A unit of work a worker can execute as a step.
///
/// Inputs and outputs are JSON so steps can be routed to any channel and
/// memoized without knowing their concrete types.
#[async_trait]
pub trait Activity: Send + Sync {
	fn name(&self) -> &str;

	async fn run(&self, ctx: &StepContext, input: Value) -> Result<Value, ActivityError>;
}

/// Deserialize an activity input.
pub fn decode_input<T: DeserializeOwned>(input: Value) -> Result<T, ActivityError> {
	serde_json::from_value(input).map_err(ActivityError::invalid_input)
}

/// Serialize an activity output.
pub fn encode_output<T: Serialize>(output: &T) -> Result<Value, ActivityError> {
	serde_json::to_value(output)
		.map_err(|e| ActivityError::non_retryable("InvalidOutput", e.to_string()))
}
