// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Step and activity error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failure reported by an activity body.
///
/// This is the wire form of a failure: it crosses channel boundaries as data,
/// so it carries a string `kind` and optional JSON `details` instead of a
/// typed source. `retryable` decides whether the substrate schedules another
/// attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ActivityError {
	pub kind: String,
	pub message: String,
	pub retryable: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

impl ActivityError {
	pub fn retryable(kind: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			message: message.into(),
			retryable: true,
			details: None,
		}
	}

	pub fn non_retryable(kind: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			message: message.into(),
			retryable: false,
			details: None,
		}
	}

	pub fn with_details(mut self, details: serde_json::Value) -> Self {
		self.details = Some(details);
		self
	}

	/// A malformed activity input. Retrying the same input cannot help.
	pub fn invalid_input(err: serde_json::Error) -> Self {
		Self::non_retryable("InvalidInput", err.to_string())
	}

	pub fn cancelled() -> Self {
		Self::non_retryable("Cancelled", "activity cancelled")
	}

	pub fn is_cancelled(&self) -> bool {
		self.kind == "Cancelled"
	}
}

/// Why a single step attempt (or the step as a whole) failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
	#[error(transparent)]
	Activity(#[from] ActivityError),

	#[error("no heartbeat received within {timeout:?}")]
	HeartbeatTimeout { timeout: Duration },

	#[error("attempt did not complete within {timeout:?}")]
	StartToCloseTimeout { timeout: Duration },

	#[error("no worker picked up the step on channel '{channel}' within {timeout:?}")]
	ScheduleToStartTimeout { channel: String, timeout: Duration },

	#[error("step cancelled")]
	Cancelled,

	#[error("activity '{activity}' is not registered on channel '{channel}'")]
	UnknownActivity { channel: String, activity: String },

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl StepError {
	/// Whether the substrate may schedule another attempt after this error.
	pub fn is_retryable(&self) -> bool {
		match self {
			StepError::Activity(e) => e.retryable && !e.is_cancelled(),
			StepError::HeartbeatTimeout { .. } | StepError::StartToCloseTimeout { .. } => true,
			StepError::ScheduleToStartTimeout { .. }
			| StepError::Cancelled
			| StepError::UnknownActivity { .. }
			| StepError::Serialization(_) => false,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		match self {
			StepError::Cancelled => true,
			StepError::Activity(e) => e.is_cancelled(),
			_ => false,
		}
	}

	/// The activity failure behind this error, if the activity itself failed.
	pub fn activity_error(&self) -> Option<&ActivityError> {
		match self {
			StepError::Activity(e) => Some(e),
			_ => None,
		}
	}
}

/// Terminal failure of a step, surfaced to the caller once retries are over.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("step '{step_id}' failed after {attempts} attempt(s): {error}")]
pub struct StepFailure {
	pub step_id: String,
	pub attempts: u32,
	#[source]
	pub error: StepError,
}

impl StepFailure {
	pub fn new(step_id: impl Into<String>, attempts: u32, error: StepError) -> Self {
		Self {
			step_id: step_id.into(),
			attempts,
			error,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		self.error.is_cancelled()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retryable_classification() {
		assert!(StepError::HeartbeatTimeout {
			timeout: Duration::from_secs(10)
		}
		.is_retryable());
		assert!(StepError::StartToCloseTimeout {
			timeout: Duration::from_secs(1)
		}
		.is_retryable());
		assert!(StepError::from(ActivityError::retryable("Provision", "503")).is_retryable());

		assert!(!StepError::Cancelled.is_retryable());
		assert!(!StepError::ScheduleToStartTimeout {
			channel: "external-app-100000".to_string(),
			timeout: Duration::from_secs(5),
		}
		.is_retryable());
		assert!(!StepError::from(ActivityError::non_retryable("DeploymentFailed", "ERROR")).is_retryable());
		assert!(!StepError::from(ActivityError {
			retryable: true,
			..ActivityError::cancelled()
		})
		.is_retryable());
	}

	#[test]
	fn test_activity_error_wire_format() {
		let err = ActivityError::non_retryable("DeploymentFailed", "deployment failed with phase: ERROR")
			.with_details(serde_json::json!({ "phase": "ERROR" }));

		let json = serde_json::to_value(&err).unwrap();
		assert_eq!(json["kind"], "DeploymentFailed");
		assert_eq!(json["retryable"], false);
		assert_eq!(json["details"]["phase"], "ERROR");

		let parsed: ActivityError = serde_json::from_value(json).unwrap();
		assert_eq!(parsed, err);
	}

	#[test]
	fn test_failure_display_names_step() {
		let failure = StepFailure::new("delete", 5, StepError::Cancelled);
		assert_eq!(
			failure.to_string(),
			"step 'delete' failed after 5 attempt(s): step cancelled"
		);
	}
}
