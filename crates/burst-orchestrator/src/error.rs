// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use burst_provisioning::ResourceStatus;
use burst_substrate::StepFailure;

/// Terminal failure of an orchestration run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestrationError {
	#[error("error running create activity: {0}")]
	Provision(#[source] StepFailure),

	#[error("deployment of {resource_id} failed with phase: {phase}")]
	DeploymentFailed {
		resource_id: String,
		phase: ResourceStatus,
	},

	#[error("error waiting for app build: {0}")]
	Readiness(#[source] StepFailure),

	#[error("error running external activity on {resource_id}: {source}")]
	Dispatch {
		resource_id: String,
		#[source]
		source: StepFailure,
	},

	#[error("error deleting app {resource_id}: {source}")]
	Deprovision {
		resource_id: String,
		#[source]
		source: StepFailure,
	},

	#[error("orchestration cancelled")]
	Cancelled,

	/// A resumed run whose resource an earlier execution already deleted.
	#[error("app {resource_id} was already deleted by an earlier execution of this run")]
	Released { resource_id: String },

	#[error("substrate error: {0}")]
	Substrate(#[source] StepFailure),
}

impl OrchestrationError {
	/// The resource the failure concerns, when one had been created.
	pub fn resource_id(&self) -> Option<&str> {
		match self {
			OrchestrationError::DeploymentFailed { resource_id, .. }
			| OrchestrationError::Dispatch { resource_id, .. }
			| OrchestrationError::Deprovision { resource_id, .. }
			| OrchestrationError::Released { resource_id } => Some(resource_id),
			_ => None,
		}
	}

	pub fn is_cancelled(&self) -> bool {
		matches!(self, OrchestrationError::Cancelled)
	}
}
