// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider and provisioner error types.

use burst_substrate::ActivityError;
use reqwest::StatusCode;

use crate::types::ResourceStatus;

const RETRYABLE_STATUSES: [StatusCode; 6] = [
	StatusCode::TOO_MANY_REQUESTS,
	StatusCode::REQUEST_TIMEOUT,
	StatusCode::INTERNAL_SERVER_ERROR,
	StatusCode::BAD_GATEWAY,
	StatusCode::SERVICE_UNAVAILABLE,
	StatusCode::GATEWAY_TIMEOUT,
];

/// Errors returned by a [`crate::ProviderApi`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
	#[error("provider API error (HTTP {status}): {message}")]
	Api { status: u16, message: String },

	#[error("provider transport error: {message}")]
	Transport { message: String, retryable: bool },

	#[error("app not found: {id}")]
	NotFound { id: String },

	#[error("invalid provider response: {0}")]
	InvalidResponse(String),

	#[error("provider not configured: {0}")]
	Configuration(String),
}

impl ProviderError {
	pub fn is_retryable(&self) -> bool {
		match self {
			ProviderError::Api { status, .. } => StatusCode::from_u16(*status)
				.map(|s| RETRYABLE_STATUSES.contains(&s) || s.is_server_error())
				.unwrap_or(false),
			ProviderError::Transport { retryable, .. } => *retryable,
			// Surfaced after the step's retries rather than swallowed.
			ProviderError::NotFound { .. } => true,
			ProviderError::InvalidResponse(_) | ProviderError::Configuration(_) => false,
		}
	}
}

impl From<reqwest::Error> for ProviderError {
	fn from(err: reqwest::Error) -> Self {
		if let Some(status) = err.status() {
			return ProviderError::Api {
				status: status.as_u16(),
				message: err.to_string(),
			};
		}
		if err.is_decode() {
			return ProviderError::InvalidResponse(err.to_string());
		}
		ProviderError::Transport {
			retryable: err.is_timeout() || err.is_connect(),
			message: err.to_string(),
		}
	}
}

/// Errors that can occur during provisioning operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProvisionerError {
	#[error("error creating app: {source}")]
	Provision {
		#[source]
		source: ProviderError,
	},

	#[error("error deleting app {id}: {source}")]
	Deprovision {
		id: String,
		#[source]
		source: ProviderError,
	},

	#[error("error getting app {id}: {source}")]
	StatusQuery {
		id: String,
		#[source]
		source: ProviderError,
	},

	#[error("deployment of app {id} failed with phase: {phase}")]
	DeploymentFailed { id: String, phase: ResourceStatus },

	#[error("provisioning operation cancelled")]
	Cancelled,
}

impl ProvisionerError {
	pub fn is_retryable(&self) -> bool {
		match self {
			ProvisionerError::Provision { source }
			| ProvisionerError::Deprovision { source, .. }
			| ProvisionerError::StatusQuery { source, .. } => source.is_retryable(),
			ProvisionerError::DeploymentFailed { .. } | ProvisionerError::Cancelled => false,
		}
	}

	/// Stable kind name used on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			ProvisionerError::Provision { .. } => "Provision",
			ProvisionerError::Deprovision { .. } => "Deprovision",
			ProvisionerError::StatusQuery { .. } => "StatusQuery",
			ProvisionerError::DeploymentFailed { .. } => "DeploymentFailed",
			ProvisionerError::Cancelled => "Cancelled",
		}
	}
}

impl From<ProvisionerError> for ActivityError {
	fn from(err: ProvisionerError) -> Self {
		match &err {
			ProvisionerError::Cancelled => ActivityError::cancelled(),
			ProvisionerError::DeploymentFailed { id, phase } => {
				ActivityError::non_retryable(err.kind(), err.to_string()).with_details(
					serde_json::json!({ "resource_id": id, "phase": phase }),
				)
			}
			ProvisionerError::Deprovision { id, .. } | ProvisionerError::StatusQuery { id, .. } => {
				ActivityError {
					kind: err.kind().to_string(),
					message: err.to_string(),
					retryable: err.is_retryable(),
					details: Some(serde_json::json!({ "resource_id": id })),
				}
			}
			ProvisionerError::Provision { .. } => ActivityError {
				kind: err.kind().to_string(),
				message: err.to_string(),
				retryable: err.is_retryable(),
				details: None,
			},
		}
	}
}
