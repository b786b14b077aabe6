// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ephemeral worker provisioning for burst.
//!
//! The [`Provisioner`] creates one hosted app per orchestration run, named by
//! a generated routing key, and deletes it again. It talks to the hosting
//! provider through the [`ProviderApi`] seam:
//!
//! - [`DigitalOceanApi`] for App Platform over HTTP
//! - [`SimulatedApi`] for tests and local simulated runs
//!
//! [`ReadinessPoller`] waits for a created app's deployment to become active
//! while heartbeating on the calling step's context.

pub mod api;
pub mod digitalocean;
pub mod error;
pub mod provisioner;
pub mod readiness;
pub mod simulated;
pub mod types;

pub use api::ProviderApi;
pub use digitalocean::DigitalOceanApi;
pub use error::{ProviderError, ProvisionerError};
pub use provisioner::{Provisioner, ProvisionerSettings, EXTERNAL_TASK_QUEUE_ENV};
pub use readiness::{ReadinessPoller, DEFAULT_POLL_INTERVAL};
pub use simulated::{SimulatedApi, SimulatedBoot, SimulatedOperation};
pub use types::{
	App, AppSpec, EnvVar, ImageSpec, ProvisionRequest, ProvisionedResource, ResourceStatus,
};
