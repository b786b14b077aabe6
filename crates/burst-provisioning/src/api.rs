// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{App, AppSpec};

/// Hosting provider operations needed by the provisioner.
///
/// Implemented over HTTP by [`crate::DigitalOceanApi`] and in memory by
/// [`crate::SimulatedApi`].
#[async_trait]
pub trait ProviderApi: Send + Sync {
	/// Create an app from `spec`.
	async fn create_app(&self, spec: &AppSpec) -> Result<App, ProviderError>;

	/// Fetch an app by id.
	async fn get_app(&self, id: &str) -> Result<App, ProviderError>;

	/// Delete an app by id. A missing app is `ProviderError::NotFound`.
	async fn delete_app(&self, id: &str) -> Result<(), ProviderError>;
}
