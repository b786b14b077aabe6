// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! DigitalOcean App Platform client.

use std::time::Duration;

use async_trait::async_trait;
use burst_config::{ProviderConfig, SecretString};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::api::ProviderApi;
use crate::error::ProviderError;
use crate::types::{App, AppSpec};

const USER_AGENT: &str = concat!("burst/", env!("CARGO_PKG_VERSION"));

/// [`ProviderApi`] over the App Platform REST API (`/v2/apps`).
pub struct DigitalOceanApi {
	http: Client,
	base_url: String,
	token: SecretString,
}

impl DigitalOceanApi {
	pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
		let token = config.token.clone().ok_or_else(|| {
			ProviderError::Configuration(
				"provider token missing (set BURST_PROVIDER_TOKEN or BURST_PROVIDER_TOKEN_FILE)"
					.to_string(),
			)
		})?;

		let http = Client::builder()
			.user_agent(USER_AGENT)
			.timeout(Duration::from_secs(config.request_timeout_secs))
			.build()
			.map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {e}")))?;

		info!(base_url = %config.api_url, "DigitalOcean client initialized");

		Ok(Self {
			http,
			base_url: config.api_url.trim_end_matches('/').to_string(),
			token,
		})
	}

	fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
		builder.bearer_auth(self.token.expose())
	}

	fn app_url(&self, id: &str) -> String {
		format!("{}/v2/apps/{}", self.base_url, id)
	}

	/// Map a non-2xx response to an error. `id` turns a 404 into `NotFound`.
	async fn check(response: Response, id: Option<&str>) -> Result<Response, ProviderError> {
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		if status == StatusCode::NOT_FOUND {
			if let Some(id) = id {
				return Err(ProviderError::NotFound { id: id.to_string() });
			}
		}

		let body = response.text().await.unwrap_or_default();
		let message = serde_json::from_str::<WireError>(&body)
			.ok()
			.and_then(|e| e.message)
			.unwrap_or(body);
		error!(status = status.as_u16(), message = %message, "DigitalOcean API request failed");
		Err(ProviderError::Api {
			status: status.as_u16(),
			message,
		})
	}

	async fn decode_app(response: Response) -> Result<App, ProviderError> {
		let envelope: WireAppEnvelope = response
			.json()
			.await
			.map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
		Ok(envelope.app.into())
	}
}

#[async_trait]
impl ProviderApi for DigitalOceanApi {
	async fn create_app(&self, spec: &AppSpec) -> Result<App, ProviderError> {
		let url = format!("{}/v2/apps", self.base_url);
		debug!(url = %url, name = %spec.name, "Creating app");

		let response = self
			.authorized(self.http.post(&url))
			.json(&WireCreateApp::from(spec))
			.send()
			.await?;
		let app = Self::decode_app(Self::check(response, None).await?).await?;

		info!(app_id = %app.id, name = %app.name, "App created");
		Ok(app)
	}

	async fn get_app(&self, id: &str) -> Result<App, ProviderError> {
		let url = self.app_url(id);
		debug!(url = %url, "Getting app");

		let response = self.authorized(self.http.get(&url)).send().await?;
		Self::decode_app(Self::check(response, Some(id)).await?).await
	}

	async fn delete_app(&self, id: &str) -> Result<(), ProviderError> {
		let url = self.app_url(id);
		debug!(url = %url, "Deleting app");

		let response = self.authorized(self.http.delete(&url)).send().await?;
		Self::check(response, Some(id)).await?;

		info!(app_id = %id, "App deleted");
		Ok(())
	}
}

#[derive(Debug, Serialize)]
struct WireCreateApp<'a> {
	spec: WireAppSpec<'a>,
}

#[derive(Debug, Serialize)]
struct WireAppSpec<'a> {
	name: &'a str,
	workers: Vec<WireWorker<'a>>,
}

#[derive(Debug, Serialize)]
struct WireWorker<'a> {
	name: &'a str,
	instance_count: u32,
	instance_size_slug: &'a str,
	image: WireImage<'a>,
	envs: Vec<WireEnv<'a>>,
}

#[derive(Debug, Serialize)]
struct WireImage<'a> {
	registry_type: &'a str,
	registry: &'a str,
	repository: &'a str,
	tag: &'a str,
}

#[derive(Serialize)]
struct WireEnv<'a> {
	key: &'a str,
	value: &'a str,
	scope: &'static str,
	#[serde(rename = "type")]
	kind: &'static str,
}

impl std::fmt::Debug for WireEnv<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WireEnv").field("key", &self.key).finish_non_exhaustive()
	}
}

impl<'a> From<&'a AppSpec> for WireCreateApp<'a> {
	fn from(spec: &'a AppSpec) -> Self {
		WireCreateApp {
			spec: WireAppSpec {
				name: &spec.name,
				workers: vec![WireWorker {
					name: &spec.component_name,
					instance_count: spec.instance_count,
					instance_size_slug: &spec.instance_size,
					image: WireImage {
						registry_type: &spec.image.registry_type,
						registry: &spec.image.registry,
						repository: &spec.image.repository,
						tag: &spec.image.tag,
					},
					envs: spec
						.envs
						.iter()
						.map(|e| WireEnv {
							key: &e.key,
							value: &e.value,
							scope: "RUN_TIME",
							kind: "GENERAL",
						})
						.collect(),
				}],
			},
		}
	}
}

#[derive(Debug, Deserialize)]
struct WireAppEnvelope {
	app: WireApp,
}

#[derive(Debug, Deserialize)]
struct WireApp {
	id: String,
	#[serde(default)]
	spec: Option<WireAppName>,
	#[serde(default)]
	active_deployment: Option<WireDeployment>,
}

#[derive(Debug, Deserialize)]
struct WireAppName {
	#[serde(default)]
	name: String,
}

#[derive(Debug, Deserialize)]
struct WireDeployment {
	#[serde(default)]
	phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
	#[serde(default)]
	message: Option<String>,
}

impl From<WireApp> for App {
	fn from(app: WireApp) -> Self {
		App {
			id: app.id,
			name: app.spec.map(|s| s.name).unwrap_or_default(),
			active_deployment_phase: app.active_deployment.and_then(|d| d.phase),
		}
	}
}
