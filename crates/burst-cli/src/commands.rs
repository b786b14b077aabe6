// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use burst_config::BurstConfig;
use burst_orchestrator::{
	external_channel, external_worker, provisioning_worker, start_orchestration, CleanupOutcome,
	LifecycleOrchestrator, OrchestratorSettings, RunReport,
};
use burst_provisioning::{
	DigitalOceanApi, ProviderApi, ProvisionRequest, Provisioner, ResourceStatus, SimulatedApi,
	SimulatedBoot,
};
use burst_substrate::{LocalSubstrate, Substrate};
use tracing::{info, warn};

use crate::cli::RunArgs;

fn channel_of(boot: &SimulatedBoot) -> String {
	external_channel(|key| boot.env(key).map(str::to_string))
}

/// In-memory provider whose apps attach a local external worker to
/// `substrate` once they turn active, and detach it when deleted.
pub fn simulated_api(substrate: &Arc<LocalSubstrate>) -> SimulatedApi {
	let on_boot = Arc::downgrade(substrate);
	let on_teardown = Arc::downgrade(substrate);
	SimulatedApi::new()
		.on_boot(move |boot| {
			if let Some(substrate) = on_boot.upgrade() {
				substrate.register_worker(external_worker(channel_of(boot)));
			}
		})
		.on_teardown(move |boot| {
			if let Some(substrate) = on_teardown.upgrade() {
				substrate.deregister_worker(&channel_of(boot));
			}
		})
}

fn provider(config: &BurstConfig) -> Result<Arc<dyn ProviderApi>> {
	let api = DigitalOceanApi::new(&config.provider).context("failed to initialise provider client")?;
	Ok(Arc::new(api))
}

fn provisioner(config: &BurstConfig, api: Arc<dyn ProviderApi>) -> Arc<Provisioner> {
	Arc::new(Provisioner::from_config(api, config))
}

/// Orchestrator on `substrate`, with the provisioning activities registered
/// on the configured default channel.
pub fn orchestrator(
	config: &BurstConfig,
	api: Arc<dyn ProviderApi>,
	substrate: &Arc<LocalSubstrate>,
) -> Arc<LifecycleOrchestrator> {
	substrate.register_worker(provisioning_worker(
		config.substrate.default_channel.clone(),
		provisioner(config, api),
		config.orchestration.poll_interval(),
	));
	Arc::new(LifecycleOrchestrator::new(
		Arc::clone(substrate) as Arc<dyn Substrate>,
		OrchestratorSettings::from_config(config),
	))
}

/// Run one orchestration against the simulated provider.
///
/// The substrate lives in this process, so a worker hosted by the real
/// provider could never pick up the dispatched command. Such runs are refused
/// before anything is provisioned.
pub async fn run(config: &BurstConfig, args: RunArgs) -> Result<RunReport> {
	if !args.simulate {
		bail!("the in-process substrate cannot reach a hosted worker; pass --simulate to run against the simulated provider");
	}

	let substrate = Arc::new(LocalSubstrate::new());
	info!("Using simulated provider");
	let api: Arc<dyn ProviderApi> = Arc::new(simulated_api(&substrate));

	let request = ProvisionRequest::new(args.registry, args.repository, args.tag);
	let handle = start_orchestration(orchestrator(config, api, &substrate), request);

	let run = handle.context().clone();
	let interrupt = tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!(run_id = %run.run_id, "Interrupted, cancelling run");
			run.cancel();
		}
	});

	let report = handle.wait().await.context("orchestration task failed")?;
	interrupt.abort();

	print_report(&report);
	report.into_result().map_err(Into::into)
}

fn print_report(report: &RunReport) {
	println!("run:      {}", report.run_id);
	if let Some(resource) = &report.resource {
		println!("app:      {} ({})", resource.id, resource.routing_key);
	}
	println!("state:    {}", report.final_state());
	if let Some(finished_at) = report.finished_at {
		println!("duration: {}s", (finished_at - report.started_at).num_seconds());
	}
	match &report.cleanup {
		CleanupOutcome::NotRequired => {}
		CleanupOutcome::Deleted => println!("cleanup:  deleted"),
		CleanupOutcome::Failed(err) => println!("cleanup:  failed: {err}"),
	}
}

pub async fn status(config: &BurstConfig, app_id: &str) -> Result<ResourceStatus> {
	let provisioner = provisioner(config, provider(config)?);
	provisioner
		.get_status(app_id)
		.await
		.with_context(|| format!("failed to query app {app_id}"))
}

pub async fn cleanup(config: &BurstConfig, app_id: &str) -> Result<()> {
	let provisioner = provisioner(config, provider(config)?);
	provisioner
		.delete(app_id)
		.await
		.with_context(|| format!("failed to delete app {app_id}"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use burst_orchestrator::LifecycleState;

	fn run_args() -> RunArgs {
		RunArgs {
			registry: "r".to_string(),
			repository: "app".to_string(),
			tag: "v1".to_string(),
			simulate: true,
		}
	}

	/// Purpose: a simulated run provisions, dispatches to the attached local
	/// worker and cleans up.
	#[tokio::test(start_paused = true)]
	async fn test_simulated_run_completes() {
		let report = run(&BurstConfig::default(), run_args()).await.unwrap();

		assert_eq!(report.final_state(), LifecycleState::CleanedUp);
		assert_eq!(report.cleanup, CleanupOutcome::Deleted);
		let resource = report.resource.unwrap();
		assert!(resource.routing_key.starts_with("external-app-"));
	}

	#[tokio::test]
	async fn test_status_without_token_fails() {
		let err = status(&BurstConfig::default(), "abc123").await.unwrap_err();
		assert!(format!("{err:#}").contains("token"));
	}

	/// Purpose: a run that would provision a real app nothing can serve is
	/// refused up front.
	#[tokio::test]
	async fn test_provider_run_is_refused() {
		let args = RunArgs {
			simulate: false,
			..run_args()
		};
		let err = run(&BurstConfig::default(), args).await.unwrap_err();
		assert!(err.to_string().contains("--simulate"));
	}
}
