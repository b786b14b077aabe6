// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end lifecycle runs against the in-process substrate and the
//! simulated provider.
//!
//! This suite covers:
//! - The happy path from creation to cleanup
//! - Failed deployments, failed creates and failed dispatches
//! - Cleanup error precedence
//! - Cancellation before, during and after creation
//! - Journal replay, resuming a cleaned-up run, and concurrent runs

use std::sync::Arc;
use std::time::Duration;

use burst_orchestrator::{
	external_channel, external_worker, provisioning_worker, start_orchestration, CleanupOutcome,
	LifecycleOrchestrator, LifecycleState, OrchestrationError, OrchestratorSettings, DISPATCH_STEP,
};
use burst_provisioning::{
	ProviderError, ProvisionRequest, Provisioner, ProvisionerSettings, ResourceStatus,
	SimulatedApi, SimulatedBoot, SimulatedOperation, EXTERNAL_TASK_QUEUE_ENV,
};
use burst_substrate::{LocalSubstrate, RunContext, StepError};
use tokio::time::Instant;

use LifecycleState::{Created, Dispatched, Failed, Idle, Ready};

struct Harness {
	substrate: Arc<LocalSubstrate>,
	api: Arc<SimulatedApi>,
	orchestrator: Arc<LifecycleOrchestrator>,
}

fn channel_of(boot: &SimulatedBoot) -> String {
	external_channel(|key| boot.env(key).map(str::to_string))
}

fn settings() -> OrchestratorSettings {
	OrchestratorSettings {
		schedule_to_start_timeout: Some(Duration::from_secs(30)),
		..OrchestratorSettings::default()
	}
}

/// Build a harness. With `attach_worker`, every app that turns Active gets
/// the external worker registered on its routing channel.
fn harness(api: SimulatedApi, attach_worker: bool) -> Harness {
	let substrate = Arc::new(LocalSubstrate::new());

	let api = if attach_worker {
		let on_boot = Arc::downgrade(&substrate);
		let on_teardown = Arc::downgrade(&substrate);
		api.on_boot(move |boot| {
			if let Some(substrate) = on_boot.upgrade() {
				substrate.register_worker(external_worker(channel_of(boot)));
			}
		})
		.on_teardown(move |boot| {
			if let Some(substrate) = on_teardown.upgrade() {
				substrate.deregister_worker(&channel_of(boot));
			}
		})
	} else {
		api
	};
	let api = Arc::new(api);

	let provisioner = Arc::new(Provisioner::new(
		Arc::clone(&api) as Arc<dyn burst_provisioning::ProviderApi>,
		ProvisionerSettings::default(),
	));
	let settings = settings();
	substrate.register_worker(provisioning_worker(
		settings.channel.clone(),
		provisioner,
		Duration::from_secs(5),
	));

	let orchestrator = Arc::new(LifecycleOrchestrator::new(
		Arc::clone(&substrate) as Arc<dyn burst_substrate::Substrate>,
		settings,
	));

	Harness {
		substrate,
		api,
		orchestrator,
	}
}

fn request() -> ProvisionRequest {
	ProvisionRequest::new("r", "app", "v1")
}

fn api_error(status: u16) -> ProviderError {
	ProviderError::Api {
		status,
		message: format!("HTTP {status}"),
	}
}

/// Purpose: a request for `r/app/v1` creates app `abc123` named by its
/// routing key, runs the command on that channel and deletes the app once.
#[tokio::test(start_paused = true)]
async fn test_happy_path_creates_dispatches_and_cleans_up() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), true);

	let start = Instant::now();
	let report = h.orchestrator.run(request()).await;

	assert!(report.is_success(), "unexpected error: {:?}", report.error);
	assert_eq!(
		report.transitions,
		vec![Idle, Created, Ready, Dispatched, LifecycleState::CleanedUp]
	);
	assert_eq!(report.cleanup, CleanupOutcome::Deleted);

	let resource = report.resource.clone().unwrap();
	assert_eq!(resource.id, "abc123");
	assert!(resource.routing_key.starts_with("external-app-"));

	let created = h.api.created();
	assert_eq!(created.len(), 1);
	assert_eq!(created[0].name, resource.routing_key);
	assert_eq!(created[0].image.registry, "r");
	assert_eq!(created[0].image.repository, "app");
	assert_eq!(created[0].image.tag, "v1");
	assert_eq!(
		created[0].env(EXTERNAL_TASK_QUEUE_ENV),
		Some(resource.routing_key.as_str())
	);

	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
	assert!(matches!(
		h.substrate.journal().get(&report.run_id, DISPATCH_STEP),
		Some(Ok(_))
	));
	assert!(!h.substrate.has_worker(&resource.routing_key));

	// pre-pause + one poll interval + work + post-pause
	assert_eq!(start.elapsed(), Duration::from_secs(75));
}

/// Purpose: `[Pending, Canceled]` fails the run with the deployment phase,
/// never dispatches, and still deletes the app exactly once.
#[tokio::test(start_paused = true)]
async fn test_canceled_deployment_fails_and_cleans_up() {
	let h = harness(
		SimulatedApi::new()
			.with_phases(vec![ResourceStatus::Pending, ResourceStatus::Canceled])
			.with_app_ids(["abc123"]),
		true,
	);

	let report = h.orchestrator.run(request()).await;

	assert_eq!(
		report.error,
		Some(OrchestrationError::DeploymentFailed {
			resource_id: "abc123".to_string(),
			phase: ResourceStatus::Canceled,
		})
	);
	assert_eq!(report.transitions, vec![Idle, Created, Failed]);
	assert_eq!(report.cleanup, CleanupOutcome::Deleted);
	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
	assert!(h.substrate.journal().get(&report.run_id, DISPATCH_STEP).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_skips_cleanup() {
	let h = harness(SimulatedApi::new(), true);
	h.api.fail_next(SimulatedOperation::Create, api_error(422));

	let report = h.orchestrator.run(request()).await;

	assert!(matches!(report.error, Some(OrchestrationError::Provision(_))));
	assert_eq!(report.transitions, vec![Idle, Failed]);
	assert!(report.resource.is_none());
	assert!(!report.cleanup_attempted());
	assert!(h.api.created().is_empty());
	assert!(h.api.deleted().is_empty());
}

/// Purpose: a transient provider error on create is retried after the
/// initial backoff interval.
#[tokio::test(start_paused = true)]
async fn test_transient_create_error_is_retried() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), true);
	h.api.fail_next(SimulatedOperation::Create, api_error(503));

	let start = Instant::now();
	let report = h.orchestrator.run(request()).await;

	assert!(report.is_success(), "unexpected error: {:?}", report.error);
	assert_eq!(h.api.created().len(), 1);
	assert_eq!(start.elapsed(), Duration::from_secs(76));
}

/// Purpose: a dispatch no worker picks up fails the run and the app is
/// still deleted.
#[tokio::test(start_paused = true)]
async fn test_unserved_dispatch_fails_and_cleans_up() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), false);

	let report = h.orchestrator.run(request()).await;

	match report.error {
		Some(OrchestrationError::Dispatch {
			ref resource_id,
			ref source,
		}) => {
			assert_eq!(resource_id, "abc123");
			assert!(matches!(source.error, StepError::ScheduleToStartTimeout { .. }));
			assert_eq!(source.attempts, 1);
		}
		ref other => panic!("expected dispatch error, got {other:?}"),
	}
	assert_eq!(report.transitions, vec![Idle, Created, Ready, Failed]);
	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
}

/// Purpose: when both the body and the cleanup fail, the body's error is
/// surfaced and the cleanup failure is kept on the report.
#[tokio::test(start_paused = true)]
async fn test_first_error_wins_over_cleanup_error() {
	let h = harness(
		SimulatedApi::new()
			.with_phases(vec![ResourceStatus::Pending, ResourceStatus::Error])
			.with_app_ids(["abc123"]),
		true,
	);
	h.api.fail_next(SimulatedOperation::Delete, api_error(403));

	let report = h.orchestrator.run(request()).await;

	assert!(matches!(
		report.error,
		Some(OrchestrationError::DeploymentFailed {
			phase: ResourceStatus::Error,
			..
		})
	));
	match &report.cleanup {
		CleanupOutcome::Failed(err) => {
			assert!(matches!(err, OrchestrationError::Deprovision { .. }));
			assert_eq!(err.resource_id(), Some("abc123"));
		}
		other => panic!("expected failed cleanup, got {other:?}"),
	}
	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_error_surfaces_when_body_succeeded() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), true);
	h.api.fail_next(SimulatedOperation::Delete, api_error(403));

	let report = h.orchestrator.run(request()).await;

	let err = report.error.clone().unwrap();
	assert!(matches!(err, OrchestrationError::Deprovision { .. }));
	assert!(err.to_string().contains("abc123"));
	assert_eq!(
		report.transitions,
		vec![Idle, Created, Ready, Dispatched, Failed]
	);
	assert!(report.into_result().is_err());
}

/// Purpose: a transient delete failure is retried, so the run still ends
/// cleaned up.
#[tokio::test(start_paused = true)]
async fn test_transient_delete_error_is_retried() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), true);
	h.api.fail_next(SimulatedOperation::Delete, api_error(503));

	let report = h.orchestrator.run(request()).await;

	assert!(report.is_success(), "unexpected error: {:?}", report.error);
	assert_eq!(report.final_state(), LifecycleState::CleanedUp);
	assert_eq!(
		h.api.deleted(),
		vec!["abc123".to_string(), "abc123".to_string()]
	);
}

/// Purpose: cancelling a run after its app was created still deletes the
/// app.
#[tokio::test(start_paused = true)]
async fn test_cancel_after_created_still_cleans_up() {
	let h = harness(
		SimulatedApi::new()
			.with_phases(vec![ResourceStatus::Pending])
			.with_app_ids(["abc123"]),
		true,
	);

	let handle = start_orchestration(Arc::clone(&h.orchestrator), request());
	tokio::time::sleep(Duration::from_secs(12)).await;
	handle.cancel();
	let report = handle.wait().await.unwrap();

	assert_eq!(report.error, Some(OrchestrationError::Cancelled));
	assert_eq!(report.transitions, vec![Idle, Created, Failed]);
	assert_eq!(report.cleanup, CleanupOutcome::Deleted);
	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_create_creates_nothing() {
	let h = harness(SimulatedApi::new(), true);

	let handle = start_orchestration(Arc::clone(&h.orchestrator), request());
	tokio::time::sleep(Duration::from_secs(2)).await;
	handle.cancel();
	let report = handle.wait().await.unwrap();

	assert_eq!(report.error, Some(OrchestrationError::Cancelled));
	assert_eq!(report.transitions, vec![Idle, Failed]);
	assert!(!report.cleanup_attempted());
	assert!(h.api.created().is_empty());
	assert!(h.api.deleted().is_empty());
}

/// Purpose: a cancel that lands while the provider is still answering the
/// create waits for the answer and deletes the app it names.
#[tokio::test(start_paused = true)]
async fn test_cancel_during_create_deletes_created_app() {
	let h = harness(
		SimulatedApi::new()
			.with_app_ids(["slow-1"])
			.with_create_latency(Duration::from_secs(3)),
		true,
	);

	let start = Instant::now();
	let handle = start_orchestration(Arc::clone(&h.orchestrator), request());
	tokio::time::sleep(Duration::from_secs(6)).await;
	assert_eq!(h.api.live_apps(), vec!["slow-1".to_string()]);
	handle.cancel();
	let report = handle.wait().await.unwrap();

	assert_eq!(report.error, Some(OrchestrationError::Cancelled));
	assert_eq!(report.resource.as_ref().map(|r| r.id.as_str()), Some("slow-1"));
	assert_eq!(report.transitions, vec![Idle, Created, Failed]);
	assert_eq!(report.cleanup, CleanupOutcome::Deleted);
	assert_eq!(h.api.deleted(), vec!["slow-1".to_string()]);
	assert!(h.api.live_apps().is_empty());
	assert_eq!(h.api.status_queries(), 0);
	// pre-pause + create latency
	assert_eq!(start.elapsed(), Duration::from_secs(8));
}

/// Purpose: resuming a cancelled run whose app was already deleted replays
/// the create and the delete, and fails without touching the deleted app.
#[tokio::test(start_paused = true)]
async fn test_resumed_run_does_not_reuse_deleted_app() {
	let h = harness(
		SimulatedApi::new()
			.with_phases(vec![ResourceStatus::Pending])
			.with_app_ids(["abc123"]),
		true,
	);
	let run = RunContext::new("run-resume");

	let first = {
		let orchestrator = Arc::clone(&h.orchestrator);
		let run = run.clone();
		tokio::spawn(async move { orchestrator.run_with_context(&run, request()).await })
	};
	tokio::time::sleep(Duration::from_secs(12)).await;
	run.cancel();
	let first = first.await.unwrap();
	assert_eq!(first.error, Some(OrchestrationError::Cancelled));
	assert_eq!(first.cleanup, CleanupOutcome::Deleted);
	let queries = h.api.status_queries();

	let resumed = RunContext::new("run-resume");
	let second = h.orchestrator.run_with_context(&resumed, request()).await;

	assert_eq!(
		second.error,
		Some(OrchestrationError::Released {
			resource_id: "abc123".to_string(),
		})
	);
	assert_eq!(second.resource, first.resource);
	assert_eq!(second.transitions, vec![Idle, Created, Failed]);
	assert_eq!(second.cleanup, CleanupOutcome::Deleted);
	assert_eq!(h.api.created().len(), 1);
	assert_eq!(h.api.deleted(), vec!["abc123".to_string()]);
	assert_eq!(h.api.status_queries(), queries);
}

/// Purpose: running the same run id again replays every completed step from
/// the journal without touching the provider or waiting again.
#[tokio::test(start_paused = true)]
async fn test_replay_skips_completed_steps() {
	let h = harness(SimulatedApi::new().with_app_ids(["abc123"]), true);
	let run = RunContext::new("run-replay");

	let first = h.orchestrator.run_with_context(&run, request()).await;
	assert!(first.is_success());
	let queries = h.api.status_queries();

	let start = Instant::now();
	let second = h.orchestrator.run_with_context(&run, request()).await;

	assert!(second.is_success());
	assert_eq!(second.resource, first.resource);
	assert_eq!(second.transitions, first.transitions);
	assert_eq!(start.elapsed(), Duration::ZERO);
	assert_eq!(h.api.created().len(), 1);
	assert_eq!(h.api.deleted().len(), 1);
	assert_eq!(h.api.status_queries(), queries);
}

/// Purpose: concurrent runs get their own apps and routing keys and each is
/// cleaned up.
#[tokio::test(start_paused = true)]
async fn test_concurrent_runs_are_independent() {
	let h = harness(SimulatedApi::new(), true);

	let first = start_orchestration(Arc::clone(&h.orchestrator), request());
	let second = start_orchestration(Arc::clone(&h.orchestrator), request());
	assert_ne!(first.run_id(), second.run_id());

	let first = first.wait().await.unwrap();
	let second = second.wait().await.unwrap();

	assert!(first.is_success(), "unexpected error: {:?}", first.error);
	assert!(second.is_success(), "unexpected error: {:?}", second.error);

	let first = first.resource.unwrap();
	let second = second.resource.unwrap();
	assert_ne!(first.id, second.id);
	assert_ne!(first.routing_key, second.routing_key);

	let mut deleted = h.api.deleted();
	deleted.sort();
	let mut expected = vec![first.id, second.id];
	expected.sort();
	assert_eq!(deleted, expected);
	assert!(h.api.live_apps().is_empty());
}
