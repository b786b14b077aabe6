// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process substrate.
//!
//! Steps run as tokio tasks in the current process. Each attempt is raced
//! against run cancellation, the start-to-close timeout and a heartbeat
//! watchdog. Failed attempts are retried per the step's [`RetryPolicy`].
//! Workers register per channel. A step addressed to a channel without a
//! worker waits for one up to the schedule-to-start bound.
//!
//! [`RetryPolicy`]: crate::policy::RetryPolicy

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::context::{HeartbeatSink, RunContext, StepContext};
use crate::error::{StepError, StepFailure};
use crate::journal::{StepJournal, StepOutcome};
use crate::policy::duration_millis;
use crate::substrate::{StepRequest, Substrate};
use crate::worker::Worker;

pub struct LocalSubstrate {
	workers: RwLock<HashMap<String, Arc<Worker>>>,
	registrations: watch::Sender<u64>,
	journal: Arc<StepJournal>,
}

impl Default for LocalSubstrate {
	fn default() -> Self {
		Self::new()
	}
}

impl LocalSubstrate {
	pub fn new() -> Self {
		Self::with_journal(Arc::new(StepJournal::new()))
	}

	/// Share a journal across substrate instances, e.g. to replay a run after
	/// a restart of the orchestrating component.
	pub fn with_journal(journal: Arc<StepJournal>) -> Self {
		let (registrations, _) = watch::channel(0);
		Self {
			workers: RwLock::new(HashMap::new()),
			registrations,
			journal,
		}
	}

	pub fn journal(&self) -> &Arc<StepJournal> {
		&self.journal
	}

	/// Serve `worker`'s activities on its channel, replacing any previous
	/// worker on that channel.
	pub fn register_worker(&self, worker: Worker) {
		let channel = worker.channel().to_string();
		info!(channel = %channel, activities = ?worker.activity_names(), "worker registered");
		self.workers
			.write()
			.unwrap_or_else(|e| e.into_inner())
			.insert(channel, Arc::new(worker));
		self.registrations.send_modify(|generation| *generation += 1);
	}

	pub fn deregister_worker(&self, channel: &str) -> bool {
		let removed = self
			.workers
			.write()
			.unwrap_or_else(|e| e.into_inner())
			.remove(channel)
			.is_some();
		if removed {
			info!(channel = %channel, "worker deregistered");
		}
		removed
	}

	pub fn has_worker(&self, channel: &str) -> bool {
		self.worker(channel).is_some()
	}

	fn worker(&self, channel: &str) -> Option<Arc<Worker>> {
		self.workers
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.get(channel)
			.cloned()
	}

	async fn wait_for_worker(
		&self,
		run: &RunContext,
		request: &StepRequest,
	) -> Result<Arc<Worker>, StepError> {
		if let Some(worker) = self.worker(&request.channel) {
			return Ok(worker);
		}

		let bound = request.options.schedule_to_start_bound();
		debug!(
			channel = %request.channel,
			timeout_ms = duration_millis(bound),
			"no worker on channel yet, waiting"
		);

		let mut registrations = self.registrations.subscribe();
		let wait = async {
			loop {
				if let Some(worker) = self.worker(&request.channel) {
					return worker;
				}
				if registrations.changed().await.is_err() {
					std::future::pending::<()>().await;
				}
			}
		};

		tokio::select! {
			biased;
			_ = run.cancellation_token.cancelled() => Err(StepError::Cancelled),
			worker = tokio::time::timeout(bound, wait) => worker.map_err(|_| StepError::ScheduleToStartTimeout {
				channel: request.channel.clone(),
				timeout: bound,
			}),
		}
	}

	async fn run_attempt(
		&self,
		run: &RunContext,
		request: &StepRequest,
		attempt: u32,
	) -> Result<Value, StepError> {
		let worker = self.wait_for_worker(run, request).await?;
		let activity =
			worker
				.activity(&request.activity)
				.ok_or_else(|| StepError::UnknownActivity {
					channel: request.channel.clone(),
					activity: request.activity.clone(),
				})?;

		let heartbeats = HeartbeatSink::new();
		let ctx = StepContext::new(
			run.run_id.clone(),
			request.step_id.clone(),
			request.activity.clone(),
			attempt,
			run.cancellation_token.child_token(),
			Arc::clone(&heartbeats),
		);
		let span = ctx.span.clone();
		let options = &request.options;

		let result = async {
			tokio::select! {
				biased;
				_ = run.cancellation_token.cancelled() => Err(StepError::Cancelled),
				result = activity.run(&ctx, request.input.clone()) => result.map_err(StepError::from),
				_ = tokio::time::sleep(options.start_to_close_timeout) => Err(StepError::StartToCloseTimeout {
					timeout: options.start_to_close_timeout,
				}),
				timeout = heartbeat_watchdog(&heartbeats, options.heartbeat_timeout) => Err(StepError::HeartbeatTimeout { timeout }),
			}
		}
		.instrument(span)
		.await;

		// Anything the attempt left running (tickers, child tasks) sees the cancel.
		ctx.cancellation_token.cancel();
		result
	}

	async fn execute_with_retry(
		&self,
		run: &RunContext,
		request: &StepRequest,
	) -> Result<Value, StepFailure> {
		let policy = &request.options.retry_policy;
		let max_attempts = policy.max_attempts.max(1);
		let mut attempt = 0u32;

		loop {
			attempt += 1;
			let error = match self.run_attempt(run, request, attempt).await {
				Ok(output) => {
					info!(
						step_id = %request.step_id,
						channel = %request.channel,
						attempt,
						"step completed"
					);
					return Ok(output);
				}
				Err(error) => error,
			};

			if !error.is_retryable() {
				warn!(
					step_id = %request.step_id,
					attempt,
					error = %error,
					"step failed with non-retryable error"
				);
				return Err(StepFailure::new(request.step_id.clone(), attempt, error));
			}

			if attempt >= max_attempts {
				warn!(
					step_id = %request.step_id,
					attempt,
					max_attempts,
					error = %error,
					"step attempts exhausted"
				);
				return Err(StepFailure::new(request.step_id.clone(), attempt, error));
			}

			let delay = policy.delay_for_retry(attempt);
			warn!(
				step_id = %request.step_id,
				attempt,
				max_attempts,
				delay_ms = duration_millis(delay),
				error = %error,
				"step attempt failed, retrying"
			);

			tokio::select! {
				biased;
				_ = run.cancellation_token.cancelled() => {
					return Err(StepFailure::new(request.step_id.clone(), attempt, StepError::Cancelled));
				}
				_ = tokio::time::sleep(delay) => {}
			}
		}
	}
}

/// Resolves with the timeout once no liveness signal arrived within it.
/// Never resolves when the timeout is disabled.
async fn heartbeat_watchdog(heartbeats: &HeartbeatSink, timeout: Option<Duration>) -> Duration {
	let Some(timeout) = timeout else {
		return std::future::pending().await;
	};
	while tokio::time::timeout(timeout, heartbeats.next()).await.is_ok() {}
	timeout
}

#[async_trait]
impl Substrate for LocalSubstrate {
	async fn execute(&self, run: &RunContext, request: StepRequest) -> Result<Value, StepFailure> {
		if let Some(outcome) = self.journal.get(&run.run_id, &request.step_id) {
			debug!(parent: &run.span, step_id = %request.step_id, "replaying recorded step outcome");
			return outcome;
		}

		let outcome = self
			.execute_with_retry(run, &request)
			.instrument(run.span.clone())
			.await;
		self.journal
			.record(&run.run_id, &request.step_id, outcome.clone());
		outcome
	}

	async fn sleep(
		&self,
		run: &RunContext,
		timer_id: &str,
		duration: Duration,
	) -> Result<(), StepFailure> {
		if let Some(outcome) = self.journal.get(&run.run_id, timer_id) {
			debug!(parent: &run.span, timer_id = %timer_id, "replaying recorded timer");
			return outcome.map(|_| ());
		}

		debug!(parent: &run.span, timer_id = %timer_id, duration_ms = duration_millis(duration), "sleeping");
		tokio::select! {
			biased;
			_ = run.cancellation_token.cancelled() => {
				return Err(StepFailure::new(timer_id, 1, StepError::Cancelled));
			}
			_ = tokio::time::sleep(duration) => {}
		}

		self.journal.record(&run.run_id, timer_id, Ok(Value::Null));
		Ok(())
	}

	fn recorded(&self, run_id: &str, step_id: &str) -> Option<StepOutcome> {
		self.journal.get(run_id, step_id)
	}
}
