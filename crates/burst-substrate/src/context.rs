// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Context for one orchestration run.
///
/// Cancelling `cancellation_token` propagates to every in-flight step and
/// substrate sleep of the run.
#[derive(Debug, Clone)]
pub struct RunContext {
	pub run_id: String,
	pub cancellation_token: CancellationToken,
	pub span: Span,
}

impl RunContext {
	pub fn new(run_id: impl Into<String>) -> Self {
		let run_id = run_id.into();
		let span = tracing::info_span!("run", run_id = %run_id);
		Self {
			run_id,
			cancellation_token: CancellationToken::new(),
			span,
		}
	}

	/// Fresh run id from a v4 UUID.
	pub fn generate() -> Self {
		Self::new(uuid::Uuid::new_v4().to_string())
	}

	/// Same run, but not tied to the run's cancellation. Used for steps that
	/// must still execute after the run was cancelled.
	pub fn detached(&self) -> Self {
		Self {
			run_id: self.run_id.clone(),
			cancellation_token: CancellationToken::new(),
			span: self.span.clone(),
		}
	}

	pub fn cancel(&self) {
		self.cancellation_token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}
}

/// Receiving side of an attempt's liveness signals.
#[derive(Debug, Default)]
pub struct HeartbeatSink {
	notify: Notify,
	count: AtomicU64,
}

impl HeartbeatSink {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	fn record(&self) {
		self.count.fetch_add(1, Ordering::SeqCst);
		self.notify.notify_one();
	}

	pub fn count(&self) -> u64 {
		self.count.load(Ordering::SeqCst)
	}

	/// Resolves on the next liveness signal, or immediately if one arrived
	/// since the last call.
	pub async fn next(&self) {
		self.notify.notified().await;
	}
}

/// Context handed to an activity for one attempt of a step.
#[derive(Debug, Clone)]
pub struct StepContext {
	pub run_id: String,
	pub step_id: String,
	pub activity: String,
	/// 1-based attempt number.
	pub attempt: u32,
	pub cancellation_token: CancellationToken,
	pub span: Span,
	heartbeats: Arc<HeartbeatSink>,
}

impl StepContext {
	pub fn new(
		run_id: impl Into<String>,
		step_id: impl Into<String>,
		activity: impl Into<String>,
		attempt: u32,
		cancellation_token: CancellationToken,
		heartbeats: Arc<HeartbeatSink>,
	) -> Self {
		let run_id = run_id.into();
		let step_id = step_id.into();
		let activity = activity.into();
		let span = tracing::info_span!(
			"step",
			run_id = %run_id,
			step_id = %step_id,
			activity = %activity,
			attempt
		);
		Self {
			run_id,
			step_id,
			activity,
			attempt,
			cancellation_token,
			span,
			heartbeats,
		}
	}

	/// A context outside any substrate, for direct calls and tests.
	pub fn standalone(run_id: impl Into<String>, step_id: impl Into<String>) -> Self {
		let step_id = step_id.into();
		Self::new(
			run_id,
			step_id.clone(),
			step_id,
			1,
			CancellationToken::new(),
			HeartbeatSink::new(),
		)
	}

	/// Record a liveness signal. Ignored once this context is cancelled.
	pub fn record_heartbeat(&self) {
		if self.cancellation_token.is_cancelled() {
			return;
		}
		tracing::trace!(parent: &self.span, "heartbeat");
		self.heartbeats.record();
	}

	/// Number of liveness signals recorded for this attempt so far.
	pub fn heartbeat_count(&self) -> u64 {
		self.heartbeats.count()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancellation_token.is_cancelled()
	}

	pub async fn cancelled(&self) {
		self.cancellation_token.cancelled().await
	}

	/// Context sharing this attempt's heartbeat channel with a child
	/// cancellation token. Cancelling the child leaves this context alone.
	pub fn derive(&self) -> Self {
		Self {
			run_id: self.run_id.clone(),
			step_id: self.step_id.clone(),
			activity: self.activity.clone(),
			attempt: self.attempt,
			cancellation_token: self.cancellation_token.child_token(),
			span: self.span.clone(),
			heartbeats: Arc::clone(&self.heartbeats),
		}
	}
}
