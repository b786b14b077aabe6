// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic liveness signalling for long blocking steps.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::context::StepContext;
use crate::policy::duration_millis;

/// Background task recording a heartbeat on a derived context every interval.
///
/// The first signal fires one interval after start. Stopping is idempotent
/// and also happens on drop or when the parent context is cancelled.
pub struct HeartbeatTicker {
	ctx: StepContext,
	stopped: Arc<Mutex<bool>>,
	handle: Option<JoinHandle<()>>,
}

/// Start a ticker on a context derived from `parent`.
pub fn start_heartbeat(parent: &StepContext, interval: Duration) -> HeartbeatTicker {
	let ctx = parent.derive();
	let stopped = Arc::new(Mutex::new(false));

	let task_ctx = ctx.clone();
	let task_stopped = Arc::clone(&stopped);
	let handle = tokio::spawn(async move {
		let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		tracing::debug!(parent: &task_ctx.span, interval_ms = duration_millis(interval), "heartbeat ticker started");

		loop {
			tokio::select! {
				_ = task_ctx.cancelled() => break,
				_ = ticker.tick() => {
					// Recording happens under the lock so `stop` can't return mid-signal.
					match task_stopped.lock() {
						Ok(stopped) if !*stopped => task_ctx.record_heartbeat(),
						_ => break,
					}
				}
			}
		}

		tracing::debug!(parent: &task_ctx.span, "heartbeat ticker stopped");
	});

	HeartbeatTicker {
		ctx,
		stopped,
		handle: Some(handle),
	}
}

impl HeartbeatTicker {
	/// The derived context the ticker signals on.
	pub fn context(&self) -> &StepContext {
		&self.ctx
	}

	pub fn stop(&mut self) {
		match self.stopped.lock() {
			Ok(mut stopped) => *stopped = true,
			Err(poisoned) => *poisoned.into_inner() = true,
		}
		self.ctx.cancellation_token.cancel();
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}

	pub fn is_stopped(&self) -> bool {
		self.handle.is_none()
	}
}

impl Drop for HeartbeatTicker {
	fn drop(&mut self) {
		self.stop();
	}
}
