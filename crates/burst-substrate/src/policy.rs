// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry policy and per-step execution options.

use std::time::Duration;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff schedule for step attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
	pub initial_interval: Duration,
	pub backoff_coefficient: f64,
	pub max_interval: Duration,
	/// Total attempts, including the first.
	pub max_attempts: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			initial_interval: Duration::from_secs(1),
			backoff_coefficient: 2.0,
			max_interval: Duration::from_secs(30),
			max_attempts: 5,
		}
	}
}

impl RetryPolicy {
	/// A policy that never retries.
	pub fn single_attempt() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	/// Delay before retry `n` (1-based): `min(initial * coefficient^(n-1), max)`.
	pub fn delay_for_retry(&self, retry: u32) -> Duration {
		if retry == 0 {
			return Duration::ZERO;
		}
		let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
		let delay = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
		let capped = delay.min(self.max_interval.as_secs_f64());
		Duration::from_secs_f64(capped.max(0.0))
	}
}

/// Supervision settings applied to every attempt of a step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOptions {
	/// Upper bound for a single attempt.
	pub start_to_close_timeout: Duration,
	/// Maximum gap between liveness signals. `None` disables the watchdog.
	pub heartbeat_timeout: Option<Duration>,
	/// How long to wait for a worker on the target channel. Falls back to
	/// `start_to_close_timeout` when unset.
	pub schedule_to_start_timeout: Option<Duration>,
	pub retry_policy: RetryPolicy,
}

impl Default for StepOptions {
	fn default() -> Self {
		Self {
			start_to_close_timeout: Duration::from_secs(60 * 60),
			heartbeat_timeout: Some(Duration::from_secs(10)),
			schedule_to_start_timeout: None,
			retry_policy: RetryPolicy::default(),
		}
	}
}

impl StepOptions {
	pub fn schedule_to_start_bound(&self) -> Duration {
		self.schedule_to_start_timeout
			.unwrap_or(self.start_to_close_timeout)
	}
}
