// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Orchestration timing and retry configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationConfigLayer {
	pub heartbeat_timeout_secs: Option<u64>,
	pub start_to_close_secs: Option<u64>,
	pub schedule_to_start_secs: Option<u64>,
	pub poll_interval_secs: Option<u64>,
	pub pause_secs: Option<u64>,
	pub work_duration_secs: Option<u64>,
	pub initial_interval_ms: Option<u64>,
	pub backoff_coefficient: Option<f64>,
	pub max_interval_secs: Option<u64>,
	pub max_attempts: Option<u32>,
}

impl OrchestrationConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.heartbeat_timeout_secs.is_some() {
			self.heartbeat_timeout_secs = other.heartbeat_timeout_secs;
		}
		if other.start_to_close_secs.is_some() {
			self.start_to_close_secs = other.start_to_close_secs;
		}
		if other.schedule_to_start_secs.is_some() {
			self.schedule_to_start_secs = other.schedule_to_start_secs;
		}
		if other.poll_interval_secs.is_some() {
			self.poll_interval_secs = other.poll_interval_secs;
		}
		if other.pause_secs.is_some() {
			self.pause_secs = other.pause_secs;
		}
		if other.work_duration_secs.is_some() {
			self.work_duration_secs = other.work_duration_secs;
		}
		if other.initial_interval_ms.is_some() {
			self.initial_interval_ms = other.initial_interval_ms;
		}
		if other.backoff_coefficient.is_some() {
			self.backoff_coefficient = other.backoff_coefficient;
		}
		if other.max_interval_secs.is_some() {
			self.max_interval_secs = other.max_interval_secs;
		}
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
	}

	pub fn finalize(self) -> Result<OrchestrationConfig, ConfigError> {
		let defaults = OrchestrationConfig::default();
		let config = OrchestrationConfig {
			heartbeat_timeout_secs: self
				.heartbeat_timeout_secs
				.unwrap_or(defaults.heartbeat_timeout_secs),
			start_to_close_secs: self
				.start_to_close_secs
				.unwrap_or(defaults.start_to_close_secs),
			schedule_to_start_secs: self.schedule_to_start_secs,
			poll_interval_secs: self
				.poll_interval_secs
				.unwrap_or(defaults.poll_interval_secs),
			pause_secs: self.pause_secs.unwrap_or(defaults.pause_secs),
			work_duration_secs: self
				.work_duration_secs
				.unwrap_or(defaults.work_duration_secs),
			initial_interval_ms: self
				.initial_interval_ms
				.unwrap_or(defaults.initial_interval_ms),
			backoff_coefficient: self
				.backoff_coefficient
				.unwrap_or(defaults.backoff_coefficient),
			max_interval_secs: self.max_interval_secs.unwrap_or(defaults.max_interval_secs),
			max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
		};
		config.validate()?;
		Ok(config)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationConfig {
	pub heartbeat_timeout_secs: u64,
	pub start_to_close_secs: u64,
	pub schedule_to_start_secs: Option<u64>,
	pub poll_interval_secs: u64,
	pub pause_secs: u64,
	pub work_duration_secs: u64,
	pub initial_interval_ms: u64,
	pub backoff_coefficient: f64,
	pub max_interval_secs: u64,
	pub max_attempts: u32,
}

impl Default for OrchestrationConfig {
	fn default() -> Self {
		Self {
			heartbeat_timeout_secs: 10,
			start_to_close_secs: 3600,
			schedule_to_start_secs: None,
			poll_interval_secs: 5,
			pause_secs: 5,
			work_duration_secs: 60,
			initial_interval_ms: 1000,
			backoff_coefficient: 2.0,
			max_interval_secs: 30,
			max_attempts: 5,
		}
	}
}

impl OrchestrationConfig {
	pub fn heartbeat_timeout(&self) -> Duration {
		Duration::from_secs(self.heartbeat_timeout_secs)
	}

	pub fn start_to_close(&self) -> Duration {
		Duration::from_secs(self.start_to_close_secs)
	}

	pub fn schedule_to_start(&self) -> Option<Duration> {
		self.schedule_to_start_secs.map(Duration::from_secs)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval_secs)
	}

	pub fn pause(&self) -> Duration {
		Duration::from_secs(self.pause_secs)
	}

	pub fn work_duration(&self) -> Duration {
		Duration::from_secs(self.work_duration_secs)
	}

	pub fn initial_interval(&self) -> Duration {
		Duration::from_millis(self.initial_interval_ms)
	}

	pub fn max_interval(&self) -> Duration {
		Duration::from_secs(self.max_interval_secs)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
			key: format!("orchestration.{key}"),
			message: message.to_string(),
		};

		// Heartbeating steps tick at half of this.
		if self.heartbeat_timeout_secs < 2 {
			return Err(invalid("heartbeat_timeout_secs", "must be at least 2"));
		}
		if self.start_to_close_secs == 0 {
			return Err(invalid("start_to_close_secs", "must be greater than zero"));
		}
		if self.poll_interval_secs == 0 {
			return Err(invalid("poll_interval_secs", "must be greater than zero"));
		}
		if self.max_attempts == 0 {
			return Err(invalid("max_attempts", "must be at least 1"));
		}
		if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
			return Err(invalid("backoff_coefficient", "must be a finite value >= 1.0"));
		}
		if self.initial_interval() > self.max_interval() {
			return Err(invalid(
				"initial_interval_ms",
				"must not exceed max_interval_secs",
			));
		}
		Ok(())
	}
}
