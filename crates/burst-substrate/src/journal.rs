// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Memoized step outcomes keyed by `(run_id, step_id)`.
//!
//! Re-executing a run against the same journal replays recorded outcomes
//! instead of running the activity again. Cancellations are never recorded,
//! so a resumed run picks up where the cancelled one stopped.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::error::StepFailure;

pub type StepOutcome = Result<Value, StepFailure>;

#[derive(Debug, Default)]
pub struct StepJournal {
	entries: Mutex<HashMap<(String, String), StepOutcome>>,
}

impl StepJournal {
	pub fn new() -> Self {
		Self::default()
	}

	fn entries(&self) -> MutexGuard<'_, HashMap<(String, String), StepOutcome>> {
		self.entries.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn get(&self, run_id: &str, step_id: &str) -> Option<StepOutcome> {
		self.entries()
			.get(&(run_id.to_string(), step_id.to_string()))
			.cloned()
	}

	/// Record a terminal outcome. Returns `false` without overwriting if the
	/// step already has one, or if the outcome is a cancellation.
	pub fn record(&self, run_id: &str, step_id: &str, outcome: StepOutcome) -> bool {
		if matches!(&outcome, Err(failure) if failure.is_cancelled()) {
			return false;
		}
		let mut entries = self.entries();
		let key = (run_id.to_string(), step_id.to_string());
		if entries.contains_key(&key) {
			return false;
		}
		entries.insert(key, outcome);
		true
	}

	/// Step ids recorded for a run, sorted.
	pub fn steps(&self, run_id: &str) -> Vec<String> {
		let mut steps: Vec<String> = self
			.entries()
			.keys()
			.filter(|(run, _)| run == run_id)
			.map(|(_, step)| step.clone())
			.collect();
		steps.sort();
		steps
	}

	pub fn forget_run(&self, run_id: &str) {
		self.entries().retain(|(run, _), _| run != run_id);
	}

	pub fn len(&self) -> usize {
		self.entries().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries().is_empty()
	}
}
