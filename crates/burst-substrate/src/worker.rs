// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use crate::activity::Activity;

/// A set of activities served on one channel.
#[derive(Clone)]
pub struct Worker {
	channel: String,
	activities: HashMap<String, Arc<dyn Activity>>,
}

impl Worker {
	pub fn new(channel: impl Into<String>) -> Self {
		Self {
			channel: channel.into(),
			activities: HashMap::new(),
		}
	}

	/// Register an activity under its own name. A later registration with the
	/// same name replaces the earlier one.
	pub fn register(mut self, activity: impl Activity + 'static) -> Self {
		self.register_arc(Arc::new(activity));
		self
	}

	pub fn register_arc(&mut self, activity: Arc<dyn Activity>) {
		self.activities.insert(activity.name().to_string(), activity);
	}

	pub fn channel(&self) -> &str {
		&self.channel
	}

	pub fn activity(&self, name: &str) -> Option<Arc<dyn Activity>> {
		self.activities.get(name).cloned()
	}

	pub fn activity_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.activities.keys().cloned().collect();
		names.sort();
		names
	}
}

impl std::fmt::Debug for Worker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Worker")
			.field("channel", &self.channel)
			.field("activities", &self.activity_names())
			.finish()
	}
}
