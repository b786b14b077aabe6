// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The mergeable, partially specified form of [`crate::BurstConfig`].

use serde::{Deserialize, Serialize};

use crate::sections::{
	LoggingConfigLayer, OrchestrationConfigLayer, ProviderConfigLayer, SubstrateConfigLayer,
};

/// One configuration layer as produced by a single source. Later layers
/// override earlier ones field by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BurstConfigLayer {
	pub logging: Option<LoggingConfigLayer>,
	pub substrate: Option<SubstrateConfigLayer>,
	pub provider: Option<ProviderConfigLayer>,
	pub orchestration: Option<OrchestrationConfigLayer>,
}

impl BurstConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.substrate, other.substrate, SubstrateConfigLayer::merge);
		merge_section(&mut self.provider, other.provider, ProviderConfigLayer::merge);
		merge_section(
			&mut self.orchestration,
			other.orchestration,
			OrchestrationConfigLayer::merge,
		);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}
