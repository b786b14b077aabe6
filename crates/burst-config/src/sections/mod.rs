// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod logging;
mod orchestration;
mod provider;
pub mod substrate;

pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use orchestration::{OrchestrationConfig, OrchestrationConfigLayer};
pub use provider::{ProviderConfig, ProviderConfigLayer};
pub use substrate::{SubstrateConfig, SubstrateConfigLayer};
