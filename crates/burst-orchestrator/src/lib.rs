// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ephemeral worker lifecycle orchestration for burst.
//!
//! A [`LifecycleOrchestrator`] run creates a hosted worker, waits for it to
//! become ready, hands it the long-running command on its own channel and
//! always deletes it afterwards. Provisioning runs as activities on the
//! orchestrator's channel ([`provisioning_worker`]); the command runs on the
//! ephemeral worker ([`external_worker`]).

pub mod activities;
pub mod error;
pub mod external;
pub mod lifecycle;

pub use activities::{
	provisioning_worker, AwaitReadyActivity, AwaitReadyInput, CreateActivity, DeleteActivity,
	DeleteInput, AWAIT_READY_ACTIVITY, CREATE_ACTIVITY, DELETE_ACTIVITY,
};
pub use error::OrchestrationError;
pub use external::{
	external_channel, external_worker, LongRunningCommand, LongRunningCommandInput,
	LongRunningCommandOutput, DEFAULT_EXTERNAL_TASK_QUEUE, LONG_RUNNING_COMMAND_ACTIVITY,
};
pub use lifecycle::{
	start_orchestration, CleanupOutcome, LifecycleOrchestrator, LifecycleState, OrchestratorSettings,
	RunHandle, RunReport, DISPATCH_STEP, POST_WORK_PAUSE_TIMER, PRE_WORK_PAUSE_TIMER,
};
