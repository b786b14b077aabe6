// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable step execution for burst.
//!
//! This crate provides:
//! - The [`Substrate`] contract: execute a step with retry, timeout and
//!   heartbeat supervision, route it to a named channel, and pause a run
//! - [`Activity`] and [`Worker`] for serving steps on a channel
//! - [`start_heartbeat`], a cancellable liveness ticker for blocking steps
//! - [`LocalSubstrate`], an in-process implementation with a [`StepJournal`]
//!   that memoizes step outcomes for replay

pub mod activity;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod journal;
pub mod local;
pub mod policy;
pub mod substrate;
pub mod worker;

pub use activity::{decode_input, encode_output, Activity};
pub use context::{HeartbeatSink, RunContext, StepContext};
pub use error::{ActivityError, StepError, StepFailure};
pub use heartbeat::{start_heartbeat, HeartbeatTicker};
pub use journal::{StepJournal, StepOutcome};
pub use local::LocalSubstrate;
pub use policy::{duration_millis, RetryPolicy, StepOptions};
pub use substrate::{execute_typed, StepRequest, Substrate};
pub use worker::Worker;
