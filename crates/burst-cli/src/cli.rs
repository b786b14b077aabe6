// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// burst - run a unit of work on a freshly provisioned, short-lived worker.
#[derive(Parser, Debug)]
#[command(name = "burst", about = "Ephemeral worker lifecycle orchestrator", version)]
pub struct Args {
	/// Configuration file (defaults to /etc/burst/burst.toml)
	#[arg(long, global = true, env = "BURST_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Provision a worker, run the long-running command on it, tear it down
	Run(RunArgs),
	/// Show the deployment status of an app
	Status {
		/// Provider app id
		app_id: String,
	},
	/// Delete an app left behind by an interrupted run
	Cleanup {
		/// Provider app id
		app_id: String,
	},
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
	/// Container registry name
	#[arg(long)]
	pub registry: String,

	/// Image repository within the registry
	#[arg(long)]
	pub repository: String,

	/// Image tag
	#[arg(long)]
	pub tag: String,

	/// Use the in-memory provider and attach a local worker. Required, since
	/// the substrate runs in this process and a hosted worker cannot reach it
	#[arg(long)]
	pub simulate: bool,
}
