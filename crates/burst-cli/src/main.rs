// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! burst command line.

mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => burst_config::load_config_with_file(path),
		None => burst_config::load_config(),
	}
	.context("failed to load configuration")?;

	logging::init(&config.logging);

	match args.command {
		Command::Run(run) => {
			commands::run(&config, run).await?;
		}
		Command::Status { app_id } => {
			let status = commands::status(&config, &app_id).await?;
			println!("{app_id}: {status}");
		}
		Command::Cleanup { app_id } => {
			commands::cleanup(&config, &app_id).await?;
			println!("deleted {app_id}");
		}
	}

	Ok(())
}
