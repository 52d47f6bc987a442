// Copyright 2024 Chronicle Labs
// SPDX-License-Identifier: Apache-2.0

//! Command-line flags for the demo binary, grounded on the teacher's
//! `bin/inx-chronicle/src/cli.rs`.

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[clap(author, version, about = "Demonstrates the nursery scope API")]
pub struct ClArgs {
    /// Path to a TOML config file.
    #[clap(short, long)]
    pub config: Option<String>,

    /// Overrides the number of demo workers to spawn.
    #[clap(long, env = "NURSERY_WORKER_COUNT")]
    pub worker_count: Option<u32>,

    /// Overrides the configured log level.
    #[clap(long, env = "NURSERY_LOG_LEVEL")]
    pub log_level: Option<String>,
}
