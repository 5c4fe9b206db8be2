// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Logbench CLI
//!
//! Finds the highest generation rate a generator → agent → receiver log
//! pipeline sustains, by ramping and then bisecting the rate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Logbench - log forwarding pipeline throughput search
#[derive(Parser)]
#[command(name = "logbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "logbench.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for the highest sustainable rate
    Run(commands::run::RunArgs),

    /// Run a single measurement window at a fixed rate
    Measure {
        /// Generation rate in messages per second
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        rate: u64,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; progress goes to stdout, logs to stderr
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        None => commands::run::execute(&cli.config, commands::run::RunArgs::default()).await,
        Some(Commands::Run(args)) => commands::run::execute(&cli.config, args).await,
        Some(Commands::Measure { rate }) => commands::measure::execute(&cli.config, rate).await,
        Some(Commands::Validate { file }) => commands::validate::execute(&file).await,
    }
}
