// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `logbench run` command - Search for the highest sustainable rate.
//!
//! Launches both forwarders, runs the rate search on a blocking thread and
//! races it against SIGINT, SIGTERM and SIGHUP.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::Args;

use logbench_core::process::ProcessRegistry;
use logbench_core::report::RunSettings;
use logbench_core::search::{Measurement, Phase};
use logbench_core::{
    remove_stale_files, Benchmarker, Config, ConfigLoader, JsonReporter, Rate, RateSearch,
    SearchObserver, SearchReport, Termination,
};

/// Overrides for the run configuration.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Write a JSON report into this directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Measurement window in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub window_secs: Option<u64>,

    /// Generator configuration file
    #[arg(long)]
    pub generator_config: Option<PathBuf>,

    /// Agent forwarder configuration file
    #[arg(long)]
    pub agent_config: Option<PathBuf>,

    /// Receiver forwarder configuration file
    #[arg(long)]
    pub receiver_config: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if let Some(dir) = self.report_dir {
            config.report_dir = Some(dir);
        }
        if let Some(secs) = self.window_secs {
            config.measurement.window = Duration::from_secs(secs);
        }
        if let Some(path) = self.generator_config {
            config.generator.config = path;
        }
        if let Some(path) = self.agent_config {
            config.agent.config = path;
        }
        if let Some(path) = self.receiver_config {
            config.receiver.config = path;
        }
    }
}

/// Prints one line before and one after every measurement.
struct ConsoleObserver {
    window: Duration,
}

impl SearchObserver for ConsoleObserver {
    fn before_measure(&mut self, rate: Rate, _phase: Phase) {
        println!(
            "benchmarking with the rate: {} messages/s... ({}s)",
            rate,
            self.window.as_secs()
        );
    }

    fn after_measure(&mut self, measurement: &Measurement) {
        println!("  => {} lines/s", measurement.sample);
    }
}

pub async fn execute(config_path: &Path, args: RunArgs) -> anyhow::Result<()> {
    tracing::info!(config = %config_path.display(), "Starting rate search");

    let mut config = ConfigLoader::load_file(config_path)?;
    args.apply(&mut config);

    remove_stale_files(&config.remove_files)?;

    // Listen before anything is spawned so no signal can orphan a forwarder
    let mut signals = super::ShutdownSignals::install()?;
    let registry = ProcessRegistry::new_shared();
    let bench = Benchmarker::launch(&config, Some(registry.clone()))?;

    let search_config = config.search;
    let mut observer = ConsoleObserver {
        window: bench.window(),
    };
    let started_at = Utc::now();

    let search = tokio::task::spawn_blocking(move || {
        let mut bench = bench;
        let result = RateSearch::new(search_config).run(&mut bench, &mut observer);
        (bench, result)
    });

    let (bench, result) = tokio::select! {
        joined = search => joined?,
        signal = signals.recv() => super::interrupt(signal, &registry, &config.generator),
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Rate search failed");
            if let Err(shutdown) = bench.shutdown() {
                tracing::warn!(error = %shutdown, "Forwarder shutdown failed");
            }
            return Err(e.into());
        }
    };

    bench.shutdown()?;

    if let Termination::UnexpectedResult { rate, sample } = outcome.termination {
        println!(
            "search stopped early: {} messages/s gave {} lines/s, worse than both ends",
            rate, sample
        );
    }
    println!(
        "best result: {} lines/s (under {} messages/s)",
        outcome.best.sample, outcome.best.rate
    );

    if let Some(dir) = &config.report_dir {
        let report = SearchReport::new(RunSettings::from(&config), started_at, outcome);
        let path = JsonReporter::new(dir)?.save(&report)?;
        println!("Report saved to: {}", path.display());
    }

    Ok(())
}
