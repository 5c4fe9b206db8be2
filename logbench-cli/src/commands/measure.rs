// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `logbench measure` command - One measurement window at a fixed rate.

use std::path::Path;

use logbench_core::process::ProcessRegistry;
use logbench_core::{remove_stale_files, Benchmarker, ConfigLoader, Rate, ThroughputProbe};

pub async fn execute(config_path: &Path, rate: u64) -> anyhow::Result<()> {
    let rate = Rate::new(rate)?;
    let config = ConfigLoader::load_file(config_path)?;
    remove_stale_files(&config.remove_files)?;

    // Listen before anything is spawned so no signal can orphan a forwarder
    let mut signals = super::ShutdownSignals::install()?;
    let registry = ProcessRegistry::new_shared();
    let mut bench = Benchmarker::launch(&config, Some(registry.clone()))?;

    println!(
        "benchmarking with the rate: {} messages/s... ({}s)",
        rate,
        bench.window().as_secs()
    );

    let measure = tokio::task::spawn_blocking(move || {
        let result = bench.measure_throughput(rate);
        (bench, result)
    });

    let (bench, result) = tokio::select! {
        joined = measure => joined?,
        signal = signals.recv() => super::interrupt(signal, &registry, &config.generator),
    };

    let sample = match result {
        Ok(sample) => sample,
        Err(e) => {
            if let Err(shutdown) = bench.shutdown() {
                tracing::warn!(error = %shutdown, "Forwarder shutdown failed");
            }
            return Err(e.into());
        }
    };
    bench.shutdown()?;

    println!("  => {} lines/s", sample);
    Ok(())
}
