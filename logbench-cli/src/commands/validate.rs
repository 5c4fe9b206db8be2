// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `logbench validate` command - Validate configuration file.

use std::path::Path;

use logbench_core::{Config, ConfigLoader, ForwarderConfig};

pub async fn execute(file: &Path) -> anyhow::Result<()> {
    tracing::info!(file = %file.display(), "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            print_summary(&config);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn print_summary(config: &Config) {
    let generator = &config.generator;
    println!();
    println!("Generator ({}):", generator.name);
    println!("  Command:        {}", generator.command.join(" "));
    println!("  Config:         {}", generator.config.display());
    println!(
        "  Stop polling:   every {}ms, {}",
        generator.stop_poll_interval.as_millis(),
        generator
            .stop_max_attempts
            .map_or_else(|| "until confirmed".to_string(), |n| format!("at most {} attempts", n))
    );

    print_forwarder("Agent", &config.agent);
    print_forwarder("Receiver", &config.receiver);

    println!();
    println!("Measurement:");
    println!("  Window:         {}s", config.measurement.window.as_secs());
    println!("  Marker plugin:  {}", config.measurement.marker_plugin);
    println!("  Missing marker: {:?}", config.measurement.on_missing_marker);

    println!();
    println!("Search:");
    println!("  Initial rate:   {} messages/s", config.search.initial_rate);
    println!("  Growth factor:  {}", config.search.growth_factor);
    println!("  Tolerance:      1/{} of the first bracket", config.search.tolerance_divisor);

    if !config.remove_files.is_empty() {
        println!();
        println!("Removed before run ({}):", config.remove_files.len());
        for path in &config.remove_files {
            println!("  - {}", path.display());
        }
    }

    if let Some(dir) = &config.report_dir {
        println!();
        println!("Reports: {}", dir.display());
    }
}

fn print_forwarder(label: &str, forwarder: &ForwarderConfig) {
    println!();
    println!("{}:", label);
    println!("  Command:        {}", forwarder.command.join(" "));
    println!("  Config:         {}", forwarder.config.display());
    if !forwarder.environment.is_empty() {
        let mut keys: Vec<_> = forwarder.environment.keys().collect();
        keys.sort();
        println!("  Environment:    {}", keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "));
    }
}
