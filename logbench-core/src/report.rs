// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON report generation for rate searches.
//!
//! Each finished search is saved to a timestamped JSON file together with the
//! host it ran on, so runs on different machines can be compared later.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use crate::config::{Config, SearchConfig};
use crate::error::ReportError;
use crate::search::SearchOutcome;

/// Host the pipeline ran on.
///
/// Load averages are sampled when the report is built; a busy host skews
/// every measurement of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: Option<String>,
    /// e.g. "Linux (Debian 12)"
    pub os: Option<String>,
    pub kernel: Option<String>,
    pub cpus: usize,
    pub memory_mib: u64,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
}

impl HostInfo {
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();
        let load = System::load_average();

        Self {
            hostname: System::host_name(),
            os: System::long_os_version(),
            kernel: System::kernel_version(),
            cpus: sys.cpus().len(),
            memory_mib: sys.total_memory() / (1024 * 1024),
            load_average: [load.one, load.five, load.fifteen],
        }
    }
}

/// Measurement settings recorded alongside the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub window_secs: u64,
    pub marker_plugin: String,
    pub search: SearchConfig,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            window_secs: config.measurement.window.as_secs(),
            marker_plugin: config.measurement.marker_plugin.clone(),
            search: config.search,
        }
    }
}

/// One complete search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub tool: String,
    pub version: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub host: HostInfo,
    pub settings: RunSettings,
    pub outcome: SearchOutcome,
}

impl SearchReport {
    /// Build a report for a search that started at `started_at` and just
    /// finished.
    pub fn new(settings: RunSettings, started_at: DateTime<Utc>, outcome: SearchOutcome) -> Self {
        Self {
            tool: "logbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            host: HostInfo::collect(),
            settings,
            outcome,
        }
    }
}

/// JSON reporter for search results.
#[derive(Debug)]
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a reporter writing into `output_dir`, creating it if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Save a report as `rate_search_<timestamp>_<run>.json`, where `<run>`
    /// is the first 8 hex digits of the run id.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &SearchReport) -> Result<PathBuf, ReportError> {
        let timestamp = report.finished_at.format("%Y-%m-%dT%H-%M-%SZ");
        let run = report.run_id.simple().to_string();
        let filepath = self
            .output_dir
            .join(format!("rate_search_{}_{}.json", timestamp, &run[..8]));

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(path = %filepath.display(), run_id = %report.run_id, "Saved report");
        Ok(filepath)
    }

    /// List report files in the output directory, oldest first.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReportError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("rate_search_") && n.ends_with(".json"))
                .unwrap_or(false);
            if is_report {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Load an existing report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<SearchReport, ReportError> {
        let file = File::open(path)?;
        let report = serde_json::from_reader(file)?;
        Ok(report)
    }
}
