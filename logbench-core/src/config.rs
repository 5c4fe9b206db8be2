// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! The run configuration names the generator and forwarder commands, their
//! opaque config files, and the measurement and search parameters.
//! Any invalid field results in a HardValidationError that prevents startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::marker::DEFAULT_MARKER_PLUGIN;
use crate::types::Rate;

/// Longest measurement window accepted.
const MAX_WINDOW_SECS: u64 = 3600;

/// Raw generator configuration as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawGeneratorConfig {
    #[serde(default = "default_generator_command")]
    command: Vec<String>,
    config: String,
    #[serde(default = "default_generator_name")]
    name: String,
    #[serde(default = "default_stop_poll_interval_ms")]
    stop_poll_interval_ms: u64,
    #[serde(default)]
    stop_max_attempts: Option<u32>,
    #[serde(default)]
    environment: HashMap<String, String>,
}

fn default_generator_command() -> Vec<String> {
    vec!["bundle".into(), "exec".into(), "dummer".into()]
}

fn default_generator_name() -> String {
    "Dummer".to_string()
}

fn default_stop_poll_interval_ms() -> u64 {
    1000
}

/// Raw forwarder configuration.
#[derive(Debug, Deserialize)]
struct RawForwarderConfig {
    #[serde(default = "default_forwarder_command")]
    command: Vec<String>,
    config: String,
    #[serde(default)]
    environment: HashMap<String, String>,
}

fn default_forwarder_command() -> Vec<String> {
    vec!["bundle".into(), "exec".into(), "fluentd".into()]
}

/// Raw measurement configuration.
#[derive(Debug, Deserialize)]
struct RawMeasurementConfig {
    #[serde(default = "default_window_secs")]
    window_secs: u64,
    #[serde(default = "default_marker_plugin")]
    marker_plugin: String,
    #[serde(default)]
    on_missing_marker: MissingMarkerPolicy,
}

fn default_window_secs() -> u64 {
    5
}

fn default_marker_plugin() -> String {
    DEFAULT_MARKER_PLUGIN.to_string()
}

impl Default for RawMeasurementConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            marker_plugin: default_marker_plugin(),
            on_missing_marker: MissingMarkerPolicy::default(),
        }
    }
}

/// Raw search configuration.
#[derive(Debug, Deserialize)]
struct RawSearchConfig {
    #[serde(default = "default_initial_rate")]
    initial_rate: u64,
    #[serde(default = "default_growth_factor")]
    growth_factor: u64,
    #[serde(default = "default_tolerance_divisor")]
    tolerance_divisor: u64,
}

fn default_initial_rate() -> u64 {
    1000
}

fn default_growth_factor() -> u64 {
    10
}

fn default_tolerance_divisor() -> u64 {
    10 // stop once the step is under 10% of the first bracket
}

impl Default for RawSearchConfig {
    fn default() -> Self {
        Self {
            initial_rate: default_initial_rate(),
            growth_factor: default_growth_factor(),
            tolerance_divisor: default_tolerance_divisor(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawCleanupConfig {
    #[serde(default)]
    remove_files: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawReportConfig {
    #[serde(default)]
    dir: Option<String>,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    generator: RawGeneratorConfig,
    agent: RawForwarderConfig,
    receiver: RawForwarderConfig,
    #[serde(default)]
    measurement: RawMeasurementConfig,
    #[serde(default)]
    search: RawSearchConfig,
    #[serde(default)]
    cleanup: RawCleanupConfig,
    #[serde(default)]
    report: RawReportConfig,
}

/// What a measurement reports when the receiver printed no counter marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMarkerPolicy {
    /// Treat the window as zero delivered lines.
    #[default]
    Zero,
    /// Abort the run with `NoThroughputData`.
    Fail,
}

/// Validated generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Program followed by its prefix arguments.
    pub command: Vec<String>,
    pub config: PathBuf,
    /// Name printed by the generator in its stop status line.
    pub name: String,
    pub stop_poll_interval: Duration,
    /// None polls until the stop is confirmed.
    pub stop_max_attempts: Option<u32>,
    pub environment: HashMap<String, String>,
}

/// Validated forwarder configuration.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub command: Vec<String>,
    pub config: PathBuf,
    pub environment: HashMap<String, String>,
}

/// Validated measurement configuration.
#[derive(Debug, Clone)]
pub struct MeasurementConfig {
    pub window: Duration,
    pub marker_plugin: String,
    pub on_missing_marker: MissingMarkerPolicy,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(default_window_secs()),
            marker_plugin: default_marker_plugin(),
            on_missing_marker: MissingMarkerPolicy::default(),
        }
    }
}

/// Validated search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub initial_rate: Rate,
    pub growth_factor: u64,
    pub tolerance_divisor: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_rate: Rate::new_unchecked(default_initial_rate()),
            growth_factor: default_growth_factor(),
            tolerance_divisor: default_tolerance_divisor(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub agent: ForwarderConfig,
    pub receiver: ForwarderConfig,
    pub measurement: MeasurementConfig,
    pub search: SearchConfig,
    /// Files deleted before the first measurement.
    pub remove_files: Vec<PathBuf>,
    pub report_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve every relative path against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.generator.config);
        resolve(&mut self.agent.config);
        resolve(&mut self.receiver.config);
        self.remove_files.iter_mut().for_each(resolve);
        if let Some(dir) = self.report_dir.as_mut() {
            resolve(dir);
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    /// Relative paths inside the file are resolved against its directory.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        let mut config = Self::load_string(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> BenchResult<Config> {
        let generator = Self::validate_generator(raw.generator)?;
        let agent = Self::validate_forwarder(raw.agent, "agent")?;
        let receiver = Self::validate_forwarder(raw.receiver, "receiver")?;
        let measurement = Self::validate_measurement(raw.measurement)?;
        let search = Self::validate_search(raw.search)?;

        let remove_files = raw
            .cleanup
            .remove_files
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect();

        Ok(Config {
            generator,
            agent,
            receiver,
            measurement,
            search,
            remove_files,
            report_dir: raw.report.dir.filter(|d| !d.is_empty()).map(PathBuf::from),
        })
    }

    fn validate_generator(raw: RawGeneratorConfig) -> BenchResult<GeneratorConfig> {
        Self::validate_command(&raw.command, "generator")?;
        Self::validate_environment(&raw.environment, "generator")?;

        if raw.config.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "config",
                context: "generator".to_string(),
            }
            .into());
        }

        if raw.name.is_empty() || raw.name.chars().any(char::is_whitespace) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "name",
                value: raw.name,
                reason: "Generator name must be a single non-empty word".to_string(),
            }
            .into());
        }

        if raw.stop_poll_interval_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "stop_poll_interval_ms",
                value: "0".to_string(),
                reason: "Poll interval must be greater than 0".to_string(),
            }
            .into());
        }

        if raw.stop_max_attempts == Some(0) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "stop_max_attempts",
                value: "0".to_string(),
                reason: "Attempt bound must be greater than 0 (omit it to poll forever)"
                    .to_string(),
            }
            .into());
        }

        Ok(GeneratorConfig {
            command: raw.command,
            config: PathBuf::from(raw.config),
            name: raw.name,
            stop_poll_interval: Duration::from_millis(raw.stop_poll_interval_ms),
            stop_max_attempts: raw.stop_max_attempts,
            environment: raw.environment,
        })
    }

    fn validate_forwarder(
        raw: RawForwarderConfig,
        context: &'static str,
    ) -> BenchResult<ForwarderConfig> {
        Self::validate_command(&raw.command, context)?;
        Self::validate_environment(&raw.environment, context)?;

        if raw.config.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "config",
                context: context.to_string(),
            }
            .into());
        }

        Ok(ForwarderConfig {
            command: raw.command,
            config: PathBuf::from(raw.config),
            environment: raw.environment,
        })
    }

    fn validate_measurement(raw: RawMeasurementConfig) -> BenchResult<MeasurementConfig> {
        if raw.window_secs == 0 || raw.window_secs > MAX_WINDOW_SECS {
            return Err(HardValidationError::InvalidFieldValue {
                field: "window_secs",
                value: raw.window_secs.to_string(),
                reason: format!("Must be between 1 and {} seconds", MAX_WINDOW_SECS),
            }
            .into());
        }

        if raw.marker_plugin.is_empty()
            || !raw
                .marker_plugin
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HardValidationError::InvalidFieldValue {
                field: "marker_plugin",
                value: raw.marker_plugin,
                reason: "Plugin name must contain only ASCII letters, digits and underscores"
                    .to_string(),
            }
            .into());
        }

        Ok(MeasurementConfig {
            window: Duration::from_secs(raw.window_secs),
            marker_plugin: raw.marker_plugin,
            on_missing_marker: raw.on_missing_marker,
        })
    }

    fn validate_search(raw: RawSearchConfig) -> BenchResult<SearchConfig> {
        let initial_rate = Rate::new(raw.initial_rate).map_err(|_| {
            HardValidationError::InvalidFieldValue {
                field: "initial_rate",
                value: raw.initial_rate.to_string(),
                reason: "Initial rate must be greater than 0".to_string(),
            }
        })?;

        if raw.growth_factor < 2 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "growth_factor",
                value: raw.growth_factor.to_string(),
                reason: "Growth factor must be at least 2".to_string(),
            }
            .into());
        }

        if raw.tolerance_divisor == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "tolerance_divisor",
                value: "0".to_string(),
                reason: "Tolerance divisor must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(SearchConfig {
            initial_rate,
            growth_factor: raw.growth_factor,
            tolerance_divisor: raw.tolerance_divisor,
        })
    }

    fn validate_command(command: &[String], context: &'static str) -> BenchResult<()> {
        match command.first() {
            None => Err(HardValidationError::MissingRequiredField {
                field: "command",
                context: context.to_string(),
            }
            .into()),
            Some(program) if program.is_empty() => Err(HardValidationError::InvalidFieldValue {
                field: "command",
                value: format!("{:?}", command),
                reason: format!("Program name cannot be empty in {}", context),
            }
            .into()),
            Some(_) => Ok(()),
        }
    }

    fn validate_environment(
        environment: &HashMap<String, String>,
        context: &'static str,
    ) -> BenchResult<()> {
        for key in environment.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "environment",
                    value: format!("{:?} in {}", key, context),
                    reason: "Environment variable names cannot be empty or contain '='"
                        .to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
