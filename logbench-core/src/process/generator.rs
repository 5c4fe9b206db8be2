// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Log generator control.
//!
//! The generator daemonizes itself: `start` returns once it is running in the
//! background, and `stop` only asks it to exit. Stop is confirmed by polling
//! the stop command until it reports `<Name> <pid> not running`.

use std::process::{Command, Stdio};
use std::thread;

use regex::Regex;

use crate::config::GeneratorConfig;
use crate::error::{HardValidationError, ProcessError};
use crate::process::GeneratorControl;
use crate::types::Rate;

/// Result of one stop command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopStatus {
    /// The generator reported it is no longer running.
    Stopped,
    /// The command succeeded but the generator is still shutting down.
    Stopping(String),
}

/// Matches the exact "not running" status line of the generator.
#[derive(Debug, Clone)]
pub struct StopConfirmation {
    pattern: Regex,
}

impl StopConfirmation {
    /// Build the matcher for a generator that calls itself `name`.
    pub fn new(name: &str) -> Result<Self, HardValidationError> {
        let source = format!(r"\A{} \d+ not running\n\z", regex::escape(name));
        let pattern = Regex::new(&source).map_err(|e| HardValidationError::InvalidFieldValue {
            field: "name",
            value: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Check whether the stop command output confirms the generator is down.
    pub fn is_confirmed(&self, output: &str) -> bool {
        self.pattern.is_match(output)
    }
}

/// Generator driven through its `start` / `stop` command line.
#[derive(Debug)]
pub struct CommandGenerator {
    config: GeneratorConfig,
    confirmation: StopConfirmation,
}

impl CommandGenerator {
    /// Create a controller from validated configuration.
    pub fn new(config: GeneratorConfig) -> Result<Self, HardValidationError> {
        if config.command.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "command",
                context: "generator".to_string(),
            });
        }
        let confirmation = StopConfirmation::new(&config.name)?;
        Ok(Self {
            config,
            confirmation,
        })
    }

    fn command(&self) -> Command {
        // Non-empty, checked in new()
        let mut cmd = Command::new(&self.config.command[0]);
        cmd.args(&self.config.command[1..])
            .envs(&self.config.environment)
            .stdin(Stdio::null());
        cmd
    }

    /// Issue a single stop command without polling.
    pub fn request_stop(&self) -> Result<StopStatus, ProcessError> {
        let output = self
            .command()
            .arg("stop")
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| ProcessError::StopFailed {
                reason: format!("Failed to run stop command: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            return Err(ProcessError::StopFailed {
                reason: format!("{}: {}", output.status, stdout.trim_end()),
            });
        }

        if self.confirmation.is_confirmed(&stdout) {
            Ok(StopStatus::Stopped)
        } else {
            Ok(StopStatus::Stopping(stdout))
        }
    }
}

impl GeneratorControl for CommandGenerator {
    fn start(&mut self, rate: Rate) -> Result<(), ProcessError> {
        let status = self
            .command()
            .arg("start")
            .arg("-c")
            .arg(&self.config.config)
            .arg("-r")
            .arg(rate.to_string())
            .arg("-d")
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| ProcessError::StartFailed {
                rate,
                reason: format!("Failed to run start command: {}", e),
            })?;

        if !status.success() {
            return Err(ProcessError::StartFailed {
                rate,
                reason: status.to_string(),
            });
        }

        tracing::debug!(rate = rate.get(), "Generator started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ProcessError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.request_stop()? {
                StopStatus::Stopped => {
                    tracing::debug!(attempts = attempts, "Generator stop confirmed");
                    return Ok(());
                }
                StopStatus::Stopping(output) => {
                    tracing::debug!(
                        attempts = attempts,
                        status = %output.trim_end(),
                        "Generator still stopping"
                    );
                }
            }

            if let Some(max) = self.config.stop_max_attempts {
                if attempts >= max {
                    return Err(ProcessError::TimeoutExceeded { attempts });
                }
            }

            thread::sleep(self.config.stop_poll_interval);
        }
    }
}
