// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Forwarder process management.
//!
//! Spawns a forwarder with its combined stdout/stderr redirected into a
//! private temporary file, and tears it down with SIGTERM followed by a
//! blocking reap.

use std::fs::File;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::NamedTempFile;

use crate::config::ForwarderConfig;
use crate::error::ProcessError;
use crate::process::{LogStream, ProcessRegistry};
use crate::types::Stage;

/// Forwarder process wrapper.
///
/// Owns the child and its output buffer. `stop` consumes the handle, so a
/// forwarder is torn down at most once; a handle dropped without `stop`
/// performs the same teardown best-effort.
#[derive(Debug)]
pub struct ForwarderProcess {
    /// Stage this forwarder plays.
    stage: Stage,
    /// Child process handle, taken on teardown.
    child: Option<Child>,
    /// Process ID.
    pid: u32,
    /// Output buffer the child writes into.
    log: Option<NamedTempFile>,
    /// Independent read handle with its own offset into `log`.
    reader: Option<File>,
    /// Registry to deregister from once reaped.
    registry: Option<Arc<ProcessRegistry>>,
}

impl ForwarderProcess {
    /// Spawn a forwarder as `<command...> -c <config>`.
    ///
    /// # Errors
    /// Returns `SpawnFailed` if the buffer cannot be created or the process
    /// cannot be launched. Nothing is left running or open in that case.
    pub fn spawn(
        stage: Stage,
        config: &ForwarderConfig,
        registry: Option<Arc<ProcessRegistry>>,
    ) -> Result<Self, ProcessError> {
        let spawn_failed = |reason: String| ProcessError::SpawnFailed {
            stage: stage.to_string(),
            reason,
        };

        let (program, prefix) = config
            .command
            .split_first()
            .ok_or_else(|| spawn_failed("empty command".to_string()))?;

        let log = tempfile::Builder::new()
            .prefix(&format!("logbench-{}-", stage))
            .suffix(".log")
            .tempfile()
            .map_err(|e| spawn_failed(format!("Failed to create output buffer: {}", e)))?;

        // stdout and stderr share one file description so lines interleave
        // in the order the forwarder wrote them.
        let stdout = log
            .as_file()
            .try_clone()
            .map_err(|e| spawn_failed(format!("Failed to clone output buffer: {}", e)))?;
        let stderr = log
            .as_file()
            .try_clone()
            .map_err(|e| spawn_failed(format!("Failed to clone output buffer: {}", e)))?;
        let reader = log
            .reopen()
            .map_err(|e| spawn_failed(format!("Failed to open output buffer: {}", e)))?;

        let child = Command::new(program)
            .args(prefix)
            .arg("-c")
            .arg(&config.config)
            .envs(&config.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| spawn_failed(format!("Failed to spawn {}: {}", program, e)))?;

        let pid = child.id();
        if let Some(registry) = &registry {
            registry.register(pid, stage);
        }

        tracing::info!(
            stage = %stage,
            pid = pid,
            config = %config.config.display(),
            output = %log.path().display(),
            "Spawned forwarder"
        );

        Ok(Self {
            stage,
            child: Some(child),
            pid,
            log: Some(log),
            reader: Some(reader),
            registry,
        })
    }

    /// Get the process ID.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the stage this forwarder plays.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Check if the process is still running.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) | None => false,
        }
    }

    /// Send SIGTERM, wait for the process to exit, then close the buffer.
    pub fn stop(mut self) -> Result<ExitStatus, ProcessError> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<ExitStatus, ProcessError> {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => {
                return Err(ProcessError::WaitFailed {
                    stage: self.stage.to_string(),
                    pid: self.pid,
                    reason: "process already reaped".to_string(),
                })
            }
        };

        // ESRCH: it already exited on its own and only needs reaping
        match kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                self.child = Some(child);
                return Err(ProcessError::SignalFailed {
                    stage: self.stage.to_string(),
                    pid: self.pid,
                    reason: e.to_string(),
                });
            }
        }

        let status = child.wait().map_err(|e| ProcessError::WaitFailed {
            stage: self.stage.to_string(),
            pid: self.pid,
            reason: e.to_string(),
        })?;

        if let Some(registry) = &self.registry {
            registry.deregister(self.pid);
        }
        // Close both handles of the output buffer
        self.reader.take();
        self.log.take();

        tracing::info!(stage = %self.stage, pid = self.pid, status = %status, "Stopped forwarder");
        Ok(status)
    }
}

impl LogStream for ForwarderProcess {
    /// Everything the forwarder wrote since the previous call.
    fn read_logs(&mut self) -> Result<String, ProcessError> {
        let reader = self.reader.as_mut().ok_or_else(|| ProcessError::ReadLogs {
            stage: self.stage.to_string(),
            reason: "output buffer already closed".to_string(),
        })?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| ProcessError::ReadLogs {
                stage: self.stage.to_string(),
                reason: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Drop for ForwarderProcess {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.terminate() {
                tracing::warn!(stage = %self.stage, pid = self.pid, error = %e, "Forwarder teardown failed");
                // Last resort so the child does not outlive us
                if let Some(mut child) = self.child.take() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }
}

/// The agent and receiver forwarders of one pipeline.
///
/// Dropping the pair stops both processes, so neither outlives the run on any
/// exit path, including errors propagated with `?` and panics.
#[derive(Debug)]
pub struct ForwarderPair {
    agent: ForwarderProcess,
    receiver: ForwarderProcess,
}

impl ForwarderPair {
    /// Spawn the agent, then the receiver.
    ///
    /// If the receiver fails to spawn, the already running agent is stopped
    /// before the error is returned.
    pub fn spawn(
        agent: &ForwarderConfig,
        receiver: &ForwarderConfig,
        registry: Option<Arc<ProcessRegistry>>,
    ) -> Result<Self, ProcessError> {
        let agent = ForwarderProcess::spawn(Stage::Agent, agent, registry.clone())?;
        let receiver = ForwarderProcess::spawn(Stage::Receiver, receiver, registry)?;
        Ok(Self { agent, receiver })
    }

    /// Get the agent process.
    pub fn agent(&self) -> &ForwarderProcess {
        &self.agent
    }

    /// Get the receiver process.
    pub fn receiver(&self) -> &ForwarderProcess {
        &self.receiver
    }

    /// Stop the agent, then the receiver. Both are attempted even if the
    /// first fails; the first error is returned.
    pub fn shutdown(self) -> Result<(), ProcessError> {
        let agent = self.agent.stop();
        let receiver = self.receiver.stop();
        agent?;
        receiver?;
        Ok(())
    }
}

impl LogStream for ForwarderPair {
    fn read_logs(&mut self) -> Result<String, ProcessError> {
        self.receiver.read_logs()
    }
}
