// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Thread-safe registry of live forwarder processes using DashMap.
//!
//! Forwarders register their pid on spawn and deregister once reaped. The
//! registry lets another thread (the Ctrl-C handler) terminate whatever is
//! still running while the measuring thread is blocked.

use std::sync::Arc;

use dashmap::DashMap;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;

use crate::types::Stage;

/// Registry of forwarder pids that have not been reaped yet.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    /// Map of pid to the stage it runs.
    live: DashMap<u32, Stage>,
}

impl ProcessRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            live: DashMap::new(),
        }
    }

    /// Create a registry wrapped in an Arc for sharing across threads.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Record a freshly spawned process.
    pub fn register(&self, pid: u32, stage: Stage) {
        self.live.insert(pid, stage);
    }

    /// Forget a process once it has been reaped.
    pub fn deregister(&self, pid: u32) -> Option<Stage> {
        self.live.remove(&pid).map(|(_, stage)| stage)
    }

    /// Check whether a pid is still registered.
    pub fn contains(&self, pid: u32) -> bool {
        self.live.contains_key(&pid)
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Check if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Snapshot of registered processes, sorted by pid.
    pub fn snapshot(&self) -> Vec<(u32, Stage)> {
        let mut entries: Vec<_> = self
            .live
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        entries.sort_unstable_by_key(|(pid, _)| *pid);
        entries
    }

    /// Send SIGTERM to every registered process and reap it.
    ///
    /// Used on interruption, when the owning handles cannot run their own
    /// teardown. Returns the processes that were signalled.
    pub fn terminate_all(&self) -> Vec<(u32, Stage)> {
        let entries = self.snapshot();

        for &(pid, stage) in &entries {
            let target = Pid::from_raw(pid as i32);
            match kill(target, Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    tracing::warn!(pid = pid, stage = %stage, error = %e, "Failed to signal process");
                    continue;
                }
            }

            // ECHILD means the owning handle already reaped it.
            match waitpid(target, None) {
                Ok(_) | Err(Errno::ECHILD) => {
                    tracing::info!(pid = pid, stage = %stage, "Terminated forwarder");
                }
                Err(e) => {
                    tracing::warn!(pid = pid, stage = %stage, error = %e, "Failed to reap process");
                }
            }
            self.deregister(pid);
        }

        entries
    }
}
