// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod measure;
pub mod run;
pub mod validate;

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal as listen, Signal as SignalStream, SignalKind};

use logbench_core::process::{CommandGenerator, ProcessRegistry, StopStatus};
use logbench_core::GeneratorConfig;

/// Listeners for the signals that end a run early.
///
/// Install before spawning any forwarder: from then on SIGINT, SIGTERM and
/// SIGHUP are queued here instead of killing the process outright.
pub(crate) struct ShutdownSignals {
    interrupt: SignalStream,
    terminate: SignalStream,
    hangup: SignalStream,
}

impl ShutdownSignals {
    pub(crate) fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: listen(SignalKind::interrupt())?,
            terminate: listen(SignalKind::terminate())?,
            hangup: listen(SignalKind::hangup())?,
        })
    }

    /// Wait for the first of them to arrive.
    pub(crate) async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.interrupt.recv() => Signal::SIGINT,
            _ = self.terminate.recv() => Signal::SIGTERM,
            _ = self.hangup.recv() => Signal::SIGHUP,
        }
    }
}

/// Tear down everything the run started, then exit with `128 + signo`.
///
/// Registered forwarders get SIGTERM and are reaped. The generator gets a
/// single stop command without waiting for confirmation.
pub(crate) fn interrupt(
    signal: Signal,
    registry: &ProcessRegistry,
    generator: &GeneratorConfig,
) -> ! {
    eprintln!();
    eprintln!("Received {}, stopping pipeline...", signal);

    let stopped = registry.terminate_all();
    tracing::warn!(signal = %signal, forwarders = stopped.len(), "Run interrupted");

    match CommandGenerator::new(generator.clone()).map(|g| g.request_stop()) {
        Ok(Ok(StopStatus::Stopped)) => tracing::info!("Generator stopped"),
        Ok(Ok(StopStatus::Stopping(_))) => tracing::info!("Generator stop requested"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Generator stop failed"),
        Err(e) => tracing::warn!(error = %e, "Generator stop skipped"),
    }

    std::process::exit(128 + signal as i32)
}
