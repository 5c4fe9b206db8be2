// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! External process lifecycle management.
//!
//! The generator is driven through its control command; the forwarders are
//! spawned children whose output is captured into private buffers.

mod forwarder;
mod generator;
mod registry;

pub use forwarder::{ForwarderPair, ForwarderProcess};
pub use generator::{CommandGenerator, StopConfirmation, StopStatus};
pub use registry::ProcessRegistry;

use crate::error::ProcessError;
use crate::types::Rate;

/// Control over the synthetic traffic generator.
pub trait GeneratorControl {
    /// Start emitting `rate` messages per second in the background.
    fn start(&mut self, rate: Rate) -> Result<(), ProcessError>;

    /// Stop the generator, blocking until it is confirmed stopped.
    fn stop(&mut self) -> Result<(), ProcessError>;
}

/// A destructively read output stream.
pub trait LogStream {
    /// Return the output appended since the previous call.
    fn read_logs(&mut self) -> Result<String, ProcessError>;
}

impl<T: GeneratorControl + ?Sized> GeneratorControl for &mut T {
    fn start(&mut self, rate: Rate) -> Result<(), ProcessError> {
        (**self).start(rate)
    }

    fn stop(&mut self) -> Result<(), ProcessError> {
        (**self).stop()
    }
}

impl<T: LogStream + ?Sized> LogStream for &mut T {
    fn read_logs(&mut self) -> Result<String, ProcessError> {
        (**self).read_logs()
    }
}
