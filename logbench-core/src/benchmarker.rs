// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One measurement cycle against a running pipeline.
//!
//! A cycle drains stale receiver output, runs the generator for a fixed
//! window, stops it, and takes the largest delivered count the receiver
//! printed during the window.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{Config, MeasurementConfig, MissingMarkerPolicy};
use crate::error::{BenchError, BenchResult};
use crate::marker::MarkerScanner;
use crate::process::{
    CommandGenerator, ForwarderPair, GeneratorControl, LogStream, ProcessRegistry,
};
use crate::types::{Rate, Sample};

/// Anything that can turn a generation rate into a delivered-rate sample.
pub trait ThroughputProbe {
    /// Run one measurement at `rate`.
    fn measure_throughput(&mut self, rate: Rate) -> BenchResult<Sample>;
}

impl<F> ThroughputProbe for F
where
    F: FnMut(Rate) -> BenchResult<Sample>,
{
    fn measure_throughput(&mut self, rate: Rate) -> BenchResult<Sample> {
        self(rate)
    }
}

/// Composes the generator with the forwarders whose receiver output is read.
#[derive(Debug)]
pub struct Benchmarker<G, L> {
    generator: G,
    forwarders: L,
    scanner: MarkerScanner,
    window: Duration,
    on_missing_marker: MissingMarkerPolicy,
}

impl Benchmarker<CommandGenerator, ForwarderPair> {
    /// Spawn both forwarders and prepare the generator from configuration.
    ///
    /// The forwarders stay up until `shutdown` or drop.
    pub fn launch(config: &Config, registry: Option<Arc<ProcessRegistry>>) -> BenchResult<Self> {
        let generator = CommandGenerator::new(config.generator.clone())?;
        let forwarders = ForwarderPair::spawn(&config.agent, &config.receiver, registry)?;
        Self::new(generator, forwarders, &config.measurement)
    }

    /// Stop both forwarders.
    pub fn shutdown(self) -> BenchResult<()> {
        self.forwarders.shutdown()?;
        Ok(())
    }
}

impl<G, L> Benchmarker<G, L>
where
    G: GeneratorControl,
    L: LogStream,
{
    /// Create a benchmarker over an already running pipeline.
    pub fn new(generator: G, forwarders: L, measurement: &MeasurementConfig) -> BenchResult<Self> {
        Ok(Self {
            generator,
            forwarders,
            scanner: MarkerScanner::new(&measurement.marker_plugin)?,
            window: measurement.window,
            on_missing_marker: measurement.on_missing_marker,
        })
    }

    /// Length of the measurement window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Give back the generator and forwarders.
    pub fn into_parts(self) -> (G, L) {
        (self.generator, self.forwarders)
    }
}

impl<G, L> ThroughputProbe for Benchmarker<G, L>
where
    G: GeneratorControl,
    L: LogStream,
{
    fn measure_throughput(&mut self, rate: Rate) -> BenchResult<Sample> {
        let stale = self.forwarders.read_logs()?;
        tracing::debug!(bytes = stale.len(), "Discarded receiver output");

        self.generator.start(rate)?;
        thread::sleep(self.window);
        // Stop before reading so the window is complete
        self.generator.stop()?;

        let logs = self.forwarders.read_logs()?;
        match self.scanner.max_count(&logs) {
            Some(sample) => {
                tracing::debug!(rate = rate.get(), sample = sample.get(), "Measured throughput");
                Ok(sample)
            }
            None => match self.on_missing_marker {
                MissingMarkerPolicy::Zero => {
                    tracing::warn!(
                        rate = rate.get(),
                        bytes = logs.len(),
                        "No throughput marker in receiver output, counting as 0"
                    );
                    Ok(Sample::ZERO)
                }
                MissingMarkerPolicy::Fail => Err(BenchError::NoThroughputData { rate }),
            },
        }
    }
}

/// Delete leftovers of a previous run. Missing files are ignored.
pub fn remove_stale_files(paths: &[PathBuf]) -> BenchResult<()> {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!(path = %path.display(), "Removed stale file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BenchError::Io {
                    context: "removing stale file",
                    source: e,
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    struct FakeGenerator {
        calls: Vec<String>,
        fail_start: bool,
    }

    impl GeneratorControl for FakeGenerator {
        fn start(&mut self, rate: Rate) -> Result<(), ProcessError> {
            self.calls.push(format!("start {}", rate));
            if self.fail_start {
                return Err(ProcessError::StartFailed {
                    rate,
                    reason: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<(), ProcessError> {
            self.calls.push("stop".to_string());
            Ok(())
        }
    }

    /// Hands out queued chunks, one per read.
    #[derive(Debug, Default)]
    struct FakeLogs {
        chunks: VecDeque<String>,
        reads: usize,
    }

    impl FakeLogs {
        fn with(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                reads: 0,
            }
        }
    }

    impl LogStream for FakeLogs {
        fn read_logs(&mut self) -> Result<String, ProcessError> {
            self.reads += 1;
            Ok(self.chunks.pop_front().unwrap_or_default())
        }
    }

    fn measurement(policy: MissingMarkerPolicy) -> MeasurementConfig {
        MeasurementConfig {
            window: Duration::ZERO,
            on_missing_marker: policy,
            ..Default::default()
        }
    }

    fn rate(v: u64) -> Rate {
        Rate::new(v).unwrap()
    }

    #[test]
    fn test_measure_takes_maximum_of_window() {
        let logs = FakeLogs::with(&[
            "plugin:out_flowcounter_simple count:9999\n", // stale, discarded
            "plugin:out_flowcounter_simple count:120\nplugin:out_flowcounter_simple count:95\n",
        ]);
        let mut bench = Benchmarker::new(
            FakeGenerator::default(),
            logs,
            &measurement(MissingMarkerPolicy::Zero),
        )
        .unwrap();

        let sample = bench.measure_throughput(rate(1000)).unwrap();
        assert_eq!(sample, Sample::new(120));

        let (generator, logs) = bench.into_parts();
        assert_eq!(generator.calls, vec!["start 1000", "stop"]);
        assert_eq!(logs.reads, 2);
    }

    #[test]
    fn test_missing_marker_counts_as_zero() {
        let logs = FakeLogs::with(&["", "fluentd worker is now running\n"]);
        let mut bench = Benchmarker::new(
            FakeGenerator::default(),
            logs,
            &measurement(MissingMarkerPolicy::Zero),
        )
        .unwrap();
        assert_eq!(bench.measure_throughput(rate(1000)).unwrap(), Sample::ZERO);
    }

    #[test]
    fn test_missing_marker_fails_when_configured() {
        let mut bench = Benchmarker::new(
            FakeGenerator::default(),
            FakeLogs::default(),
            &measurement(MissingMarkerPolicy::Fail),
        )
        .unwrap();
        let result = bench.measure_throughput(rate(5000));
        assert!(matches!(result, Err(BenchError::NoThroughputData { rate }) if rate.get() == 5000));
    }

    #[test]
    fn test_start_failure_is_fatal() {
        let generator = FakeGenerator {
            fail_start: true,
            ..Default::default()
        };
        let mut bench = Benchmarker::new(
            generator,
            FakeLogs::default(),
            &measurement(MissingMarkerPolicy::Zero),
        )
        .unwrap();

        let result = bench.measure_throughput(rate(1000));
        assert!(matches!(
            result,
            Err(BenchError::Process(ProcessError::StartFailed { .. }))
        ));
        let (generator, _) = bench.into_parts();
        assert_eq!(generator.calls, vec!["start 1000"]);
    }

    #[test]
    fn test_closure_probe() {
        let mut probe = |r: Rate| -> BenchResult<Sample> { Ok(Sample::new(r.get() / 2)) };
        assert_eq!(probe.measure_throughput(rate(1000)).unwrap(), Sample::new(500));
    }

    #[test]
    fn test_remove_stale_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let stale = dir.path().join("dummy.log");
        std::fs::write(&stale, "old").unwrap();
        let missing = dir.path().join("missing.log");

        remove_stale_files(&[stale.clone(), missing]).unwrap();
        assert!(!stale.exists());
    }
}
