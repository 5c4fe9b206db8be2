// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for logbench.
//!
//! A fake generator and a fake forwarder, written as shell scripts, stand in
//! for dummer and fluentd. The generator writes the requested rate to a state
//! file; the receiver prints a flowcounter line for it every 100ms while the
//! file exists.

use std::path::PathBuf;

use logbench_core::process::{GeneratorControl, ProcessRegistry};
use logbench_core::{
    remove_stale_files, BenchError, Benchmarker, CommandGenerator, Config, ConfigLoader,
    ProcessError, Rate, RateSearch, Sample, Termination, ThroughputProbe,
};
use tempfile::TempDir;

const DUMMER: &str = r#"
STATE=$(dirname "$0")
case "$1" in
  start)
    echo start >> "$STATE/calls"
    if [ "$DUMMER_MODE" = fail_start ]; then
      echo "dummer: cannot open $3" >&2
      exit 1
    fi
    echo 0 > "$STATE/stops"
    echo "$5" > "$STATE/rate.tmp" && mv "$STATE/rate.tmp" "$STATE/rate"
    ;;
  stop)
    echo stop >> "$STATE/calls"
    if [ "$DUMMER_MODE" = fail_stop ]; then
      exit 3
    fi
    rm -f "$STATE/rate"
    n=$(cat "$STATE/stops" 2>/dev/null || echo 0)
    n=$((n + 1))
    echo "$n" > "$STATE/stops"
    if [ "$DUMMER_MODE" = never_stops ] || [ "$n" -lt 2 ]; then
      echo "Dummer 4242 stopping"
    else
      echo "Dummer 4242 not running"
    fi
    ;;
  *)
    exit 2
    ;;
esac
"#;

// Delivered rate follows the generation rate up to 30000, then collapses.
const FLUENTD: &str = r#"
STATE=$(dirname "$0")
echo "fluentd: reading config $2"
if [ "$FLUENTD_ROLE" != receiver ]; then
  exec sleep 60
fi
while true; do
  if [ -f "$STATE/rate" ]; then
    r=$(cat "$STATE/rate" 2>/dev/null)
    if [ -n "$r" ]; then
      if [ "$r" -le 30000 ]; then c=$r; else c=$((60000 - r)); fi
      if [ "$c" -lt 0 ]; then c=0; fi
      echo "plugin:out_flowcounter_simple count:$c indicator:num unit:second"
    fi
  fi
  sleep 0.1
done
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("dummer.sh"), DUMMER).expect("Failed to write dummer");
        std::fs::write(dir.path().join("fluentd.sh"), FLUENTD).expect("Failed to write fluentd");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, options: &Options) -> Config {
        let dir = self.dir.path().display();
        let yaml = format!(
            r#"
generator:
  command: [sh, {dir}/dummer.sh]
  config: dummer.conf
  stop_poll_interval_ms: 20
  stop_max_attempts: {max_attempts}
  environment: {{DUMMER_MODE: {mode}}}
agent:
  command: [sh, {dir}/fluentd.sh]
  config: agent.conf
  environment: {{FLUENTD_ROLE: agent}}
receiver:
  command: [sh, {dir}/fluentd.sh]
  config: receiver.conf
  environment: {{FLUENTD_ROLE: {role}}}
measurement:
  window_secs: 1
  on_missing_marker: {policy}
cleanup:
  remove_files: [dummy.log]
"#,
            dir = dir,
            max_attempts = options
                .max_attempts
                .map_or_else(|| "null".to_string(), |n| n.to_string()),
            mode = options.mode,
            role = options.role,
            policy = options.policy,
        );

        let path = self.path("logbench.yaml");
        std::fs::write(&path, yaml).expect("Failed to write config");
        ConfigLoader::load_file(&path).expect("Failed to load config")
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.path("calls"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

struct Options {
    mode: &'static str,
    role: &'static str,
    policy: &'static str,
    max_attempts: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: "normal",
            role: "receiver",
            policy: "zero",
            max_attempts: None,
        }
    }
}

fn rate(v: u64) -> Rate {
    Rate::new(v).unwrap()
}

fn generator(fixture: &Fixture, options: &Options) -> CommandGenerator {
    CommandGenerator::new(fixture.config(options).generator).unwrap()
}

#[test]
fn test_config_paths_resolve_against_config_dir() {
    let fixture = Fixture::new();
    let config = fixture.config(&Options::default());

    assert_eq!(config.generator.config, fixture.path("dummer.conf"));
    assert_eq!(config.receiver.config, fixture.path("receiver.conf"));
    assert_eq!(config.remove_files, vec![fixture.path("dummy.log")]);

    std::fs::write(fixture.path("dummy.log"), "stale").unwrap();
    remove_stale_files(&config.remove_files).unwrap();
    assert!(!fixture.path("dummy.log").exists());
}

#[test]
fn test_generator_stop_polls_until_confirmed() {
    let fixture = Fixture::new();
    let mut generator = generator(&fixture, &Options::default());

    generator.start(rate(1000)).unwrap();
    assert_eq!(
        std::fs::read_to_string(fixture.path("rate")).unwrap().trim(),
        "1000"
    );

    generator.stop().unwrap();
    // First poll reports "stopping", the second confirms
    assert_eq!(fixture.calls(), vec!["start", "stop", "stop"]);
    assert!(!fixture.path("rate").exists());
}

#[test]
fn test_generator_start_failure() {
    let fixture = Fixture::new();
    let mut generator = generator(
        &fixture,
        &Options {
            mode: "fail_start",
            ..Default::default()
        },
    );

    let result = generator.start(rate(1000));
    assert!(matches!(result, Err(ProcessError::StartFailed { rate, .. }) if rate.get() == 1000));
}

#[test]
fn test_generator_stop_failure() {
    let fixture = Fixture::new();
    let mut generator = generator(
        &fixture,
        &Options {
            mode: "fail_stop",
            ..Default::default()
        },
    );

    generator.start(rate(1000)).unwrap();
    let result = generator.stop();
    assert!(matches!(result, Err(ProcessError::StopFailed { .. })));
    // A failed stop command is not retried
    assert_eq!(fixture.calls(), vec!["start", "stop"]);
}

#[test]
fn test_generator_stop_gives_up_after_bound() {
    let fixture = Fixture::new();
    let mut generator = generator(
        &fixture,
        &Options {
            mode: "never_stops",
            max_attempts: Some(3),
            ..Default::default()
        },
    );

    let result = generator.stop();
    assert!(matches!(
        result,
        Err(ProcessError::TimeoutExceeded { attempts: 3 })
    ));
    assert_eq!(fixture.calls(), vec!["stop", "stop", "stop"]);
}

#[test]
fn test_measure_throughput_end_to_end() {
    let fixture = Fixture::new();
    let config = fixture.config(&Options::default());
    let registry = ProcessRegistry::new_shared();

    let mut bench = Benchmarker::launch(&config, Some(registry.clone())).unwrap();
    assert_eq!(registry.len(), 2);

    assert_eq!(bench.measure_throughput(rate(1000)).unwrap(), Sample::new(1000));
    // Lines from the previous window are drained first
    assert_eq!(bench.measure_throughput(rate(20_000)).unwrap(), Sample::new(20_000));

    bench.shutdown().unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_missing_marker_policies() {
    let fixture = Fixture::new();

    let config = fixture.config(&Options {
        role: "silent",
        ..Default::default()
    });
    let mut bench = Benchmarker::launch(&config, None).unwrap();
    assert_eq!(bench.measure_throughput(rate(1000)).unwrap(), Sample::ZERO);
    bench.shutdown().unwrap();

    let config = fixture.config(&Options {
        role: "silent",
        policy: "fail",
        ..Default::default()
    });
    let mut bench = Benchmarker::launch(&config, None).unwrap();
    let result = bench.measure_throughput(rate(1000));
    assert!(matches!(result, Err(BenchError::NoThroughputData { .. })));
    bench.shutdown().unwrap();
}

#[test]
fn test_start_failure_aborts_measurement() {
    let fixture = Fixture::new();
    let config = fixture.config(&Options {
        mode: "fail_start",
        ..Default::default()
    });
    let registry = ProcessRegistry::new_shared();
    let mut bench = Benchmarker::launch(&config, Some(registry.clone())).unwrap();

    let result = bench.measure_throughput(rate(1000));
    assert!(matches!(
        result,
        Err(BenchError::Process(ProcessError::StartFailed { .. }))
    ));

    // Forwarders are still torn down when the benchmarker is dropped
    drop(bench);
    assert!(registry.is_empty());
}

#[test]
fn test_rate_search_against_fake_pipeline() {
    let fixture = Fixture::new();
    let config = fixture.config(&Options::default());
    let mut bench = Benchmarker::launch(&config, None).unwrap();

    let outcome = RateSearch::new(config.search)
        .run(&mut bench, &mut ())
        .unwrap();
    bench.shutdown().unwrap();

    let rates: Vec<u64> = outcome.measurements.iter().map(|m| m.rate.get()).collect();
    assert_eq!(rates, vec![1000, 10_000, 100_000, 55_000, 32_500, 21_250]);
    assert_eq!(outcome.termination, Termination::Converged);
    assert_eq!(outcome.best.rate.get(), 32_500);
    assert_eq!(outcome.best.sample, Sample::new(27_500));
}
