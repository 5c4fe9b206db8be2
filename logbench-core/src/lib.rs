//! Logbench Core Library
//!
//! Throughput benchmarking for two-stage log forwarding pipelines.
//! Provides generator control, forwarder process management, receiver
//! output scanning, the two-phase rate search and JSON reporting.

pub mod benchmarker;
pub mod config;
pub mod error;
pub mod marker;
pub mod process;
pub mod report;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use benchmarker::{remove_stale_files, Benchmarker, ThroughputProbe};
pub use config::{
    Config, ConfigLoader, ForwarderConfig, GeneratorConfig, MeasurementConfig, MissingMarkerPolicy,
    SearchConfig,
};
pub use error::{
    BenchError, BenchResult, HardValidationError, ProcessError, ReportError, SearchError,
};
pub use marker::MarkerScanner;
pub use process::{
    CommandGenerator, ForwarderPair, ForwarderProcess, GeneratorControl, LogStream,
    ProcessRegistry,
};
pub use report::{JsonReporter, SearchReport};
pub use search::{RateSearch, SearchObserver, SearchOutcome, Termination};
pub use types::{Rate, Sample, Stage};
