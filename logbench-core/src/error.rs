// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for logbench.
//!
//! Every failure is an explicit enum variant. No `Box<dyn Error>` and no
//! `anyhow::Result` inside the library.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Rate;

/// Top-level error type for a benchmark run.
/// Every variant except the search ones is fatal and ends the run.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // External Process Errors - No Retry
    // =========================================================================
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    // =========================================================================
    // Measurement Errors
    // =========================================================================
    #[error("No throughput marker found in receiver output for rate {rate}")]
    NoThroughputData { rate: Rate },

    // =========================================================================
    // Search Errors
    // =========================================================================
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // =========================================================================
    // Report Errors
    // =========================================================================
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors prevent the run from starting.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Rate must be a positive number of messages per second, got {value}")]
    InvalidRate { value: u64 },
}

/// Failures of the generator and forwarder processes.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {stage}: {reason}")]
    SpawnFailed { stage: String, reason: String },

    #[error("Failed to start generator at {rate} messages/s: {reason}")]
    StartFailed { rate: Rate, reason: String },

    #[error("Failed to stop generator: {reason}")]
    StopFailed { reason: String },

    #[error("Generator stop not confirmed after {attempts} attempts")]
    TimeoutExceeded { attempts: u32 },

    #[error("Failed to signal {stage} (pid {pid}): {reason}")]
    SignalFailed {
        stage: String,
        pid: u32,
        reason: String,
    },

    #[error("Failed to reap {stage} (pid {pid}): {reason}")]
    WaitFailed {
        stage: String,
        pid: u32,
        reason: String,
    },

    #[error("Failed to read {stage} output: {reason}")]
    ReadLogs { stage: String, reason: String },
}

/// Errors raised by the rate search itself.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Rate overflow while ramping past {rate} messages/s")]
    RateOverflow { rate: Rate },

    #[error("Sample recorded for {got} but the search asked for {expected}")]
    UnexpectedRate { expected: Rate, got: Rate },

    #[error("Sample recorded while no rate was pending")]
    NothingPending,
}

/// Errors that can occur while writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_validation_error_display() {
        let err = HardValidationError::MissingRequiredField {
            field: "command",
            context: "generator".to_string(),
        };
        assert!(err.to_string().contains("command"));
        assert!(err.to_string().contains("generator"));
    }

    #[test]
    fn test_error_chain() {
        let process_err = ProcessError::StopFailed {
            reason: "exit status: 1".to_string(),
        };
        let bench_err: BenchError = process_err.into();
        assert!(matches!(bench_err, BenchError::Process(_)));
        assert!(bench_err.to_string().contains("exit status: 1"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ProcessError::TimeoutExceeded { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "Generator stop not confirmed after 3 attempts"
        );
    }
}
