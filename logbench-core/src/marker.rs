// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Delivered-count marker scanning.
//!
//! The receiver's flow counter plugin periodically prints lines such as
//! `plugin:out_flowcounter_simple count:4213 indicator:num unit:second`.
//! A window's sample is the largest count printed during it.

use regex::Regex;

use crate::error::HardValidationError;
use crate::types::Sample;

/// Plugin whose counter lines are scanned by default.
pub const DEFAULT_MARKER_PLUGIN: &str = "out_flowcounter_simple";

/// Extracts delivered-count markers from forwarder output.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    pattern: Regex,
}

impl MarkerScanner {
    /// Build a scanner for `plugin:<plugin> count:<n>` markers.
    pub fn new(plugin: &str) -> Result<Self, HardValidationError> {
        let source = format!(r"plugin:{}\s+count:(\d+)", regex::escape(plugin));
        let pattern = Regex::new(&source).map_err(|e| HardValidationError::InvalidFieldValue {
            field: "marker_plugin",
            value: plugin.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Every count in `logs`, in order of appearance.
    pub fn counts<'a>(&'a self, logs: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.pattern
            .captures_iter(logs)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<u64>().ok())
    }

    /// The maximum count in `logs`, or None when no marker was printed.
    pub fn max_count(&self, logs: &str) -> Option<Sample> {
        self.counts(logs).max().map(Sample::new)
    }
}
