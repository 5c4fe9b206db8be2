// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Rates and samples are plain integers on the wire but mean different things,
//! so each gets its own type. Invariants are checked at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Target generation rate in messages per second.
/// Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Rate(u64);

impl Rate {
    /// Create a new Rate with validation.
    pub fn new(per_sec: u64) -> Result<Self, HardValidationError> {
        if per_sec == 0 {
            return Err(HardValidationError::InvalidRate { value: per_sec });
        }
        Ok(Self(per_sec))
    }

    /// Create a Rate from a value known to be positive.
    pub(crate) const fn new_unchecked(per_sec: u64) -> Self {
        debug_assert!(per_sec > 0);
        Self(per_sec)
    }

    /// Get the inner messages-per-second value.
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Multiply by `factor`, returning None on overflow.
    pub fn checked_mul(&self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).and_then(|v| Self::new(v).ok())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Rate {
    type Error = HardValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rate> for u64 {
    fn from(rate: Rate) -> Self {
        rate.0
    }
}

/// Delivered messages per second observed for one measurement window.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sample(u64);

impl Sample {
    /// No delivered messages.
    pub const ZERO: Sample = Sample(0);

    pub const fn new(lines_per_sec: u64) -> Self {
        Self(lines_per_sec)
    }

    /// Get the inner lines-per-second value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Sample {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Pipeline stage a forwarder process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Forwarder tailing the generator output and shipping it on.
    Agent,
    /// Forwarder receiving from the agent and emitting the flow counter.
    Receiver,
}

impl Stage {
    /// Get the stage name for logs and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
