// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Search for the highest generation rate a pipeline keeps up with.
//!
//! The search runs in two phases over noisy samples:
//!
//! 1. **Ramping**: starting from the initial rate, multiply the rate by the
//!    growth factor for as long as the delivered rate keeps improving. The
//!    first rate that does not improve on the best sample ends the phase.
//! 2. **Narrowing**: bisect between the last improving rate and the first
//!    regressing one. Each midpoint replaces the best end if it beats the best
//!    sample, or the other end if it only beats that one. The search converges
//!    once the step falls under a fixed tolerance, derived once from the
//!    bracket width when the phase starts.
//!
//! Samples are assumed locally unimodal. A midpoint worse than both ends
//! violates that, and the search stops right away with the best result found
//! so far rather than chase noise.
//!
//! [`RateSearch`] can be stepped by hand, feeding each sample back with
//! [`RateSearch::record`]:
//!
//! ```rust
//! use logbench_core::search::RateSearch;
//! use logbench_core::{Sample, SearchConfig};
//!
//! let mut search = RateSearch::new(SearchConfig::default());
//! let rate = search.next_rate().unwrap();
//! assert_eq!(rate.get(), 1000);
//! search.record(rate, Sample::new(500)).unwrap();
//!
//! // Improved, so the next rate is ten times higher.
//! assert_eq!(search.next_rate().unwrap().get(), 10_000);
//! ```
//!
//! or driven to completion against a [`ThroughputProbe`] with
//! [`RateSearch::run`].

use serde::{Deserialize, Serialize};

use crate::benchmarker::ThroughputProbe;
use crate::config::SearchConfig;
use crate::error::{BenchResult, SearchError};
use crate::types::{Rate, Sample};

/// A measured rate and the sample it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub rate: Rate,
    pub sample: Sample,
}

/// Search phase a measurement was taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ramping,
    Narrowing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ramping => write!(f, "ramping"),
            Self::Narrowing => write!(f, "narrowing"),
        }
    }
}

/// One completed measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub rate: Rate,
    pub sample: Sample,
    pub phase: Phase,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Termination {
    /// The bracket narrowed below the tolerance.
    Converged,
    /// A midpoint sampled worse than both bracket ends.
    UnexpectedResult { rate: Rate, sample: Sample },
}

/// Final result of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Best rate and its sample.
    pub best: Candidate,
    /// Runner-up at termination.
    pub second: Candidate,
    /// Bracket `(low, high)` when narrowing started.
    pub initial_bracket: (Rate, Rate),
    /// Convergence tolerance used while narrowing.
    pub min_step: u64,
    pub termination: Termination,
    /// Every measurement in the order it was taken.
    pub measurements: Vec<Measurement>,
}

impl SearchOutcome {
    /// Check whether the search gave up on an inconsistent sample.
    pub fn is_unexpected(&self) -> bool {
        matches!(self.termination, Termination::UnexpectedResult { .. })
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Measure this rate and `record` the sample.
    Measure(Rate),
    /// The search is over.
    Done(SearchOutcome),
}

/// Hooks called around every measurement of [`RateSearch::run`].
pub trait SearchObserver {
    fn before_measure(&mut self, _rate: Rate, _phase: Phase) {}

    fn after_measure(&mut self, _measurement: &Measurement) {}
}

impl SearchObserver for () {}

#[derive(Debug, Clone)]
enum State {
    Ramping {
        rate: Rate,
    },
    Narrowing {
        min_step: u64,
        initial_bracket: (Rate, Rate),
    },
    Finished {
        min_step: u64,
        initial_bracket: (Rate, Rate),
        termination: Termination,
    },
}

/// Two-phase rate search state machine.
#[derive(Debug, Clone)]
pub struct RateSearch {
    config: SearchConfig,
    state: State,
    best: Candidate,
    second: Option<Candidate>,
    pending: Option<Rate>,
    measurements: Vec<Measurement>,
}

impl RateSearch {
    /// Create a search that starts ramping at `config.initial_rate`.
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            state: State::Ramping {
                rate: config.initial_rate,
            },
            best: Candidate {
                rate: config.initial_rate,
                sample: Sample::ZERO,
            },
            second: None,
            pending: None,
            measurements: Vec::new(),
        }
    }

    /// Current phase. A finished search reports the phase it finished in.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Ramping { .. } => Phase::Ramping,
            State::Narrowing { .. } | State::Finished { .. } => Phase::Narrowing,
        }
    }

    /// Best rate and sample so far.
    pub fn best(&self) -> Candidate {
        self.best
    }

    /// Runner-up, known once ramping is over.
    pub fn second(&self) -> Option<Candidate> {
        self.second
    }

    /// Convergence tolerance, fixed when narrowing starts.
    pub fn min_step(&self) -> Option<u64> {
        match self.state {
            State::Ramping { .. } => None,
            State::Narrowing { min_step, .. } | State::Finished { min_step, .. } => Some(min_step),
        }
    }

    /// Bracket `(low, high)` when narrowing started.
    pub fn initial_bracket(&self) -> Option<(Rate, Rate)> {
        match self.state {
            State::Ramping { .. } => None,
            State::Narrowing {
                initial_bracket, ..
            }
            | State::Finished {
                initial_bracket, ..
            } => Some(initial_bracket),
        }
    }

    /// Current bracket `(low, high)` while narrowing.
    pub fn bracket(&self) -> Option<(Rate, Rate)> {
        let second = self.second?;
        let (a, b) = (self.best.rate, second.rate);
        Some((a.min(b), a.max(b)))
    }

    /// Why the search stopped, once it has.
    pub fn termination(&self) -> Option<Termination> {
        match self.state {
            State::Finished { termination, .. } => Some(termination),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished { .. })
    }

    /// Measurements recorded so far.
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Decide the next step.
    ///
    /// Asking again before recording a sample yields the same rate.
    pub fn next_step(&mut self) -> Step {
        if let Some(rate) = self.pending {
            return Step::Measure(rate);
        }

        match self.state {
            State::Ramping { rate } => {
                self.pending = Some(rate);
                Step::Measure(rate)
            }
            State::Narrowing {
                min_step,
                initial_bracket,
            } => {
                let best = self.best.rate.get();
                let second = self.second.map_or(best, |c| c.rate.get());
                let test = midpoint(best, second);

                // The end-point check only matters when min_step is 0, where
                // the midpoint would otherwise repeat forever.
                if best.abs_diff(test) < min_step || test == best || test == second {
                    self.finish(min_step, initial_bracket, Termination::Converged);
                    return Step::Done(self.outcome(
                        min_step,
                        initial_bracket,
                        Termination::Converged,
                    ));
                }

                let rate = Rate::new_unchecked(test);
                self.pending = Some(rate);
                Step::Measure(rate)
            }
            State::Finished {
                min_step,
                initial_bracket,
                termination,
            } => Step::Done(self.outcome(min_step, initial_bracket, termination)),
        }
    }

    /// Next rate to measure, or None once the search is over.
    pub fn next_rate(&mut self) -> Option<Rate> {
        match self.next_step() {
            Step::Measure(rate) => Some(rate),
            Step::Done(_) => None,
        }
    }

    /// Feed back the sample measured at the pending rate.
    pub fn record(&mut self, rate: Rate, sample: Sample) -> Result<(), SearchError> {
        match self.pending {
            None => return Err(SearchError::NothingPending),
            Some(expected) if expected != rate => {
                return Err(SearchError::UnexpectedRate {
                    expected,
                    got: rate,
                })
            }
            Some(_) => self.pending = None,
        }

        let measured = Candidate { rate, sample };
        self.measurements.push(Measurement {
            rate,
            sample,
            phase: self.phase(),
        });

        match self.state {
            State::Ramping { .. } => self.record_ramping(measured),
            State::Narrowing {
                min_step,
                initial_bracket,
            } => {
                self.record_narrowing(measured, min_step, initial_bracket);
                Ok(())
            }
            State::Finished { .. } => Err(SearchError::NothingPending),
        }
    }

    fn record_ramping(&mut self, measured: Candidate) -> Result<(), SearchError> {
        if measured.sample > self.best.sample {
            self.best = measured;
            let next = measured
                .rate
                .checked_mul(self.config.growth_factor)
                .ok_or(SearchError::RateOverflow {
                    rate: measured.rate,
                })?;
            self.state = State::Ramping { rate: next };
            return Ok(());
        }

        // Overshot by one growth step: the previous rate is the low end.
        // Clamped to 1 when the very first measurement did not improve on 0
        // and the initial rate is below the growth factor.
        let low = Rate::new_unchecked((measured.rate.get() / self.config.growth_factor).max(1));
        self.best.rate = low;
        self.second = Some(measured);

        let min_step = (measured.rate.get() - low.get()) / self.config.tolerance_divisor;
        let initial_bracket = (low, measured.rate);

        tracing::info!(
            best_rate = low.get(),
            best_sample = self.best.sample.get(),
            second_rate = measured.rate.get(),
            second_sample = measured.sample.get(),
            min_step = min_step,
            "Ramp overshot, narrowing"
        );

        self.state = State::Narrowing {
            min_step,
            initial_bracket,
        };
        Ok(())
    }

    fn record_narrowing(
        &mut self,
        measured: Candidate,
        min_step: u64,
        initial_bracket: (Rate, Rate),
    ) {
        let second_sample = self.second.map_or(Sample::ZERO, |c| c.sample);

        if measured.sample > self.best.sample {
            self.second = Some(self.best);
            self.best = measured;
        } else if measured.sample > second_sample {
            self.second = Some(measured);
        } else {
            tracing::warn!(
                rate = measured.rate.get(),
                sample = measured.sample.get(),
                best_sample = self.best.sample.get(),
                second_sample = second_sample.get(),
                "Sample worse than both bracket ends, stopping search"
            );
            self.finish(
                min_step,
                initial_bracket,
                Termination::UnexpectedResult {
                    rate: measured.rate,
                    sample: measured.sample,
                },
            );
        }
    }

    fn finish(&mut self, min_step: u64, initial_bracket: (Rate, Rate), termination: Termination) {
        self.state = State::Finished {
            min_step,
            initial_bracket,
            termination,
        };
    }

    fn outcome(
        &self,
        min_step: u64,
        initial_bracket: (Rate, Rate),
        termination: Termination,
    ) -> SearchOutcome {
        SearchOutcome {
            best: self.best,
            second: self.second.unwrap_or(self.best),
            initial_bracket,
            min_step,
            termination,
            measurements: self.measurements.clone(),
        }
    }

    /// Drive the search to completion.
    ///
    /// Any probe error aborts the search. An inconsistent sample does not: it
    /// ends the search with `Termination::UnexpectedResult`.
    pub fn run<P, O>(&mut self, probe: &mut P, observer: &mut O) -> BenchResult<SearchOutcome>
    where
        P: ThroughputProbe + ?Sized,
        O: SearchObserver + ?Sized,
    {
        loop {
            let rate = match self.next_step() {
                Step::Measure(rate) => rate,
                Step::Done(outcome) => {
                    tracing::info!(
                        best_rate = outcome.best.rate.get(),
                        best_sample = outcome.best.sample.get(),
                        measurements = outcome.measurements.len(),
                        termination = ?outcome.termination,
                        "Rate search finished"
                    );
                    return Ok(outcome);
                }
            };

            let phase = self.phase();
            observer.before_measure(rate, phase);
            let sample = probe.measure_throughput(rate)?;
            tracing::info!(rate = rate.get(), sample = sample.get(), phase = %phase, "Measured");

            self.record(rate, sample)?;
            if let Some(measurement) = self.measurements.last() {
                observer.after_measure(measurement);
            }
        }
    }
}

/// Floor of the mean without overflowing.
fn midpoint(a: u64, b: u64) -> u64 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}
