//! Results of a run and their human-readable rendering.

use crate::{
    data::{Config, Size},
    error::Failure,
};
use std::fmt;
use std::time::Duration;

/// Counters collected over the trials of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Name given to the state machine, if any.
    pub name: Option<String>,
    /// Run seed; trial seeds are derived from it.
    pub seed: u64,
    /// Trials that were executed up to the reported outcome.
    pub trials: usize,
    pub passed: usize,
    /// Trials whose sequence was cut short by precondition exhaustion.
    pub exhausted: usize,
}

impl RunStats {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("state machine")
    }
}

/// One accepted step of shrinking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShrinkStep {
    /// `0` is the failing prefix shrinking started from.
    pub step: usize,
    pub sequence: Vec<String>,
    pub failing_index: usize,
}

/// A failing trial and its minimized form.
#[derive(Debug, Clone, PartialEq)]
pub struct Counterexample {
    /// Index of the failing trial within the run.
    pub trial: usize,
    /// Seed that rebuilds the original sequence via `replay_with`.
    pub trial_seed: u64,
    /// Generation size the trial ran with.
    pub size: Size,
    pub sequence_length: usize,
    pub retry_limit: usize,
    /// The sequence as generated.
    pub original: Vec<String>,
    /// Where the generated sequence diverged.
    pub original_index: usize,
    /// The minimized sequence; its last command is the one that fails.
    pub shrunk: Vec<String>,
    pub failing_index: usize,
    /// Failure observed when replaying the minimized sequence.
    pub failure: Failure,
    /// Number of accepted shrink steps.
    pub shrinks: usize,
    /// Number of candidate replays spent while shrinking.
    pub replays: usize,
    pub progression: Vec<ShrinkStep>,
}

impl Counterexample {
    /// Settings that rebuild this trial from `trial_seed`.
    pub fn replay_config(&self) -> Config {
        Config::default()
            .with_size(self.size.get())
            .with_sequence_length(self.sequence_length)
            .with_retries(self.retry_limit)
    }
}

/// Why a run stopped without a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveUpReason {
    /// More trials than allowed could not build a full sequence.
    TooManyExhausted { exhausted: usize, limit: usize },
    /// Every trial was exhausted, so nothing was actually checked.
    NothingPassed { exhausted: usize },
    /// The time budget ran out before every trial started.
    TimeBudget { budget: Duration, remaining: usize },
}

impl fmt::Display for GiveUpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GiveUpReason::TooManyExhausted { exhausted, limit } => write!(
                f,
                "{} trials exhausted their preconditions (limit {})",
                exhausted, limit
            ),
            GiveUpReason::NothingPassed { exhausted } => write!(
                f,
                "all {} trials exhausted their preconditions, none passed",
                exhausted
            ),
            GiveUpReason::TimeBudget { budget, remaining } => write!(
                f,
                "time budget of {:?} spent with {} trials not started",
                budget, remaining
            ),
        }
    }
}

/// The result of running a state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Every trial completed without divergence.
    Passed { stats: RunStats },
    /// A trial diverged; the counterexample is already minimized.
    Failed {
        stats: RunStats,
        counterexample: Box<Counterexample>,
    },
    /// The run was inconclusive.
    GaveUp {
        stats: RunStats,
        reason: GiveUpReason,
    },
}

impl Report {
    pub fn is_passed(&self) -> bool {
        matches!(self, Report::Passed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Report::Failed { .. })
    }

    pub fn stats(&self) -> &RunStats {
        match self {
            Report::Passed { stats }
            | Report::Failed { stats, .. }
            | Report::GaveUp { stats, .. } => stats,
        }
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match self {
            Report::Failed { counterexample, .. } => Some(&**counterexample),
            _ => None,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        if let Some(name) = &stats.name {
            writeln!(f, "━━━ {} ━━━", name)?;
        }

        match self {
            Report::Passed { stats } => {
                write!(f, "  ✓ {} passed {} trials", stats.label(), stats.passed)?;
                if stats.exhausted > 0 {
                    write!(f, " ({} exhausted)", stats.exhausted)?;
                }
                write!(f, ". (seed {})", stats.seed)
            }
            Report::Failed {
                stats,
                counterexample,
            } => {
                writeln!(
                    f,
                    "  ✗ {} failed after {} trials and {} shrinks.",
                    stats.label(),
                    stats.trials,
                    counterexample.shrinks
                )?;
                write_counterexample(f, stats, counterexample)
            }
            Report::GaveUp { stats, reason } => write!(
                f,
                "  ⚐ {} gave up after {} trials: {}",
                stats.label(),
                stats.trials,
                reason
            ),
        }
    }
}

fn write_counterexample(
    f: &mut fmt::Formatter<'_>,
    stats: &RunStats,
    counterexample: &Counterexample,
) -> fmt::Result {
    if !counterexample.progression.is_empty() {
        writeln!(f)?;
        writeln!(f, "    Shrinking progression:")?;
        for step in &counterexample.progression {
            let rendered = format!("[{}]", step.sequence.join(", "));
            if step.step == 0 {
                writeln!(f, "      │ Original: {}", rendered)?;
            } else {
                writeln!(f, "      │ Step {}: {}", step.step, rendered)?;
            }
        }
    }

    writeln!(f)?;
    writeln!(f, "    === {} ===", counterexample.failure.kind())?;
    writeln!(f, "    {}", counterexample.failure)?;
    writeln!(f)?;
    writeln!(
        f,
        "    Original sequence: {} commands, failing at index {}",
        counterexample.original.len(),
        counterexample.original_index
    )?;
    writeln!(
        f,
        "    Minimal counterexample ({} commands, failing at index {}):",
        counterexample.shrunk.len(),
        counterexample.failing_index
    )?;
    for (index, command) in counterexample.shrunk.iter().enumerate() {
        writeln!(f, "      {}. {}", index, command)?;
    }
    writeln!(
        f,
        "    Replay with trial seed {} (trial {} of run seed {}).",
        counterexample.trial_seed, counterexample.trial, stats.seed
    )?;
    write!(
        f,
        "    Generated with size {}, sequence length {}, retry limit {}.",
        counterexample.size.get(),
        counterexample.sequence_length,
        counterexample.retry_limit
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> RunStats {
        RunStats {
            name: Some("stack".to_string()),
            seed: 42,
            trials: 3,
            passed: 2,
            exhausted: 0,
        }
    }

    fn counterexample() -> Counterexample {
        Counterexample {
            trial: 2,
            trial_seed: 777,
            size: Size(30),
            sequence_length: 4,
            retry_limit: 100,
            original: vec![
                "Push(5)".to_string(),
                "Size".to_string(),
                "Pop".to_string(),
                "Size".to_string(),
            ],
            original_index: 3,
            shrunk: vec!["Push(0)".to_string(), "Pop".to_string(), "Size".to_string()],
            failing_index: 2,
            failure: Failure::new("size mismatch (real: 1, model: 0)"),
            shrinks: 2,
            replays: 9,
            progression: vec![
                ShrinkStep {
                    step: 0,
                    sequence: vec![
                        "Push(5)".to_string(),
                        "Size".to_string(),
                        "Pop".to_string(),
                        "Size".to_string(),
                    ],
                    failing_index: 3,
                },
                ShrinkStep {
                    step: 1,
                    sequence: vec!["Push(5)".to_string(), "Pop".to_string(), "Size".to_string()],
                    failing_index: 2,
                },
                ShrinkStep {
                    step: 2,
                    sequence: vec!["Push(0)".to_string(), "Pop".to_string(), "Size".to_string()],
                    failing_index: 2,
                },
            ],
        }
    }

    #[test]
    fn test_failed_report_rendering() {
        let report = Report::Failed {
            stats: stats(),
            counterexample: Box::new(counterexample()),
        };
        let rendered = report.to_string();
        let expected = "\
━━━ stack ━━━
  ✗ stack failed after 3 trials and 2 shrinks.

    Shrinking progression:
      │ Original: [Push(5), Size, Pop, Size]
      │ Step 1: [Push(5), Pop, Size]
      │ Step 2: [Push(0), Pop, Size]

    === Assertion Failure ===
    size mismatch (real: 1, model: 0)

    Original sequence: 4 commands, failing at index 3
    Minimal counterexample (3 commands, failing at index 2):
      0. Push(0)
      1. Pop
      2. Size
    Replay with trial seed 777 (trial 2 of run seed 42).
    Generated with size 30, sequence length 4, retry limit 100.";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_passed_report_rendering() {
        let mut stats = stats();
        stats.name = None;
        stats.passed = 100;
        stats.exhausted = 4;
        let report = Report::Passed { stats };
        assert_eq!(
            report.to_string(),
            "  ✓ state machine passed 100 trials (4 exhausted). (seed 42)"
        );
        assert!(report.is_passed());
        assert!(report.counterexample().is_none());
    }

    #[test]
    fn test_replay_config_restores_trial_settings() {
        let config = counterexample().replay_config();
        assert_eq!(config.size, Size(30));
        assert_eq!(config.sequence_length, 4);
        assert_eq!(config.retry_limit, 100);
    }

    #[test]
    fn test_nothing_passed_rendering() {
        let mut stats = stats();
        stats.name = None;
        stats.passed = 0;
        stats.exhausted = 3;
        let report = Report::GaveUp {
            stats,
            reason: GiveUpReason::NothingPassed { exhausted: 3 },
        };
        assert!(!report.is_passed());
        assert_eq!(
            report.to_string(),
            "  ⚐ state machine gave up after 3 trials: all 3 trials exhausted their preconditions, none passed"
        );
    }

    #[test]
    fn test_gave_up_rendering() {
        let report = Report::GaveUp {
            stats: stats(),
            reason: GiveUpReason::TooManyExhausted {
                exhausted: 11,
                limit: 10,
            },
        };
        assert!(report
            .to_string()
            .ends_with("⚐ stack gave up after 3 trials: 11 trials exhausted their preconditions (limit 10)"));
    }
}
