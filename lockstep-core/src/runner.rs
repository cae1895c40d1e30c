//! Executing a command sequence against a fresh `(model, real)` pair.

use crate::{
    command::AnyCommand,
    error::{Failure, LockstepError, Result},
};
use std::panic::{self, AssertUnwindSafe};
use tracing::trace;

/// Where a runner is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// State pair constructed, nothing executed yet.
    Init,
    /// About to execute (or executing) the command at this index.
    Running(usize),
    /// Every command executed without divergence.
    Passed,
    /// The command at this index diverged.
    Failed(usize),
}

/// How a single trial ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    /// The sequence could not be completed because no command qualified.
    Exhausted,
    /// The command at `index` reported a divergence.
    Failed { index: usize, failure: Failure },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Executes commands in order against one owned state pair.
pub struct Runner<M, R> {
    model: M,
    real: R,
    phase: Phase,
}

impl<M, R> Runner<M, R> {
    pub fn new(model: M, real: R) -> Self {
        Runner {
            model,
            real,
            phase: Phase::Init,
        }
    }

    /// Build the state pair from a factory.
    pub fn from_factory(factory: &dyn Fn() -> (M, R)) -> Self {
        let (model, real) = factory();
        Runner::new(model, real)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn real(&self) -> &R {
        &self.real
    }

    /// Run `commands` until the first divergence.
    ///
    /// Each precondition is re-checked against the current model right before
    /// its command runs; a false precondition at this point means the
    /// sequence was built or shrunk incorrectly and is reported as
    /// [`LockstepError::InternalConsistency`]. Panics inside `run` are caught
    /// and reported as failures. The model only advances after the real side
    /// of a step succeeded.
    pub fn execute(&mut self, commands: &[AnyCommand<M, R>], seed: u64) -> Result<Outcome> {
        for (index, command) in commands.iter().enumerate() {
            self.phase = Phase::Running(index);

            if !command.check(&self.model) {
                return Err(LockstepError::InternalConsistency {
                    seed,
                    index,
                    command: command.describe(),
                    sequence: commands.iter().map(|c| c.describe()).collect(),
                });
            }

            trace!(index, command = %command.describe(), "running command");
            let model = &self.model;
            let real = &mut self.real;
            let result = panic::catch_unwind(AssertUnwindSafe(|| command.run(model, real)));

            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(failure)) => Some(failure),
                Err(payload) => Some(Failure::from_panic(payload)),
            };
            if let Some(failure) = failure {
                trace!(index, %failure, "command diverged");
                self.phase = Phase::Failed(index);
                return Ok(Outcome::Failed { index, failure });
            }

            command.apply(&mut self.model);
        }

        self.phase = Phase::Passed;
        Ok(Outcome::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command;
    use std::rc::Rc;

    struct Push(i32);
    struct Pop;
    struct Boom;

    impl Command<usize, Vec<i32>> for Push {
        fn apply(&self, model: &mut usize) {
            *model += 1;
        }

        fn run(&self, _model: &usize, real: &mut Vec<i32>) -> std::result::Result<(), Failure> {
            real.push(self.0);
            Ok(())
        }

        fn describe(&self) -> String {
            format!("Push({})", self.0)
        }
    }

    impl Command<usize, Vec<i32>> for Pop {
        fn check(&self, model: &usize) -> bool {
            *model > 0
        }

        fn apply(&self, model: &mut usize) {
            *model -= 1;
        }

        fn run(&self, model: &usize, real: &mut Vec<i32>) -> std::result::Result<(), Failure> {
            crate::ensure!(real.pop().is_some());
            crate::ensure_eq!(real.len(), model - 1);
            Ok(())
        }

        fn describe(&self) -> String {
            "Pop".to_string()
        }
    }

    impl Command<usize, Vec<i32>> for Boom {
        fn apply(&self, _model: &mut usize) {}

        fn run(&self, _model: &usize, _real: &mut Vec<i32>) -> std::result::Result<(), Failure> {
            panic!("real system exploded");
        }

        fn describe(&self) -> String {
            "Boom".to_string()
        }
    }

    fn cmd(command: impl Command<usize, Vec<i32>> + 'static) -> AnyCommand<usize, Vec<i32>> {
        Rc::new(command)
    }

    #[test]
    fn test_passes_and_advances_model() {
        let mut runner = Runner::new(0, Vec::new());
        assert_eq!(runner.phase(), Phase::Init);
        let outcome = runner
            .execute(&[cmd(Push(1)), cmd(Push(2)), cmd(Pop)], 0)
            .unwrap();
        assert_eq!(outcome, Outcome::Passed);
        assert_eq!(runner.phase(), Phase::Passed);
        assert_eq!(*runner.model(), 1);
        assert_eq!(runner.real(), &vec![1]);
    }

    #[test]
    fn test_false_precondition_is_internal_error() {
        let mut runner = Runner::new(0, Vec::new());
        let err = runner.execute(&[cmd(Push(1)), cmd(Pop), cmd(Pop)], 5).unwrap_err();
        assert_eq!(
            err,
            LockstepError::InternalConsistency {
                seed: 5,
                index: 2,
                command: "Pop".to_string(),
                sequence: vec!["Push(1)".to_string(), "Pop".to_string(), "Pop".to_string()],
            }
        );
        assert_eq!(runner.phase(), Phase::Running(2));
    }

    #[test]
    fn test_divergence_stops_without_committing() {
        let mut runner = Runner::new(1, Vec::new());
        let outcome = runner.execute(&[cmd(Pop), cmd(Push(3))], 0).unwrap();
        assert!(outcome.is_failed());
        match outcome {
            Outcome::Failed { index, failure } => {
                assert_eq!(index, 0);
                assert_eq!(failure.message, "condition failed: `real.pop().is_some()`");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(runner.phase(), Phase::Failed(0));
        assert_eq!(*runner.model(), 1);
        assert!(runner.real().is_empty());
    }

    #[test]
    fn test_panics_become_failures() {
        let mut runner = Runner::<usize, Vec<i32>>::from_factory(&|| (0, Vec::new()));
        let outcome = runner.execute(&[cmd(Push(1)), cmd(Boom)], 0).unwrap();
        match outcome {
            Outcome::Failed { index, failure } => {
                assert_eq!(index, 1);
                assert!(failure.panicked);
                assert_eq!(failure.message, "real system exploded");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
