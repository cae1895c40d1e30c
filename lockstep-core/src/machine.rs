//! The engine: registration, the trial loop and replay.

use crate::{
    command::{AnyCommand, Command, CommandSet},
    data::{Config, Seed, Size},
    error::{LockstepError, Result},
    gen::Gen,
    report::{Counterexample, GiveUpReason, Report, RunStats},
    runner::{Outcome, Runner},
    sequence::{Sequence, SequenceBuilder},
    shrink::Shrinker,
};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Produces fresh `(model, real)` pairs for one trial.
type Factory<M, R> = Rc<dyn Fn() -> (M, R)>;

/// Draws the starting state of a trial and returns its factory.
type Setup<M, R> = dyn Fn(Size, Seed) -> Option<Factory<M, R>> + Send + Sync;

/// Keeps the initial-state stream apart from the command stream of a trial.
const INITIAL_STREAM: u64 = 0x5851_f42d_4c95_7f2d;

/// A model-based test: a state-pair factory plus weighted command generators.
///
/// ```rust
/// use lockstep_core::*;
///
/// #[derive(Clone)]
/// struct Push(i32);
///
/// impl Command<usize, Vec<i32>> for Push {
///     fn apply(&self, count: &mut usize) {
///         *count += 1;
///     }
///
///     fn run(&self, count: &usize, real: &mut Vec<i32>) -> Result<(), Failure> {
///         real.push(self.0);
///         ensure_eq!(real.len(), count + 1);
///         Ok(())
///     }
///
///     fn describe(&self) -> String {
///         format!("Push({})", self.0)
///     }
/// }
///
/// let report = StateMachine::new(|| (0usize, Vec::new()))
///     .command(Gen::<i32>::int_range(-10, 10).map(Push))
///     .run_trials(20, 10, Some(1))
///     .unwrap();
/// assert!(report.is_passed());
/// ```
pub struct StateMachine<M, R> {
    name: Option<String>,
    setup: Arc<Setup<M, R>>,
    commands: CommandSet<M, R>,
}

impl<M, R> Clone for StateMachine<M, R> {
    fn clone(&self) -> Self {
        StateMachine {
            name: self.name.clone(),
            setup: Arc::clone(&self.setup),
            commands: self.commands.clone(),
        }
    }
}

enum TrialResult {
    Passed,
    Exhausted,
    Failed(Box<Counterexample>),
}

/// Shared bookkeeping between trial workers.
struct RunState<'a> {
    config: &'a Config,
    run_seed: u64,
    trial_seeds: Vec<u64>,
    started: Instant,
    next_trial: AtomicUsize,
    lowest_failure: AtomicUsize,
    abort: AtomicBool,
}

impl<M: Clone + 'static, R: 'static> StateMachine<M, R> {
    /// Create a machine from a factory producing a fresh `(model, real)`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> (M, R) + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        StateMachine::from_setup(move |_size, _seed| {
            let factory = Arc::clone(&factory);
            Some(Rc::new(move || (*factory)()) as Factory<M, R>)
        })
    }

    /// Create a machine whose starting state is generated per trial.
    ///
    /// `initial` is drawn once from the trial seed; `build` turns the drawn
    /// value into a fresh `(model, real)` pair every time the trial (or one
    /// of its shrink candidates) is replayed. The initial value itself is not
    /// shrunk.
    pub fn with_initial<I, F>(initial: Gen<I>, build: F) -> Self
    where
        I: Clone + 'static,
        F: Fn(I) -> (M, R) + Send + Sync + 'static,
    {
        let build = Arc::new(build);
        StateMachine::from_setup(move |size, seed| {
            let value = initial.sample(size, seed)?;
            let build = Arc::clone(&build);
            Some(Rc::new(move || (*build)(value.clone())) as Factory<M, R>)
        })
    }

    fn from_setup<S>(setup: S) -> Self
    where
        S: Fn(Size, Seed) -> Option<Factory<M, R>> + Send + Sync + 'static,
    {
        StateMachine {
            name: None,
            setup: Arc::new(setup),
            commands: CommandSet::new(),
        }
    }

    /// Name shown in reports.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a command generator with weight 1.
    pub fn command<C>(mut self, gen: Gen<C>) -> Self
    where
        C: Command<M, R> + 'static,
    {
        self.commands.add(gen);
        self
    }

    /// Register a command generator with an explicit weight.
    pub fn weighted<C>(mut self, weight: u32, gen: Gen<C>) -> Self
    where
        C: Command<M, R> + 'static,
    {
        self.commands.add_weighted(weight, gen);
        self
    }

    /// Register a command without generated arguments.
    pub fn constant<C>(mut self, command: C) -> Self
    where
        C: Command<M, R> + Clone + Send + Sync + 'static,
    {
        self.commands.add_constant(command);
        self
    }

    /// Register every generator of a prepared set.
    pub fn commands(mut self, set: CommandSet<M, R>) -> Self {
        self.commands.extend(set);
        self
    }

    pub fn command_set(&self) -> &CommandSet<M, R> {
        &self.commands
    }

    /// Run `num_trials` sequences of up to `max_sequence_length` commands
    /// with otherwise default settings.
    pub fn run_trials(
        &self,
        num_trials: usize,
        max_sequence_length: usize,
        seed: Option<u64>,
    ) -> Result<Report> {
        let mut config = Config::default()
            .with_tests(num_trials)
            .with_sequence_length(max_sequence_length);
        config.seed = seed;
        self.run(&config)
    }

    /// Run and panic with the rendered report if a trial diverged.
    pub fn assert(&self, config: &Config) -> Report {
        match self.run(config) {
            Ok(report) if report.is_failed() => panic!("\n{}", report),
            Ok(report) => {
                if let Report::GaveUp { .. } = report {
                    warn!("{}", report);
                }
                report
            }
            Err(err) => panic!("lockstep run aborted: {}", err),
        }
    }

    /// Run every trial described by `config`.
    ///
    /// The reported failure is always the lowest-indexed failing trial, so
    /// the result does not depend on the number of worker threads.
    pub fn run(&self, config: &Config) -> Result<Report> {
        config.validate()?;
        let run_seed = config.seed.unwrap_or_else(Seed::fresh_u64);
        let threads = config.effective_threads().min(config.test_limit.max(1));
        info!(
            seed = run_seed,
            trials = config.test_limit,
            sequence_length = config.sequence_length,
            threads,
            "starting run"
        );

        let state = RunState {
            config,
            run_seed,
            trial_seeds: trial_seeds(run_seed, config.test_limit),
            started: Instant::now(),
            next_trial: AtomicUsize::new(0),
            lowest_failure: AtomicUsize::new(usize::MAX),
            abort: AtomicBool::new(false),
        };

        let finished = if threads <= 1 {
            self.work(&state)?
        } else {
            self.work_in_parallel(&state, threads)?
        };

        let report = self.summarize(&state, finished);
        info!(
            seed = run_seed,
            passed = report.is_passed(),
            failed = report.is_failed(),
            trials = report.stats().trials,
            elapsed_ms = state.started.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }

    fn work_in_parallel(
        &self,
        state: &RunState<'_>,
        threads: usize,
    ) -> Result<Vec<(usize, TrialResult)>> {
        thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| scope.spawn(move || self.work(state)))
                .collect();

            let mut finished = Vec::new();
            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(results)) => finished.extend(results),
                    Ok(Err(err)) => {
                        first_error.get_or_insert(err);
                    }
                    Err(payload) => {
                        let failure = crate::error::Failure::from_panic(payload);
                        first_error.get_or_insert(LockstepError::WorkerPanicked {
                            message: failure.message,
                        });
                    }
                }
            }
            match first_error {
                Some(err) => Err(err),
                None => Ok(finished),
            }
        })
    }

    /// Claim and execute trials until none are left worth running.
    fn work(&self, state: &RunState<'_>) -> Result<Vec<(usize, TrialResult)>> {
        let mut finished = Vec::new();
        loop {
            if state.abort.load(Ordering::SeqCst) {
                break;
            }
            let trial = state.next_trial.fetch_add(1, Ordering::SeqCst);
            // Trials are claimed in order, so nothing past a known failure matters.
            if trial >= state.trial_seeds.len()
                || trial > state.lowest_failure.load(Ordering::SeqCst)
            {
                break;
            }
            if let Some(budget) = state.config.time_budget {
                if state.started.elapsed() >= budget {
                    break;
                }
            }

            match self.run_trial(state, trial) {
                Ok(result) => {
                    if let TrialResult::Failed(_) = result {
                        state.lowest_failure.fetch_min(trial, Ordering::SeqCst);
                    }
                    finished.push((trial, result));
                }
                Err(err) => {
                    state.abort.store(true, Ordering::SeqCst);
                    return Err(err);
                }
            }
        }
        Ok(finished)
    }

    fn run_trial(&self, state: &RunState<'_>, trial: usize) -> Result<TrialResult> {
        let config = state.config;
        let trial_seed = state.trial_seeds[trial];
        let Some((factory, sequence)) = self.prepare(config, trial_seed) else {
            debug!(trial, seed = trial_seed, "initial state exhausted");
            return Ok(TrialResult::Exhausted);
        };

        let outcome =
            Runner::from_factory(&*factory).execute(&sequence.commands(), trial_seed)?;
        match outcome {
            Outcome::Passed if sequence.exhausted => {
                debug!(trial, seed = trial_seed, len = sequence.len(), "trial exhausted");
                Ok(TrialResult::Exhausted)
            }
            Outcome::Passed => {
                debug!(trial, seed = trial_seed, "trial passed");
                Ok(TrialResult::Passed)
            }
            Outcome::Exhausted => Ok(TrialResult::Exhausted),
            Outcome::Failed { index, failure } => {
                debug!(trial, seed = trial_seed, index, %failure, "trial failed, shrinking");
                let original = sequence.descriptions();
                let shrunk = Shrinker::new(&*factory, trial_seed, config.shrink_limit)
                    .shrink(sequence.steps, index, failure)?;
                Ok(TrialResult::Failed(Box::new(Counterexample {
                    trial,
                    trial_seed,
                    size: config.size,
                    sequence_length: config.sequence_length,
                    retry_limit: config.retry_limit,
                    original,
                    original_index: index,
                    shrunk: shrunk.descriptions(),
                    failing_index: shrunk.failing_index,
                    shrinks: shrunk.shrinks(),
                    replays: shrunk.replays,
                    failure: shrunk.failure,
                    progression: shrunk.progression,
                })))
            }
        }
    }

    /// Draw a trial's starting state and build its command sequence.
    ///
    /// `None` when the initial state could not be generated.
    fn prepare(
        &self,
        config: &Config,
        trial_seed: u64,
    ) -> Option<(Factory<M, R>, Sequence<M, R>)> {
        let factory = (self.setup)(config.size, Seed::from_u64(trial_seed ^ INITIAL_STREAM))?;
        let (model, _real) = (*factory)();
        let sequence = SequenceBuilder::new(&self.commands, config.size, config.retry_limit)
            .build(model, config.sequence_length, trial_seed);
        Some((factory, sequence))
    }

    /// Fold trial results in trial order into a report.
    fn summarize(&self, state: &RunState<'_>, finished: Vec<(usize, TrialResult)>) -> Report {
        let config = state.config;
        let mut results: Vec<Option<TrialResult>> =
            (0..state.trial_seeds.len()).map(|_| None).collect();
        for (trial, result) in finished {
            results[trial] = Some(result);
        }

        let mut stats = RunStats {
            name: self.name.clone(),
            seed: state.run_seed,
            ..RunStats::default()
        };
        let total = results.len();
        let mut results = results.into_iter().enumerate();
        while let Some((trial, result)) = results.next() {
            match result {
                Some(TrialResult::Passed) => {
                    stats.trials += 1;
                    stats.passed += 1;
                }
                Some(TrialResult::Exhausted) => {
                    stats.trials += 1;
                    stats.exhausted += 1;
                    if stats.exhausted > config.discard_limit {
                        let exhausted = stats.exhausted;
                        return Report::GaveUp {
                            stats,
                            reason: GiveUpReason::TooManyExhausted {
                                exhausted,
                                limit: config.discard_limit,
                            },
                        };
                    }
                }
                Some(TrialResult::Failed(counterexample)) => {
                    stats.trials += 1;
                    return Report::Failed {
                        stats,
                        counterexample,
                    };
                }
                None => {
                    // A failure found before the budget ran out still wins.
                    let failed = results.find_map(|(_, result)| match result {
                        Some(TrialResult::Failed(counterexample)) => Some(counterexample),
                        _ => None,
                    });
                    if let Some(counterexample) = failed {
                        stats.trials += 1;
                        return Report::Failed {
                            stats,
                            counterexample,
                        };
                    }
                    return Report::GaveUp {
                        stats,
                        reason: GiveUpReason::TimeBudget {
                            budget: config.time_budget.unwrap_or_default(),
                            remaining: total - trial,
                        },
                    };
                }
            }
        }
        if stats.passed == 0 && stats.exhausted > 0 {
            let exhausted = stats.exhausted;
            return Report::GaveUp {
                stats,
                reason: GiveUpReason::NothingPassed { exhausted },
            };
        }
        Report::Passed { stats }
    }

    /// Rebuild the sequence a trial seed produces with default settings.
    pub fn replay(&self, seed: u64, length: usize) -> Sequence<M, R> {
        self.replay_with(&Config::default().with_sequence_length(length), seed)
    }

    /// Rebuild the sequence a trial seed produces under `config`.
    ///
    /// A counterexample's [`Counterexample::replay_config`] gives the
    /// settings its trial ran with.
    pub fn replay_with(&self, config: &Config, seed: u64) -> Sequence<M, R> {
        match self.prepare(config, seed) {
            Some((_factory, sequence)) => sequence,
            None => Sequence {
                seed,
                steps: Vec::new(),
                exhausted: true,
            },
        }
    }

    /// Rebuild and execute a trial with default settings, without shrinking.
    pub fn replay_trial(&self, seed: u64, length: usize) -> Result<Outcome> {
        self.replay_trial_with(&Config::default().with_sequence_length(length), seed)
    }

    /// Rebuild and execute a trial under `config`, without shrinking.
    pub fn replay_trial_with(&self, config: &Config, seed: u64) -> Result<Outcome> {
        let Some((factory, sequence)) = self.prepare(config, seed) else {
            return Ok(Outcome::Exhausted);
        };
        let commands: Vec<AnyCommand<M, R>> = sequence.commands();
        let outcome = Runner::from_factory(&*factory).execute(&commands, seed)?;
        Ok(match outcome {
            Outcome::Passed if sequence.exhausted => Outcome::Exhausted,
            other => other,
        })
    }
}

/// Derive one seed per trial from the run seed.
fn trial_seeds(run_seed: u64, count: usize) -> Vec<u64> {
    let mut seed = Seed::from_u64(run_seed);
    (0..count)
        .map(|_| {
            let (value, next) = seed.next_u64();
            seed = next;
            value
        })
        .collect()
}
