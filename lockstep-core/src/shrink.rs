//! Minimizing failing command sequences.
//!
//! Shrinking is deterministic and uses no randomness. Starting from the
//! failing prefix of a sequence it alternates two passes until neither makes
//! progress or the replay budget is spent:
//!
//! 1. delete contiguous chunks of commands, from the whole sequence down to
//!    single commands;
//! 2. replace each command with the simpler alternatives from its shrink
//!    tree, following a child's own alternatives after it is accepted.
//!
//! A candidate is only replayed if its preconditions hold when simulated on
//! a fresh model, and it is only accepted if a fresh replay still fails.
//! Accepted candidates are cut back to their own failing command.

use crate::{
    command::AnyCommand,
    error::{Failure, Result},
    report::ShrinkStep,
    runner::{Outcome, Runner},
    sequence::first_invalid,
    tree::Tree,
};
use tracing::{debug, trace};

/// The smallest failing sequence found.
pub struct Shrunk<M, R> {
    pub steps: Vec<Tree<AnyCommand<M, R>>>,
    pub failing_index: usize,
    pub failure: Failure,
    /// Candidate replays spent.
    pub replays: usize,
    /// Every accepted step, starting with the failing prefix.
    pub progression: Vec<ShrinkStep>,
}

impl<M, R> Shrunk<M, R> {
    pub fn descriptions(&self) -> Vec<String> {
        describe(&self.steps)
    }

    /// Number of accepted shrink steps.
    pub fn shrinks(&self) -> usize {
        self.progression.len().saturating_sub(1)
    }
}

struct Candidate<M, R> {
    steps: Vec<Tree<AnyCommand<M, R>>>,
    index: usize,
    failure: Failure,
}

/// Replays shrink candidates against fresh state pairs from a factory.
pub struct Shrinker<'a, M, R> {
    factory: &'a dyn Fn() -> (M, R),
    seed: u64,
    limit: usize,
    replays: usize,
    progression: Vec<ShrinkStep>,
}

impl<'a, M: Clone + 'static, R: 'static> Shrinker<'a, M, R> {
    /// `seed` is only used to label internal-consistency errors; `limit`
    /// caps the number of candidate replays.
    pub fn new(factory: &'a dyn Fn() -> (M, R), seed: u64, limit: usize) -> Self {
        Shrinker {
            factory,
            seed,
            limit,
            replays: 0,
            progression: Vec::new(),
        }
    }

    /// Shrink a sequence whose command at `index` failed with `failure`.
    pub fn shrink(
        mut self,
        mut steps: Vec<Tree<AnyCommand<M, R>>>,
        index: usize,
        failure: Failure,
    ) -> Result<Shrunk<M, R>> {
        steps.truncate(index + 1);
        let mut best = Candidate {
            steps,
            index,
            failure,
        };
        self.record(&best);

        loop {
            let deleted = self.delete_chunks(&mut best)?;
            let simplified = self.simplify_arguments(&mut best)?;
            if !(deleted || simplified) || self.budget_spent() {
                break;
            }
        }

        debug!(
            seed = self.seed,
            final_len = best.steps.len(),
            replays = self.replays,
            shrinks = self.progression.len() - 1,
            "shrinking complete"
        );
        Ok(Shrunk {
            steps: best.steps,
            failing_index: best.index,
            failure: best.failure,
            replays: self.replays,
            progression: self.progression,
        })
    }

    fn budget_spent(&self) -> bool {
        self.replays >= self.limit
    }

    /// Repeatedly remove chunks of halving size until a full sweep removes
    /// nothing.
    fn delete_chunks(&mut self, best: &mut Candidate<M, R>) -> Result<bool> {
        let mut changed = false;
        loop {
            let mut removed_any = false;
            let mut chunk = best.steps.len();
            while chunk > 0 {
                let mut start = 0;
                while start < best.steps.len() {
                    if self.budget_spent() {
                        return Ok(changed || removed_any);
                    }
                    let end = (start + chunk).min(best.steps.len());
                    let mut candidate = best.steps[..start].to_vec();
                    candidate.extend_from_slice(&best.steps[end..]);

                    match self.try_candidate(candidate)? {
                        Some(accepted) => {
                            trace!(start, chunk, "removed chunk");
                            self.accept(best, accepted);
                            removed_any = true;
                        }
                        None => start += chunk,
                    }
                }
                chunk /= 2;
            }
            if !removed_any {
                return Ok(changed);
            }
            changed = true;
        }
    }

    /// Walk each command's shrink tree, simplest alternatives first.
    fn simplify_arguments(&mut self, best: &mut Candidate<M, R>) -> Result<bool> {
        let mut changed = false;
        let mut position = 0;
        while position < best.steps.len() {
            let mut worklist = best.steps[position].children();
            'walk: while !worklist.is_empty() {
                for child in std::mem::take(&mut worklist) {
                    if self.budget_spent() {
                        return Ok(changed);
                    }
                    let mut candidate = best.steps.clone();
                    candidate[position] = child;

                    if let Some(accepted) = self.try_candidate(candidate)? {
                        trace!(position, "simplified argument");
                        self.accept(best, accepted);
                        changed = true;
                        if position < best.steps.len() {
                            worklist = best.steps[position].children();
                        }
                        continue 'walk;
                    }
                }
            }
            position += 1;
        }
        Ok(changed)
    }

    fn try_candidate(
        &mut self,
        mut steps: Vec<Tree<AnyCommand<M, R>>>,
    ) -> Result<Option<Candidate<M, R>>> {
        if steps.is_empty() {
            return Ok(None);
        }
        let commands: Vec<AnyCommand<M, R>> = steps.iter().map(|step| step.value.clone()).collect();

        let (model, real) = (self.factory)();
        if first_invalid(model.clone(), &commands).is_some() {
            return Ok(None);
        }

        self.replays += 1;
        match Runner::new(model, real).execute(&commands, self.seed)? {
            Outcome::Failed { index, failure } => {
                steps.truncate(index + 1);
                Ok(Some(Candidate {
                    steps,
                    index,
                    failure,
                }))
            }
            _ => Ok(None),
        }
    }

    fn accept(&mut self, best: &mut Candidate<M, R>, accepted: Candidate<M, R>) {
        *best = accepted;
        debug!(
            len = best.steps.len(),
            failing_index = best.index,
            replays = self.replays,
            "accepted shrink"
        );
        self.record(best);
    }

    fn record(&mut self, candidate: &Candidate<M, R>) {
        self.progression.push(ShrinkStep {
            step: self.progression.len(),
            sequence: describe(&candidate.steps),
            failing_index: candidate.index,
        });
    }
}

fn describe<M, R>(steps: &[Tree<AnyCommand<M, R>>]) -> Vec<String> {
    steps.iter().map(|step| step.value.describe()).collect()
}
