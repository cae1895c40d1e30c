//! Commands: guarded operations applied to a model and a real system in lockstep.

use crate::{error::Failure, gen::Gen};
use std::fmt;
use std::rc::Rc;

/// A single guarded operation on a `(model, real)` pair.
///
/// `M` is the simplified reference model, `R` the system under test. Command
/// values carry their arguments and are never mutated after generation.
///
/// The engine drives a command in two halves: [`Command::run`] exercises the
/// real system and compares what it observes against the model as it was
/// before the step, then [`Command::apply`] commits the model transition.
/// `apply` is also what the sequence builder and the shrinker use to track
/// preconditions without touching a real system.
pub trait Command<M, R> {
    /// Whether the command may run against `model`. Must be pure.
    fn check(&self, _model: &M) -> bool {
        true
    }

    /// Advance the model.
    fn apply(&self, model: &mut M);

    /// Drive the real system, returning a [`Failure`] on divergence.
    fn run(&self, model: &M, real: &mut R) -> Result<(), Failure>;

    /// Stable rendering used in reports, e.g. `Push(3)`.
    fn describe(&self) -> String;
}

/// A type-erased command.
pub type AnyCommand<M, R> = Rc<dyn Command<M, R>>;

/// Weighted command generators.
///
/// Each entry is drawn with probability proportional to its weight. Entries
/// added with [`CommandSet::add`] have weight 1.
pub struct CommandSet<M, R> {
    entries: Vec<(u32, Gen<AnyCommand<M, R>>)>,
}

impl<M, R> Clone for CommandSet<M, R> {
    fn clone(&self) -> Self {
        CommandSet {
            entries: self.entries.clone(),
        }
    }
}

impl<M, R> Default for CommandSet<M, R> {
    fn default() -> Self {
        CommandSet {
            entries: Vec::new(),
        }
    }
}

impl<M, R> fmt::Debug for CommandSet<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let weights: Vec<u32> = self.entries.iter().map(|(weight, _)| *weight).collect();
        f.debug_struct("CommandSet")
            .field("weights", &weights)
            .finish()
    }
}

impl<M: 'static, R: 'static> CommandSet<M, R> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command generator with weight 1.
    pub fn add<C>(&mut self, gen: Gen<C>) -> &mut Self
    where
        C: Command<M, R> + 'static,
    {
        self.add_weighted(1, gen)
    }

    /// Add a command generator with an explicit weight.
    pub fn add_weighted<C>(&mut self, weight: u32, gen: Gen<C>) -> &mut Self
    where
        C: Command<M, R> + 'static,
    {
        self.entries.push((weight, erase(gen)));
        self
    }

    /// Add a command that takes no generated arguments.
    pub fn add_constant<C>(&mut self, command: C) -> &mut Self
    where
        C: Command<M, R> + Clone + Send + Sync + 'static,
    {
        self.add(Gen::constant(command))
    }

    /// Add an already type-erased generator.
    pub fn add_erased(&mut self, weight: u32, gen: Gen<AnyCommand<M, R>>) -> &mut Self {
        self.entries.push((weight, gen));
        self
    }

    /// Merge the entries of another set into this one.
    pub fn extend(&mut self, other: CommandSet<M, R>) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights. Zero means nothing can ever be drawn.
    pub fn total_weight(&self) -> u64 {
        self.entries.iter().map(|(weight, _)| *weight as u64).sum()
    }

    /// A single generator drawing from the whole set by weight.
    pub fn generator(&self) -> Gen<AnyCommand<M, R>> {
        Gen::frequency(self.entries.clone())
    }
}

/// Type-erase a command generator, keeping its shrink trees.
pub fn erase<M, R, C>(gen: Gen<C>) -> Gen<AnyCommand<M, R>>
where
    M: 'static,
    R: 'static,
    C: Command<M, R> + 'static,
{
    gen.map(|command| Rc::new(command) as AnyCommand<M, R>)
}
