//! Building precondition-valid command sequences.

use crate::{
    command::{AnyCommand, CommandSet},
    data::{Seed, Size},
    tree::Tree,
};
use std::fmt;
use tracing::trace;

/// An ordered list of generated commands plus the seed that produced it.
///
/// Every command keeps its shrink tree so the shrinker can later try
/// simpler arguments.
pub struct Sequence<M, R> {
    /// Trial seed the sequence was built from.
    pub seed: u64,
    /// Generated commands in execution order.
    pub steps: Vec<Tree<AnyCommand<M, R>>>,
    /// Whether construction stopped early because no command qualified.
    pub exhausted: bool,
}

impl<M, R> Clone for Sequence<M, R> {
    fn clone(&self) -> Self {
        Sequence {
            seed: self.seed,
            steps: self.steps.clone(),
            exhausted: self.exhausted,
        }
    }
}

impl<M, R> Sequence<M, R> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The commands themselves, without their shrink trees.
    pub fn commands(&self) -> Vec<AnyCommand<M, R>> {
        self.steps.iter().map(|step| step.value.clone()).collect()
    }

    /// `describe()` of every command, in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.value.describe()).collect()
    }
}

impl<M, R> fmt::Debug for Sequence<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("seed", &self.seed)
            .field("commands", &self.descriptions())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl<M, R> fmt::Display for Sequence<M, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.descriptions().join(", "))
    }
}

/// Draws commands from a [`CommandSet`] while tracking a provisional model.
pub struct SequenceBuilder<'a, M, R> {
    commands: &'a CommandSet<M, R>,
    size: Size,
    retry_limit: usize,
}

impl<'a, M: 'static, R: 'static> SequenceBuilder<'a, M, R> {
    pub fn new(commands: &'a CommandSet<M, R>, size: Size, retry_limit: usize) -> Self {
        SequenceBuilder {
            commands,
            size,
            retry_limit,
        }
    }

    /// Build a sequence of up to `length` commands starting from `model`.
    ///
    /// A drawn command is kept only if its precondition holds against the
    /// provisional model, which then advances by the command's `apply`. After
    /// `retry_limit` consecutive rejections (including draws where the
    /// generator came up empty) the sequence is cut short and marked
    /// exhausted.
    pub fn build(&self, mut model: M, length: usize, seed: u64) -> Sequence<M, R> {
        let generator = self.commands.generator();
        let mut rng = Seed::from_u64(seed);
        let mut steps = Vec::with_capacity(length);
        let mut rejections = 0;
        let mut exhausted = false;

        while steps.len() < length {
            if self.commands.total_weight() == 0 || rejections >= self.retry_limit {
                exhausted = true;
                break;
            }

            let (draw, next) = rng.split();
            rng = next;
            match generator.generate(self.size, draw) {
                Some(tree) if tree.value.check(&model) => {
                    tree.value.apply(&mut model);
                    steps.push(tree);
                    rejections = 0;
                }
                _ => rejections += 1,
            }
        }

        trace!(seed, len = steps.len(), exhausted, "built sequence");
        Sequence {
            seed,
            steps,
            exhausted,
        }
    }
}

/// Simulate `commands` on `model` and return the index of the first command
/// whose precondition does not hold, if any.
pub fn first_invalid<'a, M, R>(
    mut model: M,
    commands: impl IntoIterator<Item = &'a AnyCommand<M, R>>,
) -> Option<usize>
where
    M: 'a,
    R: 'a,
{
    for (index, command) in commands.into_iter().enumerate() {
        if !command.check(&model) {
            return Some(index);
        }
        command.apply(&mut model);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Failure, gen::Gen, Command};

    #[derive(Clone)]
    struct Take;

    impl Command<u32, ()> for Take {
        fn check(&self, model: &u32) -> bool {
            *model > 0
        }

        fn apply(&self, model: &mut u32) {
            *model -= 1;
        }

        fn run(&self, _model: &u32, _real: &mut ()) -> Result<(), Failure> {
            Ok(())
        }

        fn describe(&self) -> String {
            "Take".to_string()
        }
    }

    #[derive(Clone)]
    struct Give(u32);

    impl Command<u32, ()> for Give {
        fn apply(&self, model: &mut u32) {
            *model += self.0;
        }

        fn run(&self, _model: &u32, _real: &mut ()) -> Result<(), Failure> {
            Ok(())
        }

        fn describe(&self) -> String {
            format!("Give({})", self.0)
        }
    }

    fn both() -> CommandSet<u32, ()> {
        let mut set = CommandSet::new();
        set.add(Gen::<u32>::int_range(1, 3).map(Give))
            .add_constant(Take);
        set
    }

    #[test]
    fn test_builds_requested_length() {
        let set = both();
        let sequence = SequenceBuilder::new(&set, Size(30), 100).build(0, 40, 7);
        assert_eq!(sequence.len(), 40);
        assert!(!sequence.exhausted);
        assert_eq!(sequence.seed, 7);
    }

    #[test]
    fn test_generated_sequences_are_precondition_valid() {
        let set = both();
        let builder = SequenceBuilder::new(&set, Size(30), 100);
        for seed in 0..50 {
            let sequence = builder.build(0, 30, seed);
            assert_eq!(first_invalid(0, &sequence.commands()), None);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let set = both();
        let builder = SequenceBuilder::new(&set, Size(30), 100);
        assert_eq!(
            builder.build(0, 25, 99).descriptions(),
            builder.build(0, 25, 99).descriptions()
        );
    }

    #[test]
    fn test_impossible_precondition_exhausts() {
        let mut set: CommandSet<u32, ()> = CommandSet::new();
        set.add_constant(Take);
        let sequence = SequenceBuilder::new(&set, Size(30), 5).build(2, 10, 1);
        assert_eq!(sequence.descriptions(), vec!["Take", "Take"]);
        assert!(sequence.exhausted);
    }

    #[test]
    fn test_empty_set_exhausts_immediately() {
        let set: CommandSet<u32, ()> = CommandSet::new();
        let sequence = SequenceBuilder::new(&set, Size(30), 100).build(0, 10, 1);
        assert!(sequence.is_empty());
        assert!(sequence.exhausted);
    }

    #[test]
    fn test_first_invalid() {
        let give: AnyCommand<u32, ()> = std::rc::Rc::new(Give(1));
        let take: AnyCommand<u32, ()> = std::rc::Rc::new(Take);
        assert_eq!(first_invalid(0, &[give.clone(), take.clone()]), None);
        assert_eq!(first_invalid(0, &[give, take.clone(), take]), Some(2));
    }
}
