//! A bounded stack checked against a counter model.
//!
//! Run with `cargo run -p lockstep-core --example stack`.

use lockstep_core::*;

const CAPACITY: usize = 8;

#[derive(Debug, Clone, Default)]
struct Model {
    depth: usize,
}

/// A stack that is supposed to reject pushes once full.
#[derive(Debug, Default)]
struct BoundedStack {
    items: Vec<i64>,
    /// Off-by-one in the capacity check.
    buggy: bool,
}

impl BoundedStack {
    fn push(&mut self, value: i64) -> bool {
        let limit = if self.buggy { CAPACITY + 1 } else { CAPACITY };
        if self.items.len() >= limit {
            return false;
        }
        self.items.push(value);
        true
    }

    fn pop(&mut self) -> Option<i64> {
        self.items.pop()
    }
}

#[derive(Debug, Clone)]
struct Push(i64);

#[derive(Debug, Clone)]
struct Pop;

impl Command<Model, BoundedStack> for Push {
    fn apply(&self, model: &mut Model) {
        if model.depth < CAPACITY {
            model.depth += 1;
        }
    }

    fn run(&self, model: &Model, real: &mut BoundedStack) -> Result<(), Failure> {
        let accepted = real.push(self.0);
        ensure_eq!(accepted, model.depth < CAPACITY, "push acceptance");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Push({})", self.0)
    }
}

impl Command<Model, BoundedStack> for Pop {
    fn check(&self, model: &Model) -> bool {
        model.depth > 0
    }

    fn apply(&self, model: &mut Model) {
        model.depth -= 1;
    }

    fn run(&self, _model: &Model, real: &mut BoundedStack) -> Result<(), Failure> {
        ensure!(real.pop().is_some(), "pop on a non-empty stack returned nothing");
        Ok(())
    }

    fn describe(&self) -> String {
        "Pop".to_string()
    }
}

fn machine(buggy: bool) -> StateMachine<Model, BoundedStack> {
    StateMachine::new(move || {
        (
            Model::default(),
            BoundedStack {
                items: Vec::new(),
                buggy,
            },
        )
    })
    .named("bounded stack")
    .weighted(3, Gen::<i64>::int_range(-100, 100).map(Push))
    .constant(Pop)
}

fn main() {
    println!("Bounded stack");
    println!("=============");

    let config = Config::default().with_tests(500).with_sequence_length(40);

    println!("\nCorrect implementation:");
    match machine(false).run(&config) {
        Ok(report) => println!("{report}"),
        Err(err) => println!("error: {err}"),
    }

    println!("\nOff-by-one capacity check:");
    match machine(true).run(&config) {
        Ok(report) => println!("{report}"),
        Err(err) => println!("error: {err}"),
    }
}
