//! Watching a long failing sequence shrink.
//!
//! The register below loses its value when written exactly 3 times
//! in a row without a read in between.

use lockstep_core::*;

#[derive(Debug, Default)]
struct Register {
    value: u32,
    unread_writes: usize,
}

#[derive(Debug, Clone)]
struct Write(u32);

#[derive(Debug, Clone)]
struct Read;

impl Command<u32, Register> for Write {
    fn apply(&self, model: &mut u32) {
        *model = self.0;
    }

    fn run(&self, _model: &u32, real: &mut Register) -> Result<(), Failure> {
        real.unread_writes += 1;
        real.value = if real.unread_writes == 3 { 0 } else { self.0 };
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Write({})", self.0)
    }
}

impl Command<u32, Register> for Read {
    fn apply(&self, _model: &mut u32) {}

    fn run(&self, model: &u32, real: &mut Register) -> Result<(), Failure> {
        real.unread_writes = 0;
        ensure_eq!(real.value, *model);
        Ok(())
    }

    fn describe(&self) -> String {
        "Read".to_string()
    }
}

fn main() {
    let machine = StateMachine::new(|| (0u32, Register::default()))
        .named("register")
        .weighted(2, Gen::<u32>::int_range(0, 1000).map(Write))
        .constant(Read);

    let config = Config::default()
        .with_tests(200)
        .with_sequence_length(60)
        .with_seed(2024);

    let report = match machine.run(&config) {
        Ok(report) => report,
        Err(err) => {
            println!("error: {err}");
            return;
        }
    };
    println!("{report}");

    if let Some(counterexample) = report.counterexample() {
        println!(
            "Shrunk {} commands down to {} using {} replays.",
            counterexample.original_index + 1,
            counterexample.shrunk.len(),
            counterexample.replays
        );

        // The trial seed alone rebuilds the original failing sequence
        let replayed = machine.replay_with(&config, counterexample.trial_seed);
        println!("Replayed sequence: {replayed}");
    }
}
