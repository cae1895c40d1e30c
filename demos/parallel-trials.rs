//! Spreading trials over worker threads.
//!
//! Reports are identical for every thread count; only wall-clock time changes.

use lockstep::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u16),
    Get(u8),
    Remove(u8),
}

impl Command<HashMap<u8, u16>, Vec<(u8, u16)>> for Op {
    fn apply(&self, model: &mut HashMap<u8, u16>) {
        match self {
            Op::Put(k, v) => {
                model.insert(*k, *v);
            }
            Op::Get(_) => {}
            Op::Remove(k) => {
                model.remove(k);
            }
        }
    }

    fn run(&self, model: &HashMap<u8, u16>, real: &mut Vec<(u8, u16)>) -> Result<(), Failure> {
        match self {
            Op::Put(k, v) => match real.iter_mut().find(|(key, _)| key == k) {
                Some(entry) => entry.1 = *v,
                None => real.push((*k, *v)),
            },
            Op::Get(k) => {
                let found = real.iter().find(|(key, _)| key == k).map(|(_, v)| *v);
                ensure_eq!(found, model.get(k).copied());
            }
            Op::Remove(k) => real.retain(|(key, _)| key != k),
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

fn key() -> Gen<u8> {
    Gen::<u32>::int_range(0, 15).map(|k| k as u8)
}

fn main() {
    let machine = StateMachine::new(|| (HashMap::new(), Vec::new()))
        .named("association list")
        .weighted(
            3,
            key()
                .zip(Gen::<u32>::int_range(0, 999))
                .map(|(k, v)| Op::Put(k, v as u16)),
        )
        .weighted(3, key().map(Op::Get))
        .command(key().map(Op::Remove));

    let config = Config::default()
        .with_tests(4000)
        .with_sequence_length(80)
        .with_seed(99);

    let mut reports = Vec::new();
    for threads in [1, 2, 4, 0] {
        let start = Instant::now();
        match machine.run(&config.clone().with_threads(threads)) {
            Ok(report) => {
                let label = if threads == 0 {
                    format!("auto ({})", config.clone().with_threads(0).effective_threads())
                } else {
                    threads.to_string()
                };
                println!("threads {label:>8}: {:?}", start.elapsed());
                reports.push(report);
            }
            Err(err) => println!("threads {threads}: error: {err}"),
        }
    }
    println!(
        "all reports identical: {}",
        reports.windows(2).all(|pair| pair[0] == pair[1])
    );

    // A budget too small for the run gives up with the trials left
    let budget = config.with_time_budget(Duration::from_millis(1));
    match machine.run(&budget) {
        Ok(report) => println!("{report}"),
        Err(err) => println!("error: {err}"),
    }
}
