//! Core functionality for lockstep model-based testing.
//!
//! A test describes a system as a set of guarded [`Command`]s acting on a
//! simplified model and on the real implementation. The engine generates
//! random, precondition-valid command sequences, runs each one against a
//! fresh `(model, real)` pair, and when the two disagree it shrinks the
//! sequence down to a minimal counterexample.

pub mod command;
pub mod data;
pub mod error;
pub mod gen;
pub mod machine;
pub mod report;
pub mod runner;
pub mod sequence;
pub mod shrink;
pub mod tree;

// Re-export the main types
pub use command::*;
pub use data::*;
pub use error::*;
pub use gen::*;
pub use machine::*;
pub use report::*;
pub use runner::*;
pub use sequence::*;
pub use shrink::*;
pub use tree::*;
