//! Lockstep model-based testing library.
//!
//! This is the main entry point for lockstep: describe a system as commands
//! over a model and a real implementation, and let the engine generate,
//! run and shrink command sequences.
//!
//! ```rust
//! use lockstep::*;
//!
//! #[derive(Clone)]
//! struct Push(i32);
//! #[derive(Clone)]
//! struct Size;
//!
//! impl Command<usize, Vec<i32>> for Push {
//!     fn apply(&self, count: &mut usize) {
//!         *count += 1;
//!     }
//!     fn run(&self, _count: &usize, stack: &mut Vec<i32>) -> Result<(), Failure> {
//!         stack.push(self.0);
//!         Ok(())
//!     }
//!     fn describe(&self) -> String {
//!         format!("Push({})", self.0)
//!     }
//! }
//!
//! impl Command<usize, Vec<i32>> for Size {
//!     fn apply(&self, _count: &mut usize) {}
//!     fn run(&self, count: &usize, stack: &mut Vec<i32>) -> Result<(), Failure> {
//!         ensure_eq!(stack.len(), *count);
//!         Ok(())
//!     }
//!     fn describe(&self) -> String {
//!         "Size".to_string()
//!     }
//! }
//!
//! StateMachine::new(|| (0usize, Vec::new()))
//!     .named("stack")
//!     .command(Gen::<i32>::int_range(-1000, 1000).map(Push))
//!     .constant(Size)
//!     .assert(&Config::default().with_tests(50));
//! ```

pub use lockstep_core::*;

// Re-export derive macros when available
#[cfg(feature = "derive")]
pub use lockstep_derive::*;
