//! Error types for lockstep model-based testing.

use std::any::Any;
use thiserror::Error;

/// Errors that abort a whole run.
///
/// Assertion failures and precondition exhaustion are ordinary trial
/// outcomes and are reported through [`crate::Report`], not through this type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LockstepError {
    /// A command was about to run while its precondition was false.
    ///
    /// This means the sequence builder or the shrinker produced an invalid
    /// sequence, so no other result of the run can be trusted.
    #[error("internal consistency violation: precondition of `{command}` is false at index {index} (seed {seed})")]
    InternalConsistency {
        seed: u64,
        index: usize,
        command: String,
        sequence: Vec<String>,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A worker thread died outside of a command.
    #[error("Worker thread panicked: {message}")]
    WorkerPanicked { message: String },
}

/// Result type for lockstep operations.
pub type Result<T, E = LockstepError> = std::result::Result<T, E>;

/// A divergence between the model and the real system observed by a command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct Failure {
    /// What went wrong.
    pub message: String,
    /// Whether the failure came from a panic rather than a returned error.
    pub panicked: bool,
}

impl Failure {
    /// Create a failure from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Failure {
            message: message.into(),
            panicked: false,
        }
    }

    /// Build a failure from a captured panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "command panicked".to_string()
        };
        Failure {
            message,
            panicked: true,
        }
    }

    /// Short label used by the report.
    pub fn kind(&self) -> &'static str {
        if self.panicked {
            "Panic"
        } else {
            "Assertion Failure"
        }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::new(message)
    }
}

/// Return a [`Failure`] from the enclosing `run` unless the condition holds.
///
/// ```rust
/// use lockstep_core::{ensure, Failure};
///
/// fn check(len: usize) -> Result<(), Failure> {
///     ensure!(len < 10, "length {} too large", len);
///     Ok(())
/// }
/// assert!(check(3).is_ok());
/// assert!(check(30).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err($crate::Failure::new(concat!(
                "condition failed: `",
                stringify!($cond),
                "`"
            )));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return ::std::result::Result::Err($crate::Failure::new(format!($($arg)+)));
        }
    };
}

/// Return a [`Failure`] from the enclosing `run` unless both sides are equal.
///
/// The first argument is what the real system reported, the second is what
/// the model expects.
#[macro_export]
macro_rules! ensure_eq {
    ($real:expr, $model:expr $(,)?) => {
        match (&$real, &$model) {
            (real, model) => {
                if real != model {
                    return ::std::result::Result::Err($crate::Failure::new(format!(
                        "`{}` != `{}` (real: {:?}, model: {:?})",
                        stringify!($real),
                        stringify!($model),
                        real,
                        model
                    )));
                }
            }
        }
    };
    ($real:expr, $model:expr, $($arg:tt)+) => {
        match (&$real, &$model) {
            (real, model) => {
                if real != model {
                    return ::std::result::Result::Err($crate::Failure::new(format!(
                        "{} (real: {:?}, model: {:?})",
                        format!($($arg)+),
                        real,
                        model
                    )));
                }
            }
        }
    };
}
