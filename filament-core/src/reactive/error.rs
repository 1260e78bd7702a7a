//! Evaluation failures.
//!
//! A computed cell's closure failing is not an abort: the failure is cached
//! as the cell's current state and handed back to every reader until a
//! dependency change invalidates it. That requires the error type to be
//! cheaply cloneable, hence the `Arc<str>` message payload.

use std::sync::Arc;

use thiserror::Error;

use super::derivation::CellId;

/// Boxed error type for reaction bodies and fallible compute closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure produced while evaluating a computed cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The cell's evaluation re-entered itself, directly or through other
    /// computed cells. Cyclic dependency graphs are a contract violation;
    /// this error is the detector, not a supported state.
    #[error("cyclic dependency while evaluating computed cell {cell:?}")]
    Cycle {
        /// The cell whose evaluation was re-entered.
        cell: CellId,
    },

    /// The compute closure returned an error.
    #[error("computed cell evaluation failed: {message}")]
    Failed {
        /// Rendered message of the underlying failure.
        message: Arc<str>,
    },
}

impl EvalError {
    /// Wrap an arbitrary failure as a cached evaluation error.
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed {
            message: message.to_string().into(),
        }
    }

    /// Whether this failure is a cycle detection.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

impl From<BoxError> for EvalError {
    fn from(err: BoxError) -> Self {
        Self::failed(err)
    }
}
