//! Error types for program validation and execution.

use thiserror::Error;

use crate::surface::ApiError;

/// Errors from validating or running a program.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The program calls a function the API surface does not declare.
    #[error("function '{0}' is not part of the API surface")]
    FunctionNotFound(String),

    /// A call passes the wrong number of arguments.
    #[error("'{func}' expects {expected} argument(s), got {actual}")]
    ArgCountMismatch {
        func: String,
        expected: usize,
        actual: usize,
    },

    /// An argument's shape can never satisfy the declared parameter type.
    #[error("'{func}' argument {index} expects {expected}, got {found}")]
    TypeMismatch {
        func: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A step references a result that has not been produced yet.
    #[error("step {step} references the result of step {referenced}, which has not run yet")]
    ForwardRef { step: usize, referenced: usize },

    /// A host function failed at runtime; remaining steps were aborted.
    #[error("step {step} failed: {source}")]
    ExecutionFailed {
        step: usize,
        #[source]
        source: ApiError,
    },

    /// Execution was abandoned by caller request.
    #[error("program execution was cancelled")]
    Cancelled,
}
