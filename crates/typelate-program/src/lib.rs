//! # Typelate Program
//!
//! A program is a linear plan of function calls produced by translation:
//! each step is a call into a host API (or a terminal value), and arguments
//! may be literals, arrays, objects, nested calls, or back-references to the
//! results of earlier steps.
//!
//! Programs are validated against an [`ApiSurface`] before any step runs -
//! unknown functions, arity mismatches, impossible argument types and
//! forward references all reject the plan up front. The interpreter then
//! executes steps strictly in order, awaiting each call before starting the
//! next.

mod error;
mod interpret;
mod model;
mod surface;
mod validate;

pub use error::ProgramError;
pub use interpret::{run, run_with};
pub use model::{Expr, FunctionCall, Program, Step, PROGRAM_SCHEMA_TEXT};
pub use surface::{ApiError, ApiFunction, ApiSurface, FunctionDecl, ParamType};
pub use validate::validate_program;
