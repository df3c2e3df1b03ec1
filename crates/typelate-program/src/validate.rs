//! Structural validation of a program against an API surface.
//!
//! Unlike response validation, this is fail-fast: programs are executable,
//! and a single broken call makes the whole plan unsafe to run.

use crate::error::ProgramError;
use crate::model::{Expr, FunctionCall, Program, Step};
use crate::surface::{ApiSurface, ParamType};

/// Validate every call in the program, in pre-order, stopping at the first
/// structural error. Checks function existence, argument counts, statically
/// knowable argument types, and the no-forward-reference invariant.
pub fn validate_program(program: &Program, surface: &ApiSurface) -> Result<(), ProgramError> {
    for (index, step) in program.steps.iter().enumerate() {
        match step {
            Step::Call(call) => check_call(call, index, surface)?,
            Step::Value(expr) => check_expr(expr, index, surface)?,
        }
    }
    Ok(())
}

fn check_call(call: &FunctionCall, step: usize, surface: &ApiSurface) -> Result<(), ProgramError> {
    let decl = surface
        .decl(&call.func)
        .ok_or_else(|| ProgramError::FunctionNotFound(call.func.clone()))?;

    if call.args.len() != decl.params.len() {
        return Err(ProgramError::ArgCountMismatch {
            func: call.func.clone(),
            expected: decl.params.len(),
            actual: call.args.len(),
        });
    }

    for (index, (arg, param)) in call.args.iter().zip(&decl.params).enumerate() {
        check_expr(arg, step, surface)?;
        if let Some(found) = static_type(arg, surface) {
            if !param.compatible(&found) {
                return Err(ProgramError::TypeMismatch {
                    func: call.func.clone(),
                    index,
                    expected: param.name(),
                    found: found.name(),
                });
            }
        }
    }

    Ok(())
}

fn check_expr(expr: &Expr, step: usize, surface: &ApiSurface) -> Result<(), ProgramError> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Ref(referenced) => {
            // No forward or self references: step results only flow backwards.
            if *referenced >= step {
                Err(ProgramError::ForwardRef {
                    step,
                    referenced: *referenced,
                })
            } else {
                Ok(())
            }
        }
        Expr::Array(items) => {
            for item in items {
                check_expr(item, step, surface)?;
            }
            Ok(())
        }
        Expr::Object(fields) => {
            for value in fields.values() {
                check_expr(value, step, surface)?;
            }
            Ok(())
        }
        Expr::Call(call) => check_call(call, step, surface),
    }
}

/// The argument's JSON-level type, where it can be known without running the
/// program. Back-references are unknowable here and checked at dispatch.
fn static_type(expr: &Expr, surface: &ApiSurface) -> Option<ParamType> {
    match expr {
        Expr::Literal(value) => Some(ParamType::of(value)),
        Expr::Array(_) => Some(ParamType::Array),
        Expr::Object(_) => Some(ParamType::Object),
        Expr::Call(call) => surface.decl(&call.func).map(|decl| decl.returns),
        Expr::Ref(_) => None,
    }
}
