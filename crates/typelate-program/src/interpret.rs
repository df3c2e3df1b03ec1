//! Program interpreter - executes validated programs against an API surface.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ProgramError;
use crate::model::{Expr, FunctionCall, Program, Step};
use crate::surface::{ApiSurface, ParamType};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Run a program against an API surface.
///
/// Steps execute strictly in declaration order; each call is awaited before
/// the next step starts, even when the dependency graph would permit
/// concurrency. The last step's result is the program's result.
pub async fn run(program: &Program, surface: &ApiSurface) -> Result<Value, ProgramError> {
    run_with(program, surface, &CancellationToken::new()).await
}

/// Run a program, checking the cancellation token between steps.
pub async fn run_with(
    program: &Program,
    surface: &ApiSurface,
    cancel: &CancellationToken,
) -> Result<Value, ProgramError> {
    let mut results: Vec<Value> = Vec::with_capacity(program.steps.len());

    for (index, step) in program.steps.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ProgramError::Cancelled);
        }

        debug!(step = index, "executing program step");
        let value = match step {
            Step::Call(call) => eval_call(call, index, &results, surface).await?,
            Step::Value(expr) => eval_expr(expr, index, &results, surface).await?,
        };
        results.push(value);
    }

    Ok(results.pop().unwrap_or(Value::Null))
}

fn eval_expr<'a>(
    expr: &'a Expr,
    step: usize,
    results: &'a [Value],
    surface: &'a ApiSurface,
) -> BoxFuture<'a, Result<Value, ProgramError>> {
    Box::pin(async move {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ref(referenced) => {
                // Guaranteed present by the no-forward-reference invariant,
                // but guard anyway for programs run without validation.
                results
                    .get(*referenced)
                    .cloned()
                    .ok_or(ProgramError::ForwardRef {
                        step,
                        referenced: *referenced,
                    })
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(eval_expr(item, step, results, surface).await?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(fields) => {
                let mut map = serde_json::Map::with_capacity(fields.len());
                for (key, value) in fields {
                    map.insert(key.clone(), eval_expr(value, step, results, surface).await?);
                }
                Ok(Value::Object(map))
            }
            Expr::Call(call) => eval_call(call, step, results, surface).await,
        }
    })
}

async fn eval_call(
    call: &FunctionCall,
    step: usize,
    results: &[Value],
    surface: &ApiSurface,
) -> Result<Value, ProgramError> {
    let decl = surface
        .decl(&call.func)
        .ok_or_else(|| ProgramError::FunctionNotFound(call.func.clone()))?;

    // Arguments resolve depth-first before the call dispatches.
    let mut args = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        args.push(eval_expr(arg, step, results, surface).await?);
    }

    // Back-reference argument types are only knowable here, once resolved.
    for (index, (value, param)) in args.iter().zip(&decl.params).enumerate() {
        if !param.accepts(value) {
            return Err(ProgramError::TypeMismatch {
                func: call.func.clone(),
                index,
                expected: param.name(),
                found: ParamType::of(value).name(),
            });
        }
    }

    let handler = surface
        .handler(&call.func)
        .ok_or_else(|| ProgramError::FunctionNotFound(call.func.clone()))?;

    handler
        .call(args)
        .await
        .map_err(|source| ProgramError::ExecutionFailed { step, source })
}
