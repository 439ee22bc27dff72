//! `connection.*` builtins: direct access to the session from code blocks.

use crate::error::RuntimeError;
use crate::interpreter::{EvalContext, Scalar};
use crate::stdlib::{require_args, text_arg};

/// Send text without waiting for a response. The response buffer is left
/// untouched.
pub fn send(ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("connection.send", &args, 1)?;
    let text = text_arg(&args, 0);
    ctx.connection()?.send(&text)?;
    Ok(Vec::new())
}

/// Run a command exactly like a template line would, refreshing
/// `__response__`, and return the response lines.
pub fn exec(ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("connection.exec", &args, 1)?;
    let command = text_arg(&args, 0);
    ctx.execute_command(&command)?;
    let lines = ctx
        .output
        .last()
        .map(|response| {
            response
                .lines()
                .map(|line| Scalar::Text(line.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Ok(lines)
}

pub fn guess_os(
    ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("connection.guess_os", &args, 0)?;
    let os = ctx.connection()?.guess_os().to_string();
    Ok(vec![Scalar::Text(os)])
}
