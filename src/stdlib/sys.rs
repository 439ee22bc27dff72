//! `sys.*` builtins.

use std::env;

use crate::error::RuntimeError;
use crate::interpreter::{EvalContext, Scalar};
use crate::stdlib::{require_args, text_arg};

/// Environment variable lookup; unset names read as an empty string.
pub fn env(_ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("sys.env", &args, 1)?;
    let name = text_arg(&args, 0);
    Ok(vec![Scalar::Text(env::var(name).unwrap_or_default())])
}

/// Operator-facing note, collected separately from device output.
pub fn message(
    ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    let rendered: Vec<String> = args
        .iter()
        .flatten()
        .map(Scalar::to_text)
        .collect();
    ctx.messages.push(rendered.join(" "));
    Ok(Vec::new())
}

/// Stop the script after the current statement, without an error.
pub fn exit(ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("sys.exit", &args, 0)?;
    ctx.request_exit();
    Ok(Vec::new())
}
