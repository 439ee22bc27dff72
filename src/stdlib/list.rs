//! `list.*` builtins.

use crate::error::RuntimeError;
use crate::interpreter::{EvalContext, Scalar};
use crate::stdlib::{int_arg, require_args};

/// Concatenate all arguments into one fresh list.
pub fn new(_ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    Ok(args.into_iter().flatten().collect())
}

pub fn length(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("list.length", &args, 1)?;
    Ok(vec![Scalar::Int(args[0].len() as i64)])
}

/// Zero-based element access; out-of-range indexes are an error rather
/// than an empty result.
pub fn get(_ctx: &mut EvalContext, args: Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("list.get", &args, 2)?;
    let index = int_arg("list.get", &args, 1)?;
    let item = usize::try_from(index)
        .ok()
        .and_then(|index| args[0].get(index))
        .ok_or_else(|| RuntimeError::InvalidArgument {
            function: "list.get".to_string(),
            message: format!("index {index} out of range for {} elements", args[0].len()),
        })?;
    Ok(vec![item.clone()])
}

/// Deduplicate, keeping first occurrences in order.
pub fn unique(
    _ctx: &mut EvalContext,
    args: Vec<Vec<Scalar>>,
) -> Result<Vec<Scalar>, RuntimeError> {
    require_args("list.unique", &args, 1)?;
    let mut out: Vec<Scalar> = Vec::new();
    for item in &args[0] {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    Ok(out)
}
