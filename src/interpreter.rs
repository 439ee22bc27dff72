//! Execution of compiled templates.

pub mod eval;
pub mod scope;
pub mod value;

pub use eval::{EvalContext, RESPONSE_VAR};
pub use scope::Scope;
pub use value::{Scalar, StdlibFunction, Value};
