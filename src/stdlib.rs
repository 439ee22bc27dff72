//! Built-in functions.
//!
//! Builtins are plain function pointers registered under dotted names
//! (`connection.send`, `ipv4.network`). They receive already-evaluated
//! argument lists and return a list, like every other value in the
//! language.

pub mod conn;
pub mod ipv4;
pub mod list;
pub mod string;
pub mod sys;

use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::interpreter::{Scalar, StdlibFunction, Value};

pub const FUNCTIONS: &[StdlibFunction] = &[
    StdlibFunction {
        name: "connection.send",
        call: conn::send,
    },
    StdlibFunction {
        name: "connection.exec",
        call: conn::exec,
    },
    StdlibFunction {
        name: "connection.guess_os",
        call: conn::guess_os,
    },
    StdlibFunction {
        name: "string.replace",
        call: string::replace,
    },
    StdlibFunction {
        name: "string.tolower",
        call: string::tolower,
    },
    StdlibFunction {
        name: "string.toupper",
        call: string::toupper,
    },
    StdlibFunction {
        name: "list.new",
        call: list::new,
    },
    StdlibFunction {
        name: "list.length",
        call: list::length,
    },
    StdlibFunction {
        name: "list.get",
        call: list::get,
    },
    StdlibFunction {
        name: "list.unique",
        call: list::unique,
    },
    StdlibFunction {
        name: "ipv4.mask",
        call: ipv4::mask,
    },
    StdlibFunction {
        name: "ipv4.network",
        call: ipv4::network,
    },
    StdlibFunction {
        name: "ipv4.broadcast",
        call: ipv4::broadcast,
    },
    StdlibFunction {
        name: "ipv4.in_network",
        call: ipv4::in_network,
    },
    StdlibFunction {
        name: "ipv4.pfxlen2mask",
        call: ipv4::pfxlen2mask,
    },
    StdlibFunction {
        name: "ipv4.mask2pfxlen",
        call: ipv4::mask2pfxlen,
    },
    StdlibFunction {
        name: "ipv4.remote_ip",
        call: ipv4::remote_ip,
    },
    StdlibFunction {
        name: "sys.env",
        call: sys::env,
    },
    StdlibFunction {
        name: "sys.message",
        call: sys::message,
    },
    StdlibFunction {
        name: "sys.exit",
        call: sys::exit,
    },
];

/// Insert every builtin into a variable map under its dotted name.
pub fn register(variables: &mut FxHashMap<String, Value>) {
    for function in FUNCTIONS {
        variables.insert(function.name.to_string(), Value::Function(*function));
    }
}

pub(crate) fn require_args(
    function: &str,
    args: &[Vec<Scalar>],
    count: usize,
) -> Result<(), RuntimeError> {
    if args.len() == count {
        return Ok(());
    }
    Err(RuntimeError::InvalidArgument {
        function: function.to_string(),
        message: format!("expected {count} arguments, got {}", args.len()),
    })
}

/// First element of argument `index` as text; an empty list reads as "".
pub(crate) fn text_arg(args: &[Vec<Scalar>], index: usize) -> String {
    args.get(index)
        .and_then(|list| list.first())
        .map(Scalar::to_text)
        .unwrap_or_default()
}

pub(crate) fn int_arg(
    function: &str,
    args: &[Vec<Scalar>],
    index: usize,
) -> Result<i64, RuntimeError> {
    args.get(index)
        .and_then(|list| list.first())
        .ok_or_else(|| RuntimeError::InvalidArgument {
            function: function.to_string(),
            message: format!("missing argument {}", index + 1),
        })?
        .as_int()
}
