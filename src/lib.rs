//! A template language for scripting interactive command-line sessions.
//!
//! A script is ordinary device commands, line by line, with `{...}` code
//! blocks mixed in for variables, conditions, loops and response
//! extraction:
//!
//! ```text
//! show ip int brief
//! {
//!     extract /^(Fa\S+)\s+(\S+)/ as interface, address
//!     fail "no FastEthernet ports found" if list.length(interface) is 0
//! }
//! show run interface $interface
//! ```
//!
//! [`compiler::parse`] compiles a script into a reusable
//! [`compiler::Program`]; executing it against a [`connection::Connection`]
//! yields the device output and the final variables.

pub mod ast;
pub mod compiler;
pub mod connection;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod subst;
pub mod token;

pub use compiler::{parse, parse_file, Compiler, Execution, Program};
pub use connection::{Connection, ConnectionError, EchoConnection};
pub use error::{RuntimeError, SyntaxError};
pub use interpreter::{Scalar, Value};
