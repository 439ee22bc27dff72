//! Compiling templates and running the result.
//!
//! [`Compiler`] holds the initial variable set (builtins plus anything the
//! caller defines) and turns source text into a [`Program`]. A program is
//! immutable and cheap to clone, so one compile can drive many hosts; each
//! [`Program::execute`] runs with a fresh scope seeded from the program's
//! variables.

use rustc_hash::FxHashMap;

use crate::ast::Template;
use crate::connection::Connection;
use crate::error::{RuntimeError, SyntaxError};
use crate::interpreter::{EvalContext, Scope, Value};
use crate::parser::{Parser, SymbolTable};
use crate::stdlib;

pub struct Compiler {
    variables: FxHashMap<String, Value>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        let mut variables = FxHashMap::default();
        stdlib::register(&mut variables);
        Self { variables }
    }

    /// Predefine a variable; scripts may reference it without assigning
    /// first.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn compile(&self, source: &str) -> Result<Program, SyntaxError> {
        let mut symbols = SymbolTable::new();
        for (name, value) in &self.variables {
            match value {
                Value::Function(_) => symbols.declare_function(name),
                Value::List(_) => symbols.declare(name),
            }
        }
        let template = Parser::new(source, symbols).parse_template()?;
        Ok(Program {
            template,
            variables: self.variables.clone(),
        })
    }
}

/// A compiled template plus its initial variables.
#[derive(Clone)]
pub struct Program {
    template: Template,
    variables: FxHashMap<String, Value>,
}

impl Program {
    /// Override an initial variable for subsequent runs, e.g. a per-host
    /// address.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn execute(&self, conn: &mut dyn Connection) -> Result<Execution, RuntimeError> {
        self.run(Some(conn))
    }

    /// Run without a session; any statement touching the connection fails
    /// with [`RuntimeError::NoConnection`].
    pub fn execute_offline(&self) -> Result<Execution, RuntimeError> {
        self.run(None)
    }

    fn run(&self, conn: Option<&mut dyn Connection>) -> Result<Execution, RuntimeError> {
        let mut scope = Scope::new();
        for (name, value) in &self.variables {
            scope.bind(name, value.clone());
        }
        let mut ctx = EvalContext::new(scope, conn);
        ctx.run(&self.template)?;
        let variables = ctx
            .scope
            .root()
            .iter()
            .filter(|(_, value)| matches!(value, Value::List(_)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(Execution {
            variables,
            output: ctx.output,
            messages: ctx.messages,
        })
    }
}

/// What one run produced: the final top-level variables, the raw response
/// of every executed command in order, and any `sys.message` notes.
#[derive(Debug)]
pub struct Execution {
    pub variables: FxHashMap<String, Value>,
    pub output: Vec<String>,
    pub messages: Vec<String>,
}

/// Compile with only the builtins defined.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    Compiler::new().compile(source)
}

/// Read and compile a script file.
pub fn parse_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Program> {
    use anyhow::Context;

    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    Compiler::new()
        .compile(&source)
        .with_context(|| format!("cannot compile '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_variables_pass_the_static_check() {
        let mut compiler = Compiler::new();
        compiler.define("host", Value::text("r1"));
        assert!(compiler.compile("ping $host\n").is_ok());
        assert!(parse("ping $host\n").is_err());
    }

    #[test]
    fn compile_rejects_runtime_free_syntax_errors() {
        assert!(parse("{x = }\n").is_err());
        assert!(parse("{loop from 1 to}\n").is_err());
    }
}
