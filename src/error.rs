use thiserror::Error;

use crate::connection::ConnectionError;

/// Fatal compile-time errors. Every variant carries the source position and
/// the offending text; there is no partial-compile recovery.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("no grammar rule matches '{text}' at line {line}, column {column}")]
    InvalidToken {
        text: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("in {owner}: expected {expected}, got '{got}' at line {line}, column {column}")]
    UnexpectedToken {
        owner: String,
        expected: String,
        got: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("undeclared variable '{name}' at line {line}, column {column}")]
    UndeclaredVariable {
        name: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("unknown function '{name}' at line {line}, column {column}")]
    UnknownFunction {
        name: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("assignment to reserved name '{name}' at line {line}, column {column}")]
    ReservedName {
        name: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("duplicate extract destination '{name}' at line {line}, column {column}")]
    DuplicateDestination {
        name: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error(
        "regex has {groups} capture groups but {names} destination variables at line {line}, column {column}"
    )]
    GroupCountMismatch {
        groups: usize,
        names: usize,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("invalid regex /{pattern}/ at line {line}, column {column}: {message}")]
    InvalidRegex {
        pattern: String,
        message: String,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("invalid regex modifier '{modifier}' at line {line}, column {column} (only 'i' is supported)")]
    InvalidRegexModifier {
        modifier: char,
        offset: usize,
        line: usize,
        column: usize,
    },
    #[error("invalid number literal '{text}' at line {line}, column {column}")]
    InvalidNumber {
        text: String,
        offset: usize,
        line: usize,
        column: usize,
    },
}

/// Errors raised while evaluating a compiled script.
///
/// `Fail` is the distinguished script-level failure signal raised by the
/// `fail` statement; `Connection` is the only kind a `try` block catches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("'{name}' is not callable")]
    NotCallable { name: String },
    #[error("cannot substitute function '{name}' into text")]
    FunctionInText { name: String },
    #[error("expected a number, got '{got}'")]
    NotANumber { got: String },
    #[error("parallel loop lists differ in length ({first} vs {other})")]
    ListLengthMismatch { first: usize, other: usize },
    #[error("invalid regex /{pattern}/ after substitution: {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("'matches' requires a regex literal on its right-hand side")]
    MatchesNeedsRegex,
    #[error("modulo by zero")]
    ModuloByZero,
    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },
    #[error("no connection available")]
    NoConnection,
    #[error("{0}")]
    Fail(String),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// 1-based line and column of a byte offset, for error messages.
pub fn locate(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|pos| offset - pos - 1)
        .unwrap_or(offset)
        + 1;
    (line, column)
}
