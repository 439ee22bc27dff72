//! Runtime values.
//!
//! Every variable a script can touch holds a list of scalars; a scalar
//! result of an expression is wrapped into a one-element list on
//! assignment. Names containing `.` resolve to built-in functions and are
//! the only bindings carrying a [`Value::Function`].

use std::fmt;

use crate::error::RuntimeError;
use crate::interpreter::eval::EvalContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// Numeric view, parsing digit strings. Arithmetic and ordering
    /// comparisons go through here.
    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Scalar::Int(n) => Ok(*n),
            Scalar::Bool(b) => Ok(i64::from(*b)),
            Scalar::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| RuntimeError::NotANumber { got: s.clone() }),
        }
    }

    pub fn is_true(&self) -> bool {
        match self {
            Scalar::Int(n) => *n != 0,
            Scalar::Bool(b) => *b,
            Scalar::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// A built-in function. Calls receive already-evaluated argument lists and
/// the evaluation context, so `connection.*` functions can reach the
/// session.
#[derive(Clone, Copy)]
pub struct StdlibFunction {
    pub name: &'static str,
    pub call: fn(&mut EvalContext<'_>, Vec<Vec<Scalar>>) -> Result<Vec<Scalar>, RuntimeError>,
}

impl fmt::Debug for StdlibFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StdlibFunction({})", self.name)
    }
}

impl PartialEq for StdlibFunction {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StdlibFunction {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    List(Vec<Scalar>),
    Function(StdlibFunction),
}

impl Value {
    pub fn scalar(item: Scalar) -> Self {
        Value::List(vec![item])
    }

    pub fn text(text: impl Into<String>) -> Self {
        Value::scalar(Scalar::Text(text.into()))
    }

    pub fn int(n: i64) -> Self {
        Value::scalar(Scalar::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Value::scalar(Scalar::Bool(b))
    }

    /// The list behind this value, or an error for functions, which have
    /// no list form.
    pub fn as_list(&self) -> Result<&[Scalar], RuntimeError> {
        match self {
            Value::List(items) => Ok(items),
            Value::Function(f) => Err(RuntimeError::FunctionInText {
                name: f.name.to_string(),
            }),
        }
    }

    /// Scalar view for arithmetic and comparisons: the first element, or
    /// an empty string for an empty list.
    pub fn first(&self) -> Result<Scalar, RuntimeError> {
        Ok(match self.as_list()?.first() {
            Some(item) => item.clone(),
            None => Scalar::Text(String::new()),
        })
    }

    pub fn is_true(&self) -> Result<bool, RuntimeError> {
        Ok(match self.as_list()?.first() {
            Some(item) => item.is_true(),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_strings_act_as_numbers() {
        assert_eq!(Scalar::Text("42".to_string()).as_int().unwrap(), 42);
        assert_eq!(Scalar::Text(" -3 ".to_string()).as_int().unwrap(), -3);
        assert!(Scalar::Text("fish".to_string()).as_int().is_err());
    }

    #[test]
    fn empty_lists_read_as_empty_text_and_false() {
        let empty = Value::List(Vec::new());
        assert_eq!(empty.first().unwrap(), Scalar::Text(String::new()));
        assert!(!empty.is_true().unwrap());
    }

    #[test]
    fn truth_comes_from_the_first_element() {
        assert!(Value::List(vec![Scalar::Int(1), Scalar::Int(0)])
            .is_true()
            .unwrap());
        assert!(!Value::text("").is_true().unwrap());
        assert!(Value::text("no").is_true().unwrap());
    }
}
