//! `$name` substitution inside string and regex literals.
//!
//! Two passes share one pattern: at parse time every reference is checked
//! against the symbol table (escaped references and a bare `$` are exempt);
//! at evaluation time references are replaced by the variable's value, with
//! list values newline-joined. `\$name` unescapes to the literal `$name`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RuntimeError;
use crate::interpreter::scope::Scope;
use crate::interpreter::value::Value;

static VARIABLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\?)\$(\w*)").unwrap());

/// First unescaped reference to a name not accepted by `is_defined`, as
/// `(name, byte offset within text)`.
pub fn check(text: &str, is_defined: impl Fn(&str) -> bool) -> Option<(String, usize)> {
    for caps in VARIABLE_RE.captures_iter(text) {
        let escaped = !caps[1].is_empty();
        let name = &caps[2];
        if escaped || name.is_empty() {
            continue;
        }
        if !is_defined(name) {
            let position = caps.get(0).map(|m| m.start()).unwrap_or(0);
            return Some((name.to_string(), position));
        }
    }
    None
}

/// Replace references with current values from `scope`.
pub fn substitute(text: &str, scope: &Scope) -> Result<String, RuntimeError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VARIABLE_RE.captures_iter(text) {
        let matched = caps.get(0).expect("capture 0 always present");
        out.push_str(&text[last..matched.start()]);
        last = matched.end();

        let escaped = !caps[1].is_empty();
        let name = &caps[2];
        if name.is_empty() {
            // `$` and `\$` both come out as a literal dollar sign.
            out.push('$');
        } else if escaped {
            out.push('$');
            out.push_str(name);
        } else {
            match scope.get(name) {
                Some(Value::List(items)) => {
                    let rendered: Vec<String> =
                        items.iter().map(|item| item.to_text()).collect();
                    out.push_str(&rendered.join("\n"));
                }
                Some(Value::Function(_)) => {
                    return Err(RuntimeError::FunctionInText {
                        name: name.to_string(),
                    });
                }
                None => {
                    return Err(RuntimeError::UndefinedVariable {
                        name: name.to_string(),
                    });
                }
            }
        }
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Blank out unescaped references so a regex pattern can be test-compiled at
/// parse time, before variable values exist.
pub fn strip_references(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VARIABLE_RE.captures_iter(text) {
        let matched = caps.get(0).expect("capture 0 always present");
        out.push_str(&text[last..matched.start()]);
        last = matched.end();
        let escaped = !caps[1].is_empty();
        let name = &caps[2];
        if escaped || name.is_empty() {
            // Keep the original text; `\$` is a valid escape in a pattern.
            out.push_str(&caps[0]);
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::Scalar;

    fn scope_with(name: &str, items: Vec<Scalar>) -> Scope {
        let mut scope = Scope::new();
        scope.assign(name, Value::List(items));
        scope
    }

    #[test]
    fn substitutes_single_element_lists_as_plain_text() {
        let scope = scope_with("host", vec![Scalar::Text("r1".to_string())]);
        assert_eq!(substitute("ping $host now", &scope).unwrap(), "ping r1 now");
    }

    #[test]
    fn joins_multi_element_lists_with_newlines() {
        let scope = scope_with(
            "lines",
            vec![Scalar::Text("a".to_string()), Scalar::Text("b".to_string())],
        );
        assert_eq!(substitute("$lines", &scope).unwrap(), "a\nb");
    }

    #[test]
    fn escaped_references_stay_literal_even_when_undefined() {
        let scope = Scope::new();
        assert_eq!(substitute(r"\$foo", &scope).unwrap(), "$foo");
        assert_eq!(substitute("$", &scope).unwrap(), "$");
    }

    #[test]
    fn undefined_reference_is_a_runtime_error() {
        let scope = Scope::new();
        let err = substitute("$missing", &scope).expect_err("expected failure");
        assert_eq!(
            err,
            RuntimeError::UndefinedVariable {
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn check_reports_the_first_bad_reference_with_offset() {
        let found = check(r"ok \$skipped then $bad here", |name| name == "skipped");
        assert_eq!(found, Some(("bad".to_string(), 18)));
        assert_eq!(check("$known", |_| true), None);
    }

    #[test]
    fn strip_references_blanks_only_unescaped_names() {
        assert_eq!(strip_references(r"^$host> \$x $"), r"^> \$x $");
    }
}
