//! Tokenization rules as data.
//!
//! A `Grammar` is an ordered list of `(kind, pattern)` rules. The lexer tries
//! the rules in order at the current offset and the first match wins, so rule
//! order is semantically significant: keyword and operator rules must appear
//! before the generic identifier rule. Nested constructs (strings and regexes
//! inside code, code inside templates) each get their own grammar, swapped in
//! and out via the lexer's grammar stack.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::token::TokenKind;

pub struct Grammar {
    pub name: &'static str,
    rules: Vec<(TokenKind, Regex)>,
}

impl Grammar {
    fn new(name: &'static str, rules: &[(TokenKind, &str)]) -> Self {
        let rules = rules
            .iter()
            .map(|(kind, pattern)| {
                let anchored = format!("^(?:{pattern})");
                let regex = Regex::new(&anchored)
                    .unwrap_or_else(|err| panic!("bad rule in grammar {name}: {err}"));
                (*kind, regex)
            })
            .collect();
        Self { name, rules }
    }

    /// First rule that matches at the start of `rest` wins.
    pub fn match_at<'a>(&self, rest: &'a str) -> Option<(TokenKind, &'a str)> {
        for (kind, regex) in &self.rules {
            if let Some(found) = regex.find(rest) {
                return Some((*kind, found.as_str()));
            }
        }
        None
    }
}

/// Top-level template text: literal runs, escapes, and `{` / `}` boundaries.
pub static TEMPLATE: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(
        "template",
        &[
            (TokenKind::EscapedData, r"\\."),
            (TokenKind::OpenCurly, r"\{"),
            (TokenKind::CloseCurly, r"\}"),
            (TokenKind::Newline, r"[\r\n]"),
            (TokenKind::RawData, r"[^\r\n{}\\]+"),
        ],
    )
});

/// Statements inside `{...}` blocks.
pub static CODE: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(
        "code",
        &[
            (TokenKind::Whitespace, r"[ \t]+"),
            (TokenKind::Newline, r"[\r\n]"),
            (
                TokenKind::Comparison,
                r"(?:is not|is|not in|in|ge|gt|le|lt|matches)\b",
            ),
            (TokenKind::LogicalOp, r"(?:and|or|not)\b"),
            (
                TokenKind::Keyword,
                r"(?:append|as|else|end|enter|extract|fail|false|from|if|into|loop|to|true|try|until|when|while)\b",
            ),
            (
                TokenKind::OpenFunctionCall,
                r"[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*\(",
            ),
            (TokenKind::StringDelimiter, "\""),
            (TokenKind::RegexDelimiter, "/"),
            (TokenKind::OpenCurly, r"\{"),
            (TokenKind::CloseCurly, r"\}"),
            (TokenKind::OpenParen, r"\("),
            (TokenKind::CloseParen, r"\)"),
            (TokenKind::Assign, "="),
            (TokenKind::HexNumber, r"0x[0-9a-fA-F]+"),
            (TokenKind::OctalNumber, r"0\d+"),
            (TokenKind::Number, r"\d+"),
            (TokenKind::Varname, r"[A-Za-z_]\w*"),
            (TokenKind::ArithmeticOp, r"[*+%.\-]"),
            (TokenKind::Comma, ","),
        ],
    )
});

/// Double-quoted string literal bodies.
pub static STRING: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(
        "string",
        &[
            (TokenKind::EscapedData, r"\\."),
            (TokenKind::StringData, r#"[^\\"]+"#),
            (TokenKind::StringDelimiter, "\""),
        ],
    )
});

/// `/pattern/` literal bodies. Escapes stay verbatim; they belong to the
/// pattern, not to the lexer.
pub static REGEX: Lazy<Grammar> = Lazy::new(|| {
    Grammar::new(
        "regex",
        &[
            (TokenKind::EscapedData, r"\\."),
            (TokenKind::RegexData, r"[^\\/]+"),
            (TokenKind::RegexDelimiter, "/"),
        ],
    )
});
