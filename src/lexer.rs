use crate::error::{SyntaxError, locate};
use crate::grammar::Grammar;
use crate::token::{Token, TokenKind};

/// Grammar-switching tokenizer.
///
/// The lexer holds at most one buffered token. Matching uses the grammar on
/// top of the stack exclusively; entering a nested construct (a string or
/// regex literal, code inside a template) pushes that construct's grammar and
/// leaving it pops the stack, restoring the enclosing context exactly.
pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
    stack: Vec<&'static Grammar>,
    buffered: Option<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            stack: Vec::new(),
            buffered: None,
        }
    }

    /// Push `grammar`; must be balanced by one `restore_grammar` call.
    pub fn set_grammar(&mut self, grammar: &'static Grammar) {
        self.stack.push(grammar);
        self.buffered = None;
    }

    pub fn restore_grammar(&mut self) {
        // Unbalanced calls are a bug in the parser, not a script error.
        self.stack
            .pop()
            .unwrap_or_else(|| panic!("restore_grammar on an empty grammar stack"));
        self.buffered = None;
    }

    pub fn grammar_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn position(&self, offset: usize) -> (usize, usize) {
        locate(self.input, offset)
    }

    /// The current token, lexing on demand without consuming it.
    pub fn token(&mut self) -> Result<Token<'a>, SyntaxError> {
        if let Some(token) = self.buffered {
            return Ok(token);
        }
        if self.offset >= self.input.len() {
            let token = Token::new(TokenKind::Eof, "", self.input.len());
            self.buffered = Some(token);
            return Ok(token);
        }
        let grammar = self
            .stack
            .last()
            .unwrap_or_else(|| panic!("token requested with no active grammar"));
        let rest = &self.input[self.offset..];
        match grammar.match_at(rest) {
            Some((kind, text)) => {
                let token = Token::new(kind, text, self.offset);
                self.buffered = Some(token);
                Ok(token)
            }
            None => {
                let (line, column) = locate(self.input, self.offset);
                let text: String = rest.chars().take(12).collect();
                Err(SyntaxError::InvalidToken {
                    text,
                    offset: self.offset,
                    line,
                    column,
                })
            }
        }
    }

    /// Consume and return the current token. EOF never advances.
    pub fn next(&mut self) -> Result<Token<'a>, SyntaxError> {
        let token = self.token()?;
        self.buffered = None;
        self.offset += token.text.len();
        Ok(token)
    }

    /// Consume only if the current token matches; report whether it did.
    pub fn next_if(
        &mut self,
        kind: TokenKind,
        literal: Option<&str>,
    ) -> Result<bool, SyntaxError> {
        if self.token()?.is(kind, literal) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Peek without consuming.
    pub fn current_is(
        &mut self,
        kind: TokenKind,
        literal: Option<&str>,
    ) -> Result<bool, SyntaxError> {
        Ok(self.token()?.is(kind, literal))
    }

    /// Like `next_if`, but a mismatch is a syntax error naming `owner`.
    pub fn expect(
        &mut self,
        owner: &str,
        kind: TokenKind,
        literal: Option<&str>,
    ) -> Result<Token<'a>, SyntaxError> {
        let token = self.token()?;
        if token.is(kind, literal) {
            return self.next();
        }
        let (line, column) = locate(self.input, token.offset);
        let expected = match literal {
            Some(lit) => format!("'{lit}'"),
            None => format!("{kind:?}"),
        };
        Err(SyntaxError::UnexpectedToken {
            owner: owner.to_string(),
            expected,
            got: token.text.to_string(),
            offset: token.offset,
            line,
            column,
        })
    }

    /// Consume while the current token's kind is one of `kinds`.
    pub fn skip(&mut self, kinds: &[TokenKind]) -> Result<(), SyntaxError> {
        while kinds.contains(&self.token()?.kind) {
            self.next()?;
        }
        Ok(())
    }
}
