//! Recursive-descent parser.
//!
//! The parser drives the lexer's grammar stack: template text at the top,
//! the code grammar inside `{...}` blocks, and dedicated grammars inside
//! string and regex literals. It also keeps a compile-time symbol table
//! that mirrors runtime scoping, so references to undeclared variables and
//! unknown functions are rejected before anything runs.

use rustc_hash::FxHashSet;

use crate::ast::{
    Code, ElseBranch, Expression, ExpressionNode, Extract, ExtractMode, FunctionCall, IfCondition,
    Loop, Op, Operand, RegexLit, Statement, StringLit, Template, Term,
};
use crate::error::SyntaxError;
use crate::grammar::{CODE, REGEX, STRING, TEMPLATE};
use crate::lexer::Lexer;
use crate::subst;
use crate::token::TokenKind;

/// Compile-time view of the scope chain. Frames are pushed around loop
/// bodies exactly where the evaluator pushes scope frames.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    frames: Vec<FxHashSet<String>>,
    functions: FxHashSet<String>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut root = FxHashSet::default();
        root.insert(crate::interpreter::RESPONSE_VAR.to_string());
        Self {
            frames: vec![root],
            functions: FxHashSet::default(),
        }
    }

    pub fn declare(&mut self, name: &str) {
        self.frames
            .last_mut()
            .expect("symbol table always has a root frame")
            .insert(name.to_string());
    }

    pub fn declare_function(&mut self, name: &str) {
        self.functions.insert(name.to_string());
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.contains(name))
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    fn push_frame(&mut self) {
        self.frames.push(FxHashSet::default());
    }

    fn pop_frame(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the root symbol frame");
        self.frames.pop();
    }
}

/// What may legally close the block being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    /// `}` returning to template text.
    CloseCurly,
    /// The `end` keyword.
    End,
    /// `else` or `end`, for `if` bodies.
    ElseOrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Closed,
    Else,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    symbols: SymbolTable,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, symbols: SymbolTable) -> Self {
        Self {
            lexer: Lexer::new(source),
            symbols,
        }
    }

    pub fn parse_template(mut self) -> Result<Template, SyntaxError> {
        self.lexer.set_grammar(&TEMPLATE);
        let mut statements = Vec::new();
        let mut line = String::new();
        let mut line_offset = 0;

        loop {
            let token = self.lexer.token()?;
            match token.kind {
                TokenKind::Eof => {
                    self.flush_line(&mut statements, &mut line, line_offset)?;
                    break;
                }
                TokenKind::RawData => {
                    // A line opening with `#` is a comment, discarded up to
                    // the newline.
                    if line.is_empty() && token.text.trim_start().starts_with('#') {
                        self.skip_comment_line()?;
                        continue;
                    }
                    if line.is_empty() {
                        line_offset = token.offset;
                    }
                    line.push_str(token.text);
                    self.lexer.next()?;
                }
                TokenKind::EscapedData => {
                    if line.is_empty() {
                        line_offset = token.offset;
                    }
                    push_template_escape(&mut line, token.text);
                    self.lexer.next()?;
                }
                TokenKind::Newline => {
                    self.lexer.next()?;
                    self.flush_line(&mut statements, &mut line, line_offset)?;
                }
                TokenKind::OpenCurly => {
                    self.lexer.next()?;
                    self.flush_line(&mut statements, &mut line, line_offset)?;
                    self.lexer.set_grammar(&CODE);
                    let (mut block, _) = self.parse_statements(BlockEnd::CloseCurly)?;
                    self.lexer.restore_grammar();
                    statements.append(&mut block);
                }
                _ => return Err(self.unexpected("template", "text or '{'", token.offset)),
            }
        }
        self.lexer.restore_grammar();
        Ok(Template { statements })
    }

    /// Consume everything on a comment line, the newline included. Braces
    /// and escapes inside a comment carry no meaning.
    fn skip_comment_line(&mut self) -> Result<(), SyntaxError> {
        loop {
            let token = self.lexer.token()?;
            match token.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Newline => {
                    self.lexer.next()?;
                    return Ok(());
                }
                _ => {
                    self.lexer.next()?;
                }
            }
        }
    }

    /// Turn an accumulated template line into an `Execute` statement. Lines
    /// that are empty after trimming are skipped, not sent.
    fn flush_line(
        &mut self,
        statements: &mut Vec<Statement>,
        line: &mut String,
        offset: usize,
    ) -> Result<(), SyntaxError> {
        let text = std::mem::take(line);
        if text.trim().is_empty() {
            return Ok(());
        }
        self.check_references(&text, offset)?;
        statements.push(Statement::Execute(StringLit { text, offset }));
        Ok(())
    }

    fn parse_statements(
        &mut self,
        end: BlockEnd,
    ) -> Result<(Vec<Statement>, Ending), SyntaxError> {
        let mut statements = Vec::new();
        loop {
            self.lexer
                .skip(&[TokenKind::Whitespace, TokenKind::Newline])?;
            let token = self.lexer.token()?;
            match token.kind {
                TokenKind::Eof => {
                    let expected = match end {
                        BlockEnd::CloseCurly => "'}'",
                        BlockEnd::End => "'end'",
                        BlockEnd::ElseOrEnd => "'else' or 'end'",
                    };
                    return Err(self.unexpected("code block", expected, token.offset));
                }
                TokenKind::CloseCurly if end == BlockEnd::CloseCurly => {
                    self.lexer.next()?;
                    return Ok((statements, Ending::Closed));
                }
                TokenKind::Keyword if token.text == "end" && end != BlockEnd::CloseCurly => {
                    self.lexer.next()?;
                    return Ok((statements, Ending::Closed));
                }
                TokenKind::Keyword if token.text == "else" && end == BlockEnd::ElseOrEnd => {
                    self.lexer.next()?;
                    return Ok((statements, Ending::Else));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        let token = self.lexer.token()?;
        match token.kind {
            TokenKind::Keyword => match token.text {
                "append" => self.parse_append(),
                "enter" => {
                    self.lexer.next()?;
                    Ok(Statement::Enter)
                }
                "extract" => self.parse_extract(),
                "fail" => self.parse_fail(),
                "if" => {
                    self.lexer.next()?;
                    Ok(Statement::If(self.parse_if()?))
                }
                "loop" => self.parse_loop(),
                "try" => {
                    self.lexer.next()?;
                    let (statements, _) = self.parse_statements(BlockEnd::End)?;
                    Ok(Statement::Try {
                        block: Code { statements },
                    })
                }
                _ => Err(self.unexpected("statement", "a statement keyword", token.offset)),
            },
            TokenKind::Varname => self.parse_assign(),
            TokenKind::OpenFunctionCall => {
                Ok(Statement::FunctionCall(self.parse_function_call()?))
            }
            _ => Err(self.unexpected("statement", "a statement", token.offset)),
        }
    }

    fn parse_assign(&mut self) -> Result<Statement, SyntaxError> {
        let token = self.lexer.expect("assignment", TokenKind::Varname, None)?;
        let name = token.text.to_string();
        if name.starts_with("__") {
            let (line, column) = self.lexer.position(token.offset);
            return Err(SyntaxError::ReservedName {
                name,
                offset: token.offset,
                line,
                column,
            });
        }
        self.lexer.skip(&[TokenKind::Whitespace])?;
        self.lexer.expect("assignment", TokenKind::Assign, None)?;
        let value = self.parse_expression()?;
        self.symbols.declare(&name);
        Ok(Statement::Assign { name, value })
    }

    fn parse_append(&mut self) -> Result<Statement, SyntaxError> {
        self.lexer.expect("append", TokenKind::Keyword, Some("append"))?;
        let value = self.parse_expression()?;
        self.lexer.skip(&[TokenKind::Whitespace])?;
        self.lexer.expect("append", TokenKind::Keyword, Some("to"))?;
        self.lexer.skip(&[TokenKind::Whitespace])?;
        let token = self.lexer.expect("append", TokenKind::Varname, None)?;
        let name = token.text.to_string();
        if name.starts_with("__") {
            let (line, column) = self.lexer.position(token.offset);
            return Err(SyntaxError::ReservedName {
                name,
                offset: token.offset,
                line,
                column,
            });
        }
        self.symbols.declare(&name);
        Ok(Statement::Append { value, name })
    }

    fn parse_extract(&mut self) -> Result<Statement, SyntaxError> {
        self.lexer
            .expect("extract", TokenKind::Keyword, Some("extract"))?;
        self.lexer.skip(&[TokenKind::Whitespace])?;
        let regex = self.parse_regex_lit()?;

        self.lexer.skip(&[TokenKind::Whitespace])?;
        let mode_token = self.lexer.expect("extract", TokenKind::Keyword, None)?;
        let mode = match mode_token.text {
            "as" => ExtractMode::Replace,
            "into" => ExtractMode::Append,
            _ => return Err(self.unexpected("extract", "'as' or 'into'", mode_token.offset)),
        };

        let mut names: Vec<String> = Vec::new();
        loop {
            self.lexer.skip(&[TokenKind::Whitespace])?;
            let token = self.lexer.expect("extract", TokenKind::Varname, None)?;
            let name = token.text.to_string();
            let (line, column) = self.lexer.position(token.offset);
            if name.starts_with("__") {
                return Err(SyntaxError::ReservedName {
                    name,
                    offset: token.offset,
                    line,
                    column,
                });
            }
            if names.contains(&name) {
                return Err(SyntaxError::DuplicateDestination {
                    name,
                    offset: token.offset,
                    line,
                    column,
                });
            }
            names.push(name);
            self.lexer.skip(&[TokenKind::Whitespace])?;
            if !self.lexer.next_if(TokenKind::Comma, None)? {
                break;
            }
        }

        if regex.n_groups != names.len() {
            let (line, column) = self.lexer.position(regex.offset);
            return Err(SyntaxError::GroupCountMismatch {
                groups: regex.n_groups,
                names: names.len(),
                offset: regex.offset,
                line,
                column,
            });
        }

        self.lexer.skip(&[TokenKind::Whitespace])?;
        let source = if self.lexer.next_if(TokenKind::Keyword, Some("from"))? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        for name in &names {
            self.symbols.declare(name);
        }
        Ok(Statement::Extract(Extract {
            regex,
            mode,
            names,
            source,
        }))
    }

    fn parse_fail(&mut self) -> Result<Statement, SyntaxError> {
        self.lexer.expect("fail", TokenKind::Keyword, Some("fail"))?;
        let message = self.parse_expression()?;
        self.lexer.skip(&[TokenKind::Whitespace])?;
        let condition = if self.lexer.next_if(TokenKind::Keyword, Some("if"))? {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Statement::Fail { message, condition })
    }

    /// `if` body; the caller has already consumed the `if` keyword. Each
    /// `else if` nests a fresh condition which consumes the final `end`
    /// itself, so a whole chain closes with a single `end`.
    fn parse_if(&mut self) -> Result<IfCondition, SyntaxError> {
        let condition = self.parse_expression()?;
        let (statements, ending) = self.parse_statements(BlockEnd::ElseOrEnd)?;
        let then_block = Code { statements };
        let else_block = match ending {
            Ending::Closed => None,
            Ending::Else => {
                self.lexer.skip(&[TokenKind::Whitespace])?;
                if self.lexer.next_if(TokenKind::Keyword, Some("if"))? {
                    Some(ElseBranch::ElseIf(Box::new(self.parse_if()?)))
                } else {
                    let (statements, _) = self.parse_statements(BlockEnd::End)?;
                    Some(ElseBranch::Else(Code { statements }))
                }
            }
        };
        Ok(IfCondition {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_loop(&mut self) -> Result<Statement, SyntaxError> {
        self.lexer.expect("loop", TokenKind::Keyword, Some("loop"))?;
        self.lexer.skip(&[TokenKind::Whitespace])?;

        let mut lists = Vec::new();
        let mut iter_names = Vec::new();
        let mut from = None;
        let mut to = None;

        let token = self.lexer.token()?;
        let plain_condition = token.is(TokenKind::Keyword, Some("while"))
            || token.is(TokenKind::Keyword, Some("until"));
        if !plain_condition {
            if self.lexer.next_if(TokenKind::Keyword, Some("from"))? {
                from = Some(self.parse_expression()?);
                self.lexer.skip(&[TokenKind::Whitespace])?;
                self.lexer.expect("loop", TokenKind::Keyword, Some("to"))?;
                to = Some(self.parse_expression()?);
                self.lexer.skip(&[TokenKind::Whitespace])?;
                // Without an `as` clause the iterator is named `counter`.
                if self.lexer.next_if(TokenKind::Keyword, Some("as"))? {
                    self.lexer.skip(&[TokenKind::Whitespace])?;
                    let name = self.lexer.expect("loop", TokenKind::Varname, None)?;
                    iter_names.push(name.text.to_string());
                } else {
                    iter_names.push("counter".to_string());
                }
            } else {
                loop {
                    lists.push(self.parse_expression()?);
                    self.lexer.skip(&[TokenKind::Whitespace])?;
                    if !self.lexer.next_if(TokenKind::Comma, None)? {
                        break;
                    }
                }
                self.lexer.expect("loop", TokenKind::Keyword, Some("as"))?;
                loop {
                    self.lexer.skip(&[TokenKind::Whitespace])?;
                    let name = self.lexer.expect("loop", TokenKind::Varname, None)?;
                    iter_names.push(name.text.to_string());
                    self.lexer.skip(&[TokenKind::Whitespace])?;
                    if !self.lexer.next_if(TokenKind::Comma, None)? {
                        break;
                    }
                }
                if lists.len() != iter_names.len() {
                    let offset = self.lexer.offset();
                    return Err(self.unexpected(
                        "loop",
                        "one iterator name per list",
                        offset,
                    ));
                }
            }
        }

        // Iterators live in the loop frame, alongside anything the body
        // defines.
        self.symbols.push_frame();
        for name in &iter_names {
            self.symbols.declare(name);
        }

        let mut during = None;
        let mut until = None;
        loop {
            self.lexer.skip(&[TokenKind::Whitespace])?;
            if during.is_none() && self.lexer.next_if(TokenKind::Keyword, Some("while"))? {
                during = Some(self.parse_expression()?);
            } else if until.is_none() && self.lexer.next_if(TokenKind::Keyword, Some("until"))? {
                until = Some(self.parse_expression()?);
            } else {
                break;
            }
        }

        let result = self.parse_statements(BlockEnd::End);
        self.symbols.pop_frame();
        let (statements, _) = result?;
        Ok(Statement::Loop(Loop {
            lists,
            iter_names,
            from,
            to,
            during,
            until,
            block: Code { statements },
        }))
    }

    fn parse_function_call(&mut self) -> Result<FunctionCall, SyntaxError> {
        let token = self
            .lexer
            .expect("function call", TokenKind::OpenFunctionCall, None)?;
        let name = token.text[..token.text.len() - 1].to_string();
        let offset = token.offset;
        if !self.symbols.is_function(&name) {
            let (line, column) = self.lexer.position(offset);
            return Err(SyntaxError::UnknownFunction {
                name,
                offset,
                line,
                column,
            });
        }
        let mut args = Vec::new();
        self.lexer.skip(&[TokenKind::Whitespace])?;
        if !self.lexer.next_if(TokenKind::CloseParen, None)? {
            loop {
                args.push(self.parse_expression()?);
                self.lexer.skip(&[TokenKind::Whitespace])?;
                if !self.lexer.next_if(TokenKind::Comma, None)? {
                    break;
                }
            }
            self.lexer.expect("function call", TokenKind::CloseParen, None)?;
        }
        Ok(FunctionCall { name, args, offset })
    }

    /// Parse an operator chain, then rebalance it by priority.
    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let mut nodes: Vec<ExpressionNode> = Vec::new();
        let mut previous: Option<usize> = None;
        loop {
            self.lexer.skip(&[TokenKind::Whitespace])?;
            // Prefix `not` becomes a node without a left operand.
            if self.lexer.current_is(TokenKind::LogicalOp, Some("not"))? {
                self.lexer.next()?;
                let index = nodes.len();
                nodes.push(ExpressionNode {
                    lft: None,
                    op: Some(Op::Not),
                    rgt: None,
                    parent_node: previous,
                });
                if let Some(prev) = previous {
                    nodes[prev].rgt = Some(Operand::Node(index));
                }
                previous = Some(index);
                continue;
            }
            let term = self.parse_term()?;
            self.lexer.skip(&[TokenKind::Whitespace])?;
            let op = self.peek_operator()?;
            let index = nodes.len();
            nodes.push(ExpressionNode {
                lft: Some(Operand::Term(term)),
                op,
                rgt: None,
                parent_node: previous,
            });
            if let Some(prev) = previous {
                nodes[prev].rgt = Some(Operand::Node(index));
            }
            if op.is_none() {
                break;
            }
            self.lexer.next()?;
            previous = Some(index);
        }
        let mut expr = Expression { nodes, root: 0 };
        expr.prioritize();
        Ok(expr)
    }

    /// Map the current token to a binary operator without consuming it.
    fn peek_operator(&mut self) -> Result<Option<Op>, SyntaxError> {
        let token = self.lexer.token()?;
        let op = match token.kind {
            TokenKind::ArithmeticOp => match token.text {
                "%" => Op::Mod,
                "*" => Op::Mul,
                "+" => Op::Add,
                "-" => Op::Sub,
                "." => Op::Concat,
                _ => return Ok(None),
            },
            TokenKind::Comparison => match token.text {
                "is not" => Op::IsNot,
                "is" => Op::Is,
                "not in" => Op::NotIn,
                "in" => Op::In,
                "ge" => Op::Ge,
                "gt" => Op::Gt,
                "le" => Op::Le,
                "lt" => Op::Lt,
                "matches" => Op::Matches,
                _ => return Ok(None),
            },
            TokenKind::LogicalOp => match token.text {
                "and" => Op::And,
                "or" => Op::Or,
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    fn parse_term(&mut self) -> Result<Term, SyntaxError> {
        let token = self.lexer.token()?;
        match token.kind {
            TokenKind::Number => {
                self.lexer.next()?;
                let value = token
                    .text
                    .parse()
                    .map_err(|_| self.invalid_number(token.text, token.offset))?;
                Ok(Term::Number(value))
            }
            TokenKind::HexNumber => {
                self.lexer.next()?;
                let value = i64::from_str_radix(&token.text[2..], 16)
                    .map_err(|_| self.invalid_number(token.text, token.offset))?;
                Ok(Term::Number(value))
            }
            TokenKind::OctalNumber => {
                self.lexer.next()?;
                let value = i64::from_str_radix(&token.text[1..], 8)
                    .map_err(|_| self.invalid_number(token.text, token.offset))?;
                Ok(Term::Number(value))
            }
            TokenKind::Keyword if token.text == "true" => {
                self.lexer.next()?;
                Ok(Term::Bool(true))
            }
            TokenKind::Keyword if token.text == "false" => {
                self.lexer.next()?;
                Ok(Term::Bool(false))
            }
            TokenKind::StringDelimiter => Ok(Term::String(self.parse_string_lit()?)),
            TokenKind::RegexDelimiter => Ok(Term::Regex(self.parse_regex_lit()?)),
            TokenKind::Varname => {
                self.lexer.next()?;
                let name = token.text.to_string();
                if !self.symbols.is_defined(&name) {
                    let (line, column) = self.lexer.position(token.offset);
                    return Err(SyntaxError::UndeclaredVariable {
                        name,
                        offset: token.offset,
                        line,
                        column,
                    });
                }
                Ok(Term::Variable {
                    name,
                    offset: token.offset,
                })
            }
            TokenKind::OpenFunctionCall => Ok(Term::FunctionCall(self.parse_function_call()?)),
            TokenKind::OpenParen => {
                self.lexer.next()?;
                let inner = self.parse_expression()?;
                self.lexer.skip(&[TokenKind::Whitespace])?;
                self.lexer.expect("expression", TokenKind::CloseParen, None)?;
                Ok(Term::Nested(Box::new(inner)))
            }
            _ => Err(self.unexpected("expression", "a term", token.offset)),
        }
    }

    fn parse_string_lit(&mut self) -> Result<StringLit, SyntaxError> {
        let open = self
            .lexer
            .expect("string", TokenKind::StringDelimiter, None)?;
        self.lexer.set_grammar(&STRING);
        let mut text = String::new();
        loop {
            let token = self.lexer.next()?;
            match token.kind {
                TokenKind::StringData => text.push_str(token.text),
                TokenKind::EscapedData => push_string_escape(&mut text, token.text),
                TokenKind::StringDelimiter => break,
                _ => {
                    let offset = token.offset;
                    self.lexer.restore_grammar();
                    return Err(self.unexpected("string", "'\"'", offset));
                }
            }
        }
        self.lexer.restore_grammar();
        self.check_references(&text, open.offset)?;
        Ok(StringLit {
            text,
            offset: open.offset,
        })
    }

    fn parse_regex_lit(&mut self) -> Result<RegexLit, SyntaxError> {
        let open = self
            .lexer
            .expect("regex", TokenKind::RegexDelimiter, None)?;
        self.lexer.set_grammar(&REGEX);
        let mut pattern = String::new();
        loop {
            let token = self.lexer.next()?;
            match token.kind {
                // Escapes belong to the pattern and stay verbatim.
                TokenKind::RegexData | TokenKind::EscapedData => pattern.push_str(token.text),
                TokenKind::RegexDelimiter => break,
                _ => {
                    let offset = token.offset;
                    self.lexer.restore_grammar();
                    return Err(self.unexpected("regex", "'/'", offset));
                }
            }
        }
        self.lexer.restore_grammar();

        // Modifiers must touch the closing slash; a Varname one token later
        // is ordinary code.
        let mut ignore_case = false;
        if self.lexer.current_is(TokenKind::Varname, None)? {
            let modifiers = self.lexer.next()?;
            for modifier in modifiers.text.chars() {
                match modifier {
                    'i' => ignore_case = true,
                    other => {
                        let (line, column) = self.lexer.position(modifiers.offset);
                        return Err(SyntaxError::InvalidRegexModifier {
                            modifier: other,
                            offset: modifiers.offset,
                            line,
                            column,
                        });
                    }
                }
            }
        }

        self.check_references(&pattern, open.offset)?;
        // Trial-compile with references blanked out; bad patterns fail at
        // compile time rather than mid-session.
        let trial = subst::strip_references(&pattern);
        if let Err(err) = regex::Regex::new(&trial) {
            let (line, column) = self.lexer.position(open.offset);
            return Err(SyntaxError::InvalidRegex {
                pattern,
                message: err.to_string(),
                offset: open.offset,
                line,
                column,
            });
        }
        let n_groups = RegexLit::count_groups(&pattern);
        Ok(RegexLit {
            pattern,
            ignore_case,
            n_groups,
            offset: open.offset,
        })
    }

    /// Reject `$name` references to names the symbol table does not know.
    fn check_references(&mut self, text: &str, base_offset: usize) -> Result<(), SyntaxError> {
        let symbols = &self.symbols;
        if let Some((name, relative)) = subst::check(text, |name| {
            symbols.is_defined(name) || symbols.is_function(name)
        }) {
            let offset = base_offset + relative;
            let (line, column) = self.lexer.position(offset);
            return Err(SyntaxError::UndeclaredVariable {
                name,
                offset,
                line,
                column,
            });
        }
        Ok(())
    }

    fn unexpected(&mut self, owner: &str, expected: &str, offset: usize) -> SyntaxError {
        let got = self
            .lexer
            .token()
            .map(|token| token.text.to_string())
            .unwrap_or_default();
        let (line, column) = self.lexer.position(offset);
        SyntaxError::UnexpectedToken {
            owner: owner.to_string(),
            expected: expected.to_string(),
            got,
            offset,
            line,
            column,
        }
    }

    fn invalid_number(&mut self, text: &str, offset: usize) -> SyntaxError {
        let (line, column) = self.lexer.position(offset);
        SyntaxError::InvalidNumber {
            text: text.to_string(),
            offset,
            line,
            column,
        }
    }
}

/// Template-level `\x` escapes. `\n` and `\r` become control characters,
/// `\$` stays escaped so substitution sees it, and every other escape
/// yields the character itself (braces and backslashes included).
fn push_template_escape(line: &mut String, escape: &str) {
    let ch = escape.chars().nth(1).expect("escape has two characters");
    match ch {
        'n' => line.push('\n'),
        'r' => line.push('\r'),
        '$' => line.push_str("\\$"),
        other => line.push(other),
    }
}

/// String-literal escapes. `\$` survives for the substitution pass.
fn push_string_escape(text: &mut String, escape: &str) {
    let ch = escape.chars().nth(1).expect("escape has two characters");
    match ch {
        'n' => text.push('\n'),
        't' => text.push('\t'),
        'r' => text.push('\r'),
        '$' => text.push_str("\\$"),
        other => text.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(source: &str) -> Result<Template, SyntaxError> {
        Parser::new(source, SymbolTable::new()).parse_template()
    }

    fn parse_with_function(source: &str, function: &str) -> Result<Template, SyntaxError> {
        let mut symbols = SymbolTable::new();
        symbols.declare_function(function);
        Parser::new(source, symbols).parse_template()
    }

    #[test]
    fn template_lines_become_execute_statements() {
        let template = parse("show version\nshow ip int brief\n").unwrap();
        assert_eq!(template.statements.len(), 2);
        match &template.statements[0] {
            Statement::Execute(line) => assert_eq!(line.text, "show version"),
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[test]
    fn comment_lines_are_discarded() {
        let template = parse("# provisioning notes\nshow version\n  # indented {not code}\n")
            .unwrap();
        assert_eq!(template.statements.len(), 1);
        match &template.statements[0] {
            Statement::Execute(line) => assert_eq!(line.text, "show version"),
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[test]
    fn template_escapes_follow_the_escape_table() {
        let template = parse("echo a\\nb\\tc \\{x\\}\n").unwrap();
        match &template.statements[0] {
            Statement::Execute(line) => assert_eq!(line.text, "echo a\nbtc {x}"),
            other => panic!("expected Execute, got {other:?}"),
        }
    }

    #[test]
    fn from_to_loops_default_their_iterator_to_counter() {
        let source = indoc! {"
            {
                loop from 1 to 3
                    x = counter
                end
            }
        "};
        let template = parse(source).unwrap();
        let Statement::Loop(form) = &template.statements[0] else {
            panic!("expected a loop");
        };
        assert_eq!(form.iter_names, ["counter"]);
    }

    #[test]
    fn code_blocks_share_the_template_statement_list() {
        let template = parse("{x = 1}\nshow $x\n").unwrap();
        assert_eq!(template.statements.len(), 2);
        assert!(matches!(&template.statements[0], Statement::Assign { name, .. } if name == "x"));
        assert!(matches!(&template.statements[1], Statement::Execute(_)));
    }

    #[test]
    fn later_blocks_see_variables_from_earlier_blocks() {
        assert!(parse("{x = 1}\n{y = x + 1}\n").is_ok());
    }

    #[test]
    fn undeclared_variable_in_a_template_line_is_rejected() {
        let err = parse("show $nope\n").unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::UndeclaredVariable { ref name, .. } if name == "nope"
        ));
    }

    #[test]
    fn escaped_references_pass_the_static_check() {
        assert!(parse("echo \\$literal\n").is_ok());
    }

    #[test]
    fn unknown_function_is_a_compile_error() {
        let err = parse("{frobnicate()}\n").unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::UnknownFunction { ref name, .. } if name == "frobnicate"
        ));
    }

    #[test]
    fn known_functions_parse_with_arguments() {
        let template =
            parse_with_function("{sys.message(\"hi\", 2)}\n", "sys.message").unwrap();
        match &template.statements[0] {
            Statement::FunctionCall(call) => {
                assert_eq!(call.name, "sys.message");
                assert_eq!(call.args.len(), 2);
            }
            other => panic!("expected a function call, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let template = parse("{x = 1 + 2 * 3}\n").unwrap();
        let Statement::Assign { value, .. } = &template.statements[0] else {
            panic!("expected an assignment");
        };
        let root = &value.nodes[value.root];
        assert_eq!(root.op, Some(Op::Add));
    }

    #[test]
    fn extract_group_count_must_match_destinations() {
        let err = parse("{extract /(\\w+)-(\\w+)/ as one}\n").unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::GroupCountMismatch {
                groups: 2,
                names: 1,
                ..
            }
        ));
    }

    #[test]
    fn extract_destinations_must_be_distinct_and_unreserved() {
        let err = parse("{extract /(\\w+) (\\w+)/ as a, a}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::DuplicateDestination { .. }));

        let err = parse("{extract /(\\w+)/ as __secret}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::ReservedName { .. }));
    }

    #[test]
    fn assignment_to_reserved_names_is_rejected() {
        let err = parse("{__response__ = 1}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::ReservedName { .. }));
    }

    #[test]
    fn regex_modifier_must_touch_the_closing_slash() {
        let template = parse("{x = \"up\" matches /UP/i}\n").unwrap();
        let Statement::Assign { value, .. } = &template.statements[0] else {
            panic!("expected an assignment");
        };
        // Find the regex term and confirm the flag took effect.
        let found = value.nodes.iter().any(
            |node| matches!(&node.lft, Some(Operand::Term(Term::Regex(lit))) if lit.ignore_case),
        );
        assert!(found);

        let err = parse("{x = \"up\" matches /UP/g}\n").unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::InvalidRegexModifier { modifier: 'g', .. }
        ));
    }

    #[test]
    fn broken_regex_literals_fail_at_compile_time() {
        let err = parse("{extract /(unclosed/ as x}\n").unwrap_err();
        assert!(matches!(err, SyntaxError::InvalidRegex { .. }));
    }

    #[test]
    fn loop_iterators_are_scoped_to_the_loop_body() {
        let source = indoc! {"
            {
                loop from 1 to 3 as i
                    x = i
                end
            }
            {y = i}
        "};
        let err = parse(source).unwrap_err();
        assert!(matches!(
            err,
            SyntaxError::UndeclaredVariable { ref name, .. } if name == "i"
        ));
    }

    #[test]
    fn else_if_chains_close_with_a_single_end() {
        let source = indoc! {"
            {
                x = 1
                if x is 1
                    y = 1
                else if x is 2
                    y = 2
                else
                    y = 3
                end
            }
        "};
        let template = parse(source).unwrap();
        let Statement::If(branch) = &template.statements[1] else {
            panic!("expected an if statement");
        };
        let Some(ElseBranch::ElseIf(nested)) = &branch.else_block else {
            panic!("expected an else-if branch");
        };
        assert!(matches!(nested.else_block, Some(ElseBranch::Else(_))));
    }

    #[test]
    fn parallel_loop_lists_need_matching_iterator_counts() {
        let source = "{\nl = 1\nloop l, l as a\nend\n}\n";
        assert!(parse(source).is_err());
    }

    #[test]
    fn enter_and_try_parse() {
        let source = indoc! {"
            {
                enter
                try
                    fail \"nope\" if false
                end
            }
        "};
        let template = parse(source).unwrap();
        assert!(matches!(template.statements[0], Statement::Enter));
        assert!(matches!(template.statements[1], Statement::Try { .. }));
    }
}
