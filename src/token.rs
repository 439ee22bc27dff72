/// Token kinds produced by the grammar rules in `grammar.rs`.
///
/// One kind per rule; several kinds (newline, escaped data) appear in more
/// than one grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Template grammar
    EscapedData,
    OpenCurly,
    CloseCurly,
    Newline,
    RawData,

    // Code grammar
    Whitespace,
    Comparison,
    LogicalOp,
    Keyword,
    OpenFunctionCall,
    StringDelimiter,
    RegexDelimiter,
    OpenParen,
    CloseParen,
    Assign,
    HexNumber,
    OctalNumber,
    Number,
    Varname,
    ArithmeticOp,
    Comma,

    // String / regex literal grammars
    StringData,
    RegexData,

    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, text: &'a str, offset: usize) -> Self {
        Self { kind, text, offset }
    }

    pub fn is(&self, kind: TokenKind, literal: Option<&str>) -> bool {
        self.kind == kind && literal.map(|lit| lit == self.text).unwrap_or(true)
    }
}
