//! Syntax tree for compiled templates.
//!
//! The tree is structurally immutable after parsing; all run state lives in
//! the evaluator's scope. Everything derives `Clone` so a compiled `Template`
//! can be deep-copied for reuse across hosts.

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// One literal template line, sent to the connection after substitution.
    Execute(StringLit),
    /// Send a bare newline (an empty command).
    Enter,
    Assign {
        name: String,
        value: Expression,
    },
    Append {
        value: Expression,
        name: String,
    },
    Extract(Extract),
    Fail {
        message: Expression,
        condition: Option<Expression>,
    },
    If(IfCondition),
    Loop(Loop),
    Try {
        block: Code,
    },
    FunctionCall(FunctionCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// `as`: replace the destination variables.
    Replace,
    /// `into`: append to their prior values.
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extract {
    pub regex: RegexLit,
    pub mode: ExtractMode,
    pub names: Vec<String>,
    /// `from` expression; defaults to the buffered response lines.
    pub source: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfCondition {
    pub condition: Expression,
    pub then_block: Code,
    pub else_block: Option<ElseBranch>,
}

/// `else if` nests another `IfCondition` rather than forming an elif list.
#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    ElseIf(Box<IfCondition>),
    Else(Code),
}

/// All loop forms share one node; the populated fields select the form.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Parallel lists for `loop L1, L2 as v1, v2`.
    pub lists: Vec<Expression>,
    pub iter_names: Vec<String>,
    pub from: Option<Expression>,
    pub to: Option<Expression>,
    /// `while` condition (keeps looping while true).
    pub during: Option<Expression>,
    /// `until` condition (stops looping once true).
    pub until: Option<Expression>,
    pub block: Code,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub offset: usize,
}

/// A string literal after delimiter unescaping, still carrying `$name`
/// references (and `\$` escapes) for evaluation-time substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct StringLit {
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegexLit {
    /// Raw pattern text, escapes and `$name` references included.
    pub pattern: String,
    pub ignore_case: bool,
    /// Unescaped, non-named capturing groups; must equal the number of
    /// `extract` destinations.
    pub n_groups: usize,
    pub offset: usize,
}

impl RegexLit {
    /// Count unescaped `(` not followed by `?`.
    pub fn count_groups(pattern: &str) -> usize {
        let mut groups = 0;
        let mut escaped = false;
        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '(' => {
                    if chars.peek() != Some(&'?') {
                        groups += 1;
                    }
                }
                _ => {}
            }
        }
        groups
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Arithmetic
    Mod,
    Mul,
    Add,
    Sub,
    /// String concatenation (`.`).
    Concat,
    // Comparison
    Is,
    IsNot,
    In,
    NotIn,
    Ge,
    Gt,
    Le,
    Lt,
    Matches,
    // Logical
    Not,
    And,
    Or,
}

impl Op {
    /// Binding strength; higher binds tighter. Bare terms count as 8.
    pub fn priority(self) -> u8 {
        match self {
            Op::Mod => 7,
            Op::Mul => 6,
            Op::Add | Op::Sub => 5,
            Op::Concat => 4,
            Op::Is
            | Op::IsNot
            | Op::In
            | Op::NotIn
            | Op::Ge
            | Op::Gt
            | Op::Le
            | Op::Lt
            | Op::Matches => 3,
            Op::Not => 2,
            Op::And | Op::Or => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Number(i64),
    Bool(bool),
    String(StringLit),
    Regex(RegexLit),
    Variable { name: String, offset: usize },
    FunctionCall(FunctionCall),
    /// Parenthesized sub-expression.
    Nested(Box<Expression>),
}

/// Either a leaf term or another node in the expression arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Term(Term),
    Node(usize),
}

/// One link of the operator chain; becomes a proper binary-tree node after
/// rebalancing. `parent_node` is a plain arena index, never an owning link.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionNode {
    pub lft: Option<Operand>,
    pub op: Option<Op>,
    pub rgt: Option<Operand>,
    pub parent_node: Option<usize>,
}

impl ExpressionNode {
    pub fn priority(&self) -> u8 {
        self.op.map(Op::priority).unwrap_or(8)
    }
}

/// An expression as a small arena of nodes plus the root index.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub nodes: Vec<ExpressionNode>,
    pub root: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_capture_groups_ignoring_escapes_and_non_capturing() {
        assert_eq!(RegexLit::count_groups(r"(\w+)-(\w+)"), 2);
        assert_eq!(RegexLit::count_groups(r"\(literal\)"), 0);
        assert_eq!(RegexLit::count_groups(r"(?:x)(y)"), 1);
        assert_eq!(RegexLit::count_groups(r"no groups"), 0);
    }
}
