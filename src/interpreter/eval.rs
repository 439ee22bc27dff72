//! Tree-walking evaluator.
//!
//! [`EvalContext`] carries everything one run owns: the scope, the optional
//! connection, the collected device output. Statements execute in order;
//! expressions are evaluated over the rebalanced node arena. A `try` block
//! swallows connection failures and nothing else, so scripts can attempt
//! commands that may drop the session without masking their own bugs.

use regex::RegexBuilder;

use crate::ast::{
    Code, ElseBranch, Expression, Extract, ExtractMode, FunctionCall, IfCondition, Loop, Op,
    Operand, RegexLit, Statement, Template, Term,
};
use crate::connection::Connection;
use crate::error::RuntimeError;
use crate::interpreter::scope::Scope;
use crate::interpreter::value::{Scalar, Value};
use crate::subst;

/// Name of the buffered-response variable refreshed after every command.
pub const RESPONSE_VAR: &str = "__response__";

pub struct EvalContext<'a> {
    pub scope: Scope,
    conn: Option<&'a mut dyn Connection>,
    /// Raw responses, one entry per executed command.
    pub output: Vec<String>,
    /// Operator notes from `sys.message`, kept apart from device output.
    pub messages: Vec<String>,
    /// Set by `sys.exit()`; stops statement execution without an error.
    exited: bool,
}

impl<'a> EvalContext<'a> {
    pub fn new(scope: Scope, conn: Option<&'a mut dyn Connection>) -> Self {
        Self {
            scope,
            conn,
            output: Vec::new(),
            messages: Vec::new(),
            exited: false,
        }
    }

    pub fn connection(&mut self) -> Result<&mut (dyn Connection + 'a), RuntimeError> {
        match self.conn.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(RuntimeError::NoConnection),
        }
    }

    pub fn request_exit(&mut self) {
        self.exited = true;
    }

    pub fn run(&mut self, template: &Template) -> Result<(), RuntimeError> {
        self.exec_statements(&template.statements)
    }

    fn exec_code(&mut self, code: &Code) -> Result<(), RuntimeError> {
        self.exec_statements(&code.statements)
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> Result<(), RuntimeError> {
        for statement in statements {
            if self.exited {
                break;
            }
            self.exec_statement(statement)?;
        }
        Ok(())
    }

    fn exec_statement(&mut self, statement: &Statement) -> Result<(), RuntimeError> {
        match statement {
            Statement::Execute(line) => {
                let command = subst::substitute(&line.text, &self.scope)?;
                self.execute_command(&command)
            }
            Statement::Enter => self.execute_command(""),
            Statement::Assign { name, value } => {
                let value = self.eval_expression(value)?;
                self.scope.assign(name, value);
                Ok(())
            }
            Statement::Append { value, name } => {
                let appended = self.eval_expression(value)?;
                let mut items = match self.scope.get(name) {
                    Some(existing) => existing.as_list()?.to_vec(),
                    None => Vec::new(),
                };
                items.extend(appended.as_list()?.iter().cloned());
                self.scope.assign(name, Value::List(items));
                Ok(())
            }
            Statement::Extract(extract) => self.exec_extract(extract),
            Statement::Fail { message, condition } => {
                let triggered = match condition {
                    Some(condition) => self.eval_expression(condition)?.is_true()?,
                    None => true,
                };
                if triggered {
                    let message = self.eval_expression(message)?.first()?.to_text();
                    return Err(RuntimeError::Fail(message));
                }
                Ok(())
            }
            Statement::If(branch) => self.exec_if(branch),
            Statement::Loop(form) => self.exec_loop(form),
            Statement::Try { block } => match self.exec_code(block) {
                Err(RuntimeError::Connection(_)) => Ok(()),
                other => other,
            },
            Statement::FunctionCall(call) => {
                self.eval_function_call(call)?;
                Ok(())
            }
        }
    }

    /// Send one command and refresh `__response__` with the reply, split
    /// into lines.
    pub(crate) fn execute_command(&mut self, command: &str) -> Result<(), RuntimeError> {
        let response = self.connection()?.execute(command)?;
        let lines: Vec<Scalar> = response
            .lines()
            .map(|line| Scalar::Text(line.to_string()))
            .collect();
        self.scope.bind_root(RESPONSE_VAR, Value::List(lines));
        self.output.push(response);
        Ok(())
    }

    fn exec_if(&mut self, branch: &IfCondition) -> Result<(), RuntimeError> {
        if self.eval_expression(&branch.condition)?.is_true()? {
            return self.exec_code(&branch.then_block);
        }
        match &branch.else_block {
            Some(ElseBranch::ElseIf(nested)) => self.exec_if(nested),
            Some(ElseBranch::Else(block)) => self.exec_code(block),
            None => Ok(()),
        }
    }

    fn exec_extract(&mut self, extract: &Extract) -> Result<(), RuntimeError> {
        let regex = self.compile_regex(&extract.regex)?;
        let lines: Vec<String> = match &extract.source {
            Some(source) => self
                .eval_expression(source)?
                .as_list()?
                .iter()
                .map(Scalar::to_text)
                .collect(),
            None => match self.scope.get(RESPONSE_VAR) {
                Some(buffered) => buffered.as_list()?.iter().map(Scalar::to_text).collect(),
                None => Vec::new(),
            },
        };

        let mut columns: Vec<Vec<Scalar>> = match extract.mode {
            ExtractMode::Replace => vec![Vec::new(); extract.names.len()],
            ExtractMode::Append => extract
                .names
                .iter()
                .map(|name| match self.scope.get(name) {
                    Some(existing) => existing.as_list().map(<[Scalar]>::to_vec),
                    None => Ok(Vec::new()),
                })
                .collect::<Result<_, _>>()?,
        };
        for line in &lines {
            let Some(caps) = regex.captures(line) else {
                continue;
            };
            for (column, slot) in columns.iter_mut().enumerate() {
                let text = caps
                    .get(column + 1)
                    .map(|group| group.as_str().to_string())
                    .unwrap_or_default();
                slot.push(Scalar::Text(text));
            }
        }
        for (name, column) in extract.names.iter().zip(columns) {
            self.scope.assign(name, Value::List(column));
        }
        Ok(())
    }

    fn exec_loop(&mut self, form: &Loop) -> Result<(), RuntimeError> {
        // Condition-only loops iterate over an endless unit source.
        if !form.lists.is_empty() {
            let lists: Vec<Vec<Scalar>> = form
                .lists
                .iter()
                .map(|list| Ok(self.eval_expression(list)?.as_list()?.to_vec()))
                .collect::<Result<_, RuntimeError>>()?;
            let first = lists[0].len();
            for other in &lists[1..] {
                if other.len() != first {
                    return Err(RuntimeError::ListLengthMismatch {
                        first,
                        other: other.len(),
                    });
                }
            }
            self.run_loop_body(form, first, |ctx, index| {
                for (name, list) in form.iter_names.iter().zip(&lists) {
                    ctx.scope.bind(name, Value::scalar(list[index].clone()));
                }
                Ok(())
            })
        } else if form.from.is_some() {
            let from = self.eval_required(&form.from)?.first()?.as_int()?;
            let to = self.eval_required(&form.to)?.first()?.as_int()?;
            let count = if to < from { 0 } else { (to - from + 1) as usize };
            let name = &form.iter_names[0];
            self.run_loop_body(form, count, |ctx, index| {
                ctx.scope.bind(name, Value::int(from + index as i64));
                Ok(())
            })
        } else {
            self.run_loop_body(form, usize::MAX, |_, _| Ok(()))
        }
    }

    /// One frame for the whole loop; iterators rebind each pass so they
    /// shadow instead of leaking.
    fn run_loop_body(
        &mut self,
        form: &Loop,
        count: usize,
        mut bind: impl FnMut(&mut Self, usize) -> Result<(), RuntimeError>,
    ) -> Result<(), RuntimeError> {
        self.scope.push_frame();
        let result = (|| {
            for index in 0..count {
                bind(self, index)?;
                if let Some(until) = &form.until {
                    if self.eval_expression(until)?.is_true()? {
                        break;
                    }
                }
                if let Some(during) = &form.during {
                    if !self.eval_expression(during)?.is_true()? {
                        break;
                    }
                }
                self.exec_code(&form.block)?;
                if self.exited {
                    break;
                }
            }
            Ok(())
        })();
        self.scope.pop_frame();
        result
    }

    fn eval_required(&mut self, expr: &Option<Expression>) -> Result<Value, RuntimeError> {
        let expr = expr.as_ref().expect("loop bound checked by the parser");
        self.eval_expression(expr)
    }

    pub fn eval_expression(&mut self, expr: &Expression) -> Result<Value, RuntimeError> {
        self.eval_node(expr, expr.root)
    }

    fn eval_node(&mut self, expr: &Expression, index: usize) -> Result<Value, RuntimeError> {
        let node = &expr.nodes[index];
        let Some(op) = node.op else {
            let operand = node.lft.clone().expect("leaf node has a left operand");
            return self.eval_operand(expr, &operand);
        };
        let lft = node.lft.clone();
        let rgt = node.rgt.clone().expect("binary node has a right operand");

        if op == Op::Not {
            let value = self.eval_operand(expr, &rgt)?;
            return Ok(Value::bool(!value.is_true()?));
        }
        let lhs = {
            let operand = lft.expect("binary node has a left operand");
            self.eval_operand(expr, &operand)?
        };
        match op {
            Op::And => {
                if !lhs.is_true()? {
                    return Ok(Value::bool(false));
                }
                let rhs = self.eval_operand(expr, &rgt)?;
                Ok(Value::bool(rhs.is_true()?))
            }
            Op::Or => {
                if lhs.is_true()? {
                    return Ok(Value::bool(true));
                }
                let rhs = self.eval_operand(expr, &rgt)?;
                Ok(Value::bool(rhs.is_true()?))
            }
            Op::Matches => {
                let literal = resolve_regex_operand(expr, &rgt)
                    .ok_or(RuntimeError::MatchesNeedsRegex)?;
                let regex = self.compile_regex(literal)?;
                let subject = lhs.first()?.to_text();
                Ok(Value::bool(regex.is_match(&subject)))
            }
            _ => {
                let rhs = self.eval_operand(expr, &rgt)?;
                self.apply_binary(op, lhs, rhs)
            }
        }
    }

    fn apply_binary(&self, op: Op, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
        match op {
            Op::Mod => {
                let divisor = rhs.first()?.as_int()?;
                if divisor == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                Ok(Value::int(lhs.first()?.as_int()? % divisor))
            }
            Op::Mul => Ok(Value::int(lhs.first()?.as_int()? * rhs.first()?.as_int()?)),
            Op::Add => Ok(Value::int(lhs.first()?.as_int()? + rhs.first()?.as_int()?)),
            Op::Sub => Ok(Value::int(lhs.first()?.as_int()? - rhs.first()?.as_int()?)),
            Op::Concat => {
                let mut text = lhs.first()?.to_text();
                text.push_str(&rhs.first()?.to_text());
                Ok(Value::text(text))
            }
            Op::Is => Ok(Value::bool(scalars_equal(&lhs.first()?, &rhs.first()?))),
            Op::IsNot => Ok(Value::bool(!scalars_equal(&lhs.first()?, &rhs.first()?))),
            Op::In => Ok(Value::bool(list_contains(&rhs, &lhs)?)),
            Op::NotIn => Ok(Value::bool(!list_contains(&rhs, &lhs)?)),
            Op::Ge => Ok(Value::bool(lhs.first()?.as_int()? >= rhs.first()?.as_int()?)),
            Op::Gt => Ok(Value::bool(lhs.first()?.as_int()? > rhs.first()?.as_int()?)),
            Op::Le => Ok(Value::bool(lhs.first()?.as_int()? <= rhs.first()?.as_int()?)),
            Op::Lt => Ok(Value::bool(lhs.first()?.as_int()? < rhs.first()?.as_int()?)),
            Op::Matches | Op::Not | Op::And | Op::Or => {
                unreachable!("handled before apply_binary")
            }
        }
    }

    fn eval_operand(&mut self, expr: &Expression, operand: &Operand) -> Result<Value, RuntimeError> {
        match operand {
            Operand::Node(index) => self.eval_node(expr, *index),
            Operand::Term(term) => self.eval_term(term),
        }
    }

    fn eval_term(&mut self, term: &Term) -> Result<Value, RuntimeError> {
        match term {
            Term::Number(n) => Ok(Value::int(*n)),
            Term::Bool(b) => Ok(Value::bool(*b)),
            Term::String(lit) => Ok(Value::text(subst::substitute(&lit.text, &self.scope)?)),
            Term::Regex(_) => Err(RuntimeError::MatchesNeedsRegex),
            Term::Variable { name, .. } => match self.scope.get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(RuntimeError::UndefinedVariable {
                    name: name.clone(),
                }),
            },
            Term::FunctionCall(call) => self.eval_function_call(call),
            Term::Nested(inner) => self.eval_expression(inner),
        }
    }

    fn eval_function_call(&mut self, call: &FunctionCall) -> Result<Value, RuntimeError> {
        let function = match self.scope.get(&call.name) {
            Some(Value::Function(function)) => *function,
            Some(Value::List(_)) => {
                return Err(RuntimeError::NotCallable {
                    name: call.name.clone(),
                })
            }
            None => {
                return Err(RuntimeError::UndefinedVariable {
                    name: call.name.clone(),
                })
            }
        };
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval_expression(arg)?.as_list()?.to_vec());
        }
        (function.call)(self, args).map(Value::List)
    }

    fn compile_regex(&self, literal: &RegexLit) -> Result<regex::Regex, RuntimeError> {
        let pattern = subst::substitute(&literal.pattern, &self.scope)?;
        RegexBuilder::new(&pattern)
            .case_insensitive(literal.ignore_case)
            .build()
            .map_err(|err| RuntimeError::InvalidRegex {
                pattern,
                message: err.to_string(),
            })
    }
}

/// Mixed-type equality: numeric when both sides read as numbers, textual
/// otherwise, so `"10" is 10` holds.
fn scalars_equal(lhs: &Scalar, rhs: &Scalar) -> bool {
    if let (Ok(a), Ok(b)) = (lhs.as_int(), rhs.as_int()) {
        return a == b;
    }
    lhs.to_text() == rhs.to_text()
}

fn list_contains(haystack: &Value, needle: &Value) -> Result<bool, RuntimeError> {
    let needle = needle.first()?;
    Ok(haystack
        .as_list()?
        .iter()
        .any(|item| scalars_equal(item, &needle)))
}

/// Find the regex literal behind a `matches` right-hand side, looking
/// through leaf nodes and parentheses.
fn resolve_regex_operand<'e>(expr: &'e Expression, operand: &'e Operand) -> Option<&'e RegexLit> {
    match operand {
        Operand::Term(Term::Regex(literal)) => Some(literal),
        Operand::Term(Term::Nested(inner)) => {
            let root = &inner.nodes[inner.root];
            if root.op.is_some() {
                return None;
            }
            resolve_regex_operand(inner, root.lft.as_ref()?)
        }
        Operand::Term(_) => None,
        Operand::Node(index) => {
            let node = &expr.nodes[*index];
            if node.op.is_some() {
                return None;
            }
            resolve_regex_operand(expr, node.lft.as_ref()?)
        }
    }
}
