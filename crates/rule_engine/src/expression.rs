// Rust guideline compliant 2026-10-17

//! Custom condition expressions (`evaluates_to_true`).
//!
//! A closed grammar over transaction fields, parsed once when a rule is
//! compiled:
//!
//! ```text
//! expr       := and ( "||" and )*
//! and        := equality ( "&&" equality )*
//! equality   := comparison ( ( "==" | "!=" ) comparison )*
//! comparison := additive ( ( "<" | "<=" | ">" | ">=" ) additive )*
//! additive   := term ( ( "+" | "-" ) term )*
//! term       := unary ( ( "*" | "/" ) unary )*
//! unary      := ( "!" | "-" ) unary | primary
//! primary    := number | string | "true" | "false" | field | "(" expr ")"
//! ```
//!
//! `===` and `!==` are accepted as spellings of `==` and `!=`. Identifiers are
//! field names from the vocabulary, plus `amount` for `transaction_amount`.
//! Evaluation reads the transaction and nothing else.

use std::time::{Duration, Instant};

use domain::{ConditionError, Field, FieldKind, FieldValue, Transaction};

use crate::operator::numbers_equal;

/// Longest accepted expression source, in bytes.
const MAX_SOURCE_LEN: usize = 1024;
/// Deepest accepted nesting of unary operators and parentheses.
const MAX_DEPTH: usize = 64;
/// The wall clock is read once every this many steps.
const CLOCK_CHECK_INTERVAL: u64 = 32;

// ---------------------------------------------------------------------------
// EvalLimits / Budget
// ---------------------------------------------------------------------------

/// Cost guard applied to each custom condition evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum number of expression nodes visited.
    pub max_steps: u64,
    /// Wall-clock allowance for one condition.
    pub timeout: Duration,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self { max_steps: 10_000, timeout: Duration::from_millis(10) }
    }
}

/// Running cost of one custom condition evaluation.
#[derive(Debug)]
pub(crate) struct Budget {
    steps: u64,
    max_steps: u64,
    started: Instant,
    timeout: Duration,
}

impl Budget {
    pub(crate) fn start(limits: EvalLimits) -> Self {
        Self { steps: 0, max_steps: limits.max_steps, started: Instant::now(), timeout: limits.timeout }
    }

    /// Charge one step.
    pub(crate) fn tick(&mut self) -> Result<(), ConditionError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ConditionError::Timeout { steps: self.steps });
        }
        if self.steps % CLOCK_CHECK_INTERVAL == 0 {
            self.check_deadline()?;
        }
        Ok(())
    }

    /// Fail if the wall-clock allowance is spent.
    pub(crate) fn check_deadline(&self) -> Result<(), ConditionError> {
        if self.started.elapsed() > self.timeout {
            return Err(ConditionError::Timeout { steps: self.steps });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Bool(bool),
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn invalid(reason: impl Into<String>) -> ConditionError {
    ConditionError::InvalidExpression { reason: reason.into() }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '0'..='9' | '.' => {
                let mut end = start + 1;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                let text = &src[start..end];
                Token::Number(
                    text.parse::<f64>().map_err(|err| invalid(format!("malformed number `{text}`: {err}")))?,
                )
            }
            '\'' | '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, s)) = chars.next() {
                    match s {
                        '\\' => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        s if s == c => {
                            closed = true;
                            break;
                        }
                        s => value.push(s),
                    }
                }
                if !closed {
                    return Err(invalid(format!("unterminated string starting at {start}")));
                }
                Token::Str(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = start + 1;
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_alphanumeric() || d == '_') {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                match &src[start..end] {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    name => Token::Ident(name.to_owned()),
                }
            }
            '&' | '|' => {
                if chars.next_if(|&(_, d)| d == c).is_none() {
                    return Err(invalid(format!("expected `{c}{c}` at {start}")));
                }
                if c == '&' { Token::AndAnd } else { Token::OrOr }
            }
            '=' => {
                if chars.next_if(|&(_, d)| d == '=').is_none() {
                    return Err(invalid(format!("assignment is not allowed, use `==` at {start}")));
                }
                chars.next_if(|&(_, d)| d == '=');
                Token::EqEq
            }
            '!' => {
                if chars.next_if(|&(_, d)| d == '=').is_some() {
                    chars.next_if(|&(_, d)| d == '=');
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '>' | '<' => {
                let or_equal = chars.next_if(|&(_, d)| d == '=').is_some();
                match (c, or_equal) {
                    ('>', false) => Token::Gt,
                    ('>', true) => Token::Ge,
                    (_, false) => Token::Lt,
                    (_, true) => Token::Le,
                }
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(invalid(format!("unexpected character `{other}` at {start}"))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_token(token: &Token) -> Option<Self> {
        Some(match token {
            Token::OrOr => Self::Or,
            Token::AndAnd => Self::And,
            Token::EqEq => Self::Eq,
            Token::NotEq => Self::Ne,
            Token::Gt => Self::Gt,
            Token::Ge => Self::Ge,
            Token::Lt => Self::Lt,
            Token::Le => Self::Le,
            Token::Plus => Self::Add,
            Token::Minus => Self::Sub,
            Token::Star => Self::Mul,
            Token::Slash => Self::Div,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Str(String),
    Bool(bool),
    Field(Field),
    Not(Box<Node>),
    Neg(Box<Node>),
    Binary { op: BinaryOp, lhs: Box<Node>, rhs: Box<Node> },
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Map an identifier to the field it names.
fn lookup_identifier(name: &str) -> Result<Field, ConditionError> {
    if name == "amount" {
        return Ok(Field::TransactionAmount);
    }
    Field::from_name(name)
        .filter(|field| field.kind() != FieldKind::Context)
        .ok_or_else(|| invalid(format!("unknown field `{name}`")))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// Parse one left-associative precedence level.
    fn binary_level(
        &mut self,
        ops: &[BinaryOp],
        operand: fn(&mut Self) -> Result<Node, ConditionError>,
    ) -> Result<Node, ConditionError> {
        let mut lhs = operand(self)?;
        while let Some(op) = self.peek().and_then(BinaryOp::from_token).filter(|op| ops.contains(op)) {
            self.pos += 1;
            let rhs = operand(self)?;
            lhs = Node::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn or(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::Or], Self::and)
    }

    fn and(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::And], Self::equality)
    }

    fn equality(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::Eq, BinaryOp::Ne], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::Gt, BinaryOp::Ge, BinaryOp::Lt, BinaryOp::Le], Self::additive)
    }

    fn additive(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::Add, BinaryOp::Sub], Self::term)
    }

    fn term(&mut self) -> Result<Node, ConditionError> {
        self.binary_level(&[BinaryOp::Mul, BinaryOp::Div], Self::unary)
    }

    fn unary(&mut self) -> Result<Node, ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(invalid(format!("nesting deeper than {MAX_DEPTH}")));
        }
        let node = match self.peek() {
            Some(Token::Bang) => {
                self.pos += 1;
                self.unary().map(|inner| Node::Not(Box::new(inner)))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                self.unary().map(|inner| Node::Neg(Box::new(inner)))
            }
            _ => self.primary(),
        };
        self.depth -= 1;
        node
    }

    fn primary(&mut self) -> Result<Node, ConditionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Node::Number(n)),
            Some(Token::Str(s)) => Ok(Node::Str(s)),
            Some(Token::Bool(b)) => Ok(Node::Bool(b)),
            Some(Token::Ident(name)) => lookup_identifier(&name).map(Node::Field),
            Some(Token::LParen) => {
                let inner = self.or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(invalid("missing `)`")),
                }
            }
            Some(token) => Err(invalid(format!("unexpected token {token:?}"))),
            None => Err(invalid("unexpected end of expression")),
        }
    }
}

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// A parsed custom expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl Expression {
    /// Parse `src`.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::InvalidExpression` on a syntax error, an
    /// unknown identifier, or a source that is too long or too deeply nested.
    pub fn parse(src: &str) -> Result<Self, ConditionError> {
        if src.len() > MAX_SOURCE_LEN {
            return Err(invalid(format!("expression longer than {MAX_SOURCE_LEN} bytes")));
        }
        let tokens = tokenize(src)?;
        if tokens.is_empty() {
            return Err(invalid("expression is empty"));
        }
        let mut parser = Parser { tokens, pos: 0, depth: 0 };
        let root = parser.or()?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected trailing token {token:?}")));
        }
        Ok(Self { root })
    }

    /// Evaluate against `tx`; the expression must yield a boolean.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::ExpressionEvaluation` for unbound fields and
    /// ill-typed operations, or `ConditionError::Timeout` when `budget` runs out.
    pub(crate) fn evaluate(&self, tx: &Transaction, budget: &mut Budget) -> Result<bool, ConditionError> {
        match eval(&self.root, tx, budget)? {
            Value::Bool(b) => Ok(b),
            other => Err(eval_error(format!("expression yields a {} instead of a boolean", other.type_name()))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Value<'a> {
    Number(f64),
    Text { text: &'a str, categorical: bool },
    Bool(bool),
}

impl Value<'_> {
    fn type_name(self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text { .. } => "string",
            Value::Bool(_) => "boolean",
        }
    }
}

fn eval_error(reason: impl Into<String>) -> ConditionError {
    ConditionError::ExpressionEvaluation { reason: reason.into() }
}

fn eval<'a>(node: &'a Node, tx: &'a Transaction, budget: &mut Budget) -> Result<Value<'a>, ConditionError> {
    budget.tick()?;
    match node {
        Node::Number(n) => Ok(Value::Number(*n)),
        Node::Str(s) => Ok(Value::Text { text: s, categorical: false }),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::Field(field) => match tx.value(*field) {
            Some(FieldValue::Number(n)) => Ok(Value::Number(n)),
            Some(FieldValue::Text(text)) => {
                Ok(Value::Text { text, categorical: field.kind() == FieldKind::Categorical })
            }
            Some(FieldValue::Bool(b)) => Ok(Value::Bool(b)),
            None => Err(eval_error(format!("unbound variable `{field}`"))),
        },
        Node::Not(inner) => match eval(inner, tx, budget)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(eval_error(format!("`!` applied to a {}", other.type_name()))),
        },
        Node::Neg(inner) => match eval(inner, tx, budget)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => Err(eval_error(format!("`-` applied to a {}", other.type_name()))),
        },
        Node::Binary { op: BinaryOp::And, lhs, rhs } => {
            Ok(Value::Bool(as_bool(eval(lhs, tx, budget)?, "&&")? && as_bool(eval(rhs, tx, budget)?, "&&")?))
        }
        Node::Binary { op: BinaryOp::Or, lhs, rhs } => {
            Ok(Value::Bool(as_bool(eval(lhs, tx, budget)?, "||")? || as_bool(eval(rhs, tx, budget)?, "||")?))
        }
        Node::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, tx, budget)?;
            let rhs = eval(rhs, tx, budget)?;
            binary(*op, lhs, rhs)
        }
    }
}

fn as_bool(value: Value<'_>, op: &str) -> Result<bool, ConditionError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(eval_error(format!("`{op}` applied to a {}", other.type_name()))),
    }
}

fn binary<'a>(op: BinaryOp, lhs: Value<'a>, rhs: Value<'a>) -> Result<Value<'a>, ConditionError> {
    let mismatch = || eval_error(format!("cannot apply {op:?} to a {} and a {}", lhs.type_name(), rhs.type_name()));
    match (op, lhs, rhs) {
        (BinaryOp::Eq | BinaryOp::Ne, _, _) => {
            let equal = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Text { text: a, categorical: ca }, Value::Text { text: b, categorical: cb }) => {
                    if ca || cb { a.eq_ignore_ascii_case(b) } else { a == b }
                }
                _ => return Err(mismatch()),
            };
            Ok(Value::Bool(equal == (op == BinaryOp::Eq)))
        }
        (BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le, _, _) => {
            let ordering = match (lhs, rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(&b),
                (Value::Text { text: a, .. }, Value::Text { text: b, .. }) => Some(a.cmp(b)),
                _ => return Err(mismatch()),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Ge => ordering.is_ge(),
                BinaryOp::Lt => ordering.is_lt(),
                _ => ordering.is_le(),
            }))
        }
        (_, Value::Number(a), Value::Number(b)) => match op {
            BinaryOp::Add => Ok(Value::Number(a + b)),
            BinaryOp::Sub => Ok(Value::Number(a - b)),
            BinaryOp::Mul => Ok(Value::Number(a * b)),
            _ if b == 0.0 => Err(eval_error("division by zero")),
            _ => Ok(Value::Number(a / b)),
        },
        _ => Err(mismatch()),
    }
}
