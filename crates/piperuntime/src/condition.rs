//! Edge guard evaluation.
//!
//! Guards are parsed into a small expression tree (comparisons, literals,
//! boolean connectives) and evaluated directly. A guard can take one of
//! three shapes, tried in order:
//!
//! 1. a comparison suffix such as `>10` or `== 'done'`, applied to the
//!    source node's output (`value`);
//! 2. a self-contained boolean expression such as `3 > 2 and true`;
//! 3. a bare literal, compared as text against the string form of the
//!    source node's output.

use pipecore::Value;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, usize),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Unexpected token {0:?}")]
    UnexpectedToken(Token),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Name '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Cannot compare {left} {op} {right}")]
    IncomparableTypes {
        left: &'static str,
        op: CmpOp,
        right: &'static str,
    },

    #[error("Cannot negate {0}")]
    InvalidNegation(&'static str),

    #[error("Integer overflow negating {0}")]
    Overflow(i64),

    #[error("Expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Deepest nesting of parentheses, `not` and unary minus a guard may use
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Lt => "<",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    /// Operands of a run of `and`, short-circuited left to right
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// `first op1 e1 op2 e2 ...`, evaluated pairwise like `a < b and b < c`
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
}

/// Whether an edge guard is satisfied for the given source output.
///
/// Evaluation errors never propagate: they mean the edge is not taken.
pub fn satisfied(guard: &str, value: Option<&Value>) -> bool {
    let guard = guard.trim();
    if guard.is_empty() {
        return true;
    }

    if starts_with_comparison(guard) {
        let expr = format!("value {}", guard);
        return match evaluate_str(&expr, value) {
            Ok(result) => {
                tracing::debug!("Guard '{}' evaluated to {}", expr, result);
                result.is_truthy()
            }
            Err(e) => {
                tracing::debug!("Guard '{}' could not be evaluated: {}", expr, e);
                false
            }
        };
    }

    match evaluate_str(guard, None) {
        Ok(result) => {
            tracing::debug!("Guard '{}' evaluated to {}", guard, result);
            result.is_truthy()
        }
        Err(e) => match value {
            Some(value) => {
                let matched = value.to_string() == guard;
                tracing::debug!(
                    "Guard '{}' is not an expression ({}), literal match against '{}': {}",
                    guard,
                    e,
                    value,
                    matched
                );
                matched
            }
            None => {
                tracing::debug!("Guard '{}' failed and there is no output to compare: {}", guard, e);
                false
            }
        },
    }
}

fn starts_with_comparison(guard: &str) -> bool {
    ["==", "!=", ">", "<"].iter().any(|op| guard.starts_with(op))
}

/// Parse and evaluate `source` with `value` bound to the names `value` and `output`.
pub fn evaluate_str(source: &str, value: Option<&Value>) -> Result<Value, ConditionError> {
    let expr = parse(source)?;
    evaluate(&expr, value)
}

pub fn parse(source: &str) -> Result<Expr, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ConditionError::UnexpectedToken(token.clone())),
    }
}

pub fn evaluate(expr: &Expr, value: Option<&Value>) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var(name) => match (name.as_str(), value) {
            ("value" | "output", Some(v)) => Ok(v.clone()),
            _ => Err(ConditionError::UndefinedVariable(name.clone())),
        },
        Expr::Not(inner) => Ok(Value::Bool(!evaluate(inner, value)?.is_truthy())),
        Expr::Neg(inner) => match evaluate(inner, value)? {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or(ConditionError::Overflow(n)),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(ConditionError::InvalidNegation(other.type_name())),
        },
        Expr::And(operands) => {
            for operand in operands {
                if !evaluate(operand, value)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Expr::Or(operands) => {
            for operand in operands {
                if evaluate(operand, value)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Expr::Compare { first, rest } => {
            let mut left = evaluate(first, value)?;
            for (op, operand) in rest {
                let right = evaluate(operand, value)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (l, r) if is_number(l) && is_number(r) => {
            let (a, b) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match (op, ordering) {
        (CmpOp::Eq, Some(o)) => Ok(o == Ordering::Equal),
        (CmpOp::Ne, Some(o)) => Ok(o != Ordering::Equal),
        (CmpOp::Eq, None) => Ok(left == right),
        (CmpOp::Ne, None) => Ok(left != right),
        (CmpOp::Gt, Some(o)) => Ok(o == Ordering::Greater),
        (CmpOp::Lt, Some(o)) => Ok(o == Ordering::Less),
        (CmpOp::Ge, Some(o)) => Ok(o != Ordering::Less),
        (CmpOp::Le, Some(o)) => Ok(o != Ordering::Greater),
        (op, None) => Err(ConditionError::IncomparableTypes {
            left: left.type_name(),
            op,
            right: right.type_name(),
        }),
    }
}

fn is_number(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Float(_))
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ge));
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Le));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Cmp(CmpOp::Gt));
                i += 1;
            }
            '<' => {
                tokens.push(Token::Cmp(CmpOp::Lt));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(ConditionError::UnterminatedString),
                        Some('\\') if chars.get(i + 1).is_some() => {
                            text.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(number_token(&text)?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" | "True" => Token::True,
                    "false" | "False" => Token::False,
                    "null" | "None" => Token::Null,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(ConditionError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
}

fn number_token(text: &str) -> Result<Token, ConditionError> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ConditionError::InvalidNumber(text.to_string()))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ConditionError::InvalidNumber(text.to_string()))
    }
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

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Run `parse` one nesting level deeper, failing past `MAX_NESTING`
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ConditionError>,
    ) -> Result<T, ConditionError> {
        if self.depth >= MAX_NESTING {
            return Err(ConditionError::TooDeep(MAX_NESTING));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn or(&mut self) -> Result<Expr, ConditionError> {
        let first = self.and()?;
        let mut operands = vec![first];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            operands.push(self.and()?);
        }
        Ok(collapse(operands, Expr::Or))
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let first = self.not()?;
        let mut operands = vec![first];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            operands.push(self.not()?);
        }
        Ok(collapse(operands, Expr::And))
    }

    fn not(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.nested(Self::not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ConditionError> {
        let first = self.unary()?;
        let mut rest = Vec::new();
        while let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            rest.push((op, self.unary()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(n)) => Ok(Expr::Literal(Value::Float(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.nested(Self::or)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ConditionError::UnexpectedToken(other)),
                    None => Err(ConditionError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ConditionError::UnexpectedToken(other)),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }
}

fn collapse(mut operands: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        join(operands)
    }
}
