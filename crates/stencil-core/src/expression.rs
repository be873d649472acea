//! Boolean `if`-expressions.
//!
//! Source text is tokenized (quoted literals are opaque), parsed by recursive
//! descent into an [`Expr`] tree and evaluated against a [`Context`].
//!
//! Precedence, lowest first: `or`/`||`, `and`/`&&`, prefix `not`, then a
//! single comparison. Parentheses group.
//!
//! | form | meaning |
//! |---|---|
//! | `x` | `x` resolved and truthy, or the literal `true` |
//! | `x in y` | array membership or own-key existence |
//! | `x not in y` | negated `in` |
//! | `x == y`, `x is y` | same type and equal |
//! | `x != y`, `x is not y` | negated equality |
//! | `x > y` (`>=`, `<`, `<=`) | numeric comparison, false when not numeric |

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{as_f64, parse_number, strict_eq, truthy};
use serde_json::Value;
use std::iter::Peekable;
use std::str::Chars;

/// Parsed boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Not(Box<Expr>),
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Bare word: a path, number or special literal depending on position.
    Word(String),
    /// Quoted string literal.
    Quoted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
}

/// Operand after resolution. `Nil` only appears on the right-hand side and
/// matches both `null` and an absent value.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Undefined,
    Nil,
    Value(Value),
}

/// True when `expr` has the form `if <rest>`.
pub fn is_if_expression(expr: &str) -> bool {
    expr.trim_start()
        .strip_prefix("if ")
        .is_some_and(|rest| !rest.trim().is_empty())
}

/// Parse an expression, with or without its leading `if `.
pub fn parse(expr: &str) -> Result<Expr> {
    let body = strip_if(expr);
    let tokens = tokenize(body).map_err(|msg| Error::expr(expr, msg))?;
    if tokens.is_empty() {
        return Err(Error::expr(expr, "empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let parsed = parser.parse_or().map_err(|msg| Error::expr(expr, msg))?;
    if let Some(extra) = parser.peek() {
        return Err(Error::expr(expr, format!("unexpected {}", extra.describe())));
    }
    Ok(parsed)
}

/// Parse and evaluate in one step.
pub fn evaluate(expr: &str, ctx: &Context) -> Result<bool> {
    Ok(parse(expr)?.eval(ctx))
}

fn strip_if(expr: &str) -> &str {
    let trimmed = expr.trim();
    if trimmed == "if" {
        return "";
    }
    trimmed
        .strip_prefix("if ")
        .map(str::trim_start)
        .unwrap_or(trimmed)
}

impl Expr {
    /// Evaluation never fails: unresolvable operands just compare false.
    pub fn eval(&self, ctx: &Context) -> bool {
        match self {
            Expr::Or(items) => items.iter().any(|e| e.eval(ctx)),
            Expr::And(items) => items.iter().all(|e| e.eval(ctx)),
            Expr::Not(inner) => !inner.eval(ctx),
            Expr::Truthy(operand) => eval_bare(operand, ctx),
            Expr::Compare { left, op, right } => eval_compare(left, *op, right, ctx),
        }
    }
}

fn eval_bare(operand: &Operand, ctx: &Context) -> bool {
    match operand {
        Operand::Quoted(s) => !s.is_empty(),
        Operand::Word(w) => match ctx.get(w) {
            Some(v) => truthy(v),
            None => w == "true",
        },
    }
}

fn eval_compare(left: &Operand, op: CmpOp, right: &Operand, ctx: &Context) -> bool {
    match op {
        CmpOp::In => contains(right, left, ctx),
        CmpOp::NotIn => !contains(right, left, ctx),
        CmpOp::Eq => equals(&resolve_left(left, ctx), &resolve_right(right, ctx)),
        CmpOp::Ne => !equals(&resolve_left(left, ctx), &resolve_right(right, ctx)),
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
            let (Some(a), Some(b)) = (
                number_of(&resolve_left(left, ctx)),
                number_of(&resolve_right(right, ctx)),
            ) else {
                return false;
            };
            match op {
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Lt => a < b,
                _ => a <= b,
            }
        }
    }
}

/// Left operands are paths. Quoted and numeric literals that name nothing in
/// the context fall back to their literal value.
fn resolve_left(operand: &Operand, ctx: &Context) -> Resolved {
    match operand {
        Operand::Quoted(s) => match ctx.get(s) {
            Some(v) => Resolved::Value(v.clone()),
            None => Resolved::Value(Value::String(s.clone())),
        },
        Operand::Word(w) => match ctx.get(w) {
            Some(v) => Resolved::Value(v.clone()),
            None => match parse_number(w) {
                Some(n) => Resolved::Value(Value::Number(n)),
                None => Resolved::Undefined,
            },
        },
    }
}

/// Right operands: special literals, then quoted strings, then numbers, then
/// a path lookup.
fn resolve_right(operand: &Operand, ctx: &Context) -> Resolved {
    match operand {
        Operand::Quoted(s) => Resolved::Value(Value::String(s.clone())),
        Operand::Word(w) => match w.as_str() {
            "null" => Resolved::Value(Value::Null),
            "undefined" => Resolved::Undefined,
            "nil" => Resolved::Nil,
            "true" => Resolved::Value(Value::Bool(true)),
            "false" => Resolved::Value(Value::Bool(false)),
            _ => match parse_number(w) {
                Some(n) => Resolved::Value(Value::Number(n)),
                None => match ctx.get(w) {
                    Some(v) => Resolved::Value(v.clone()),
                    None => Resolved::Undefined,
                },
            },
        },
    }
}

fn equals(a: &Resolved, b: &Resolved) -> bool {
    match (a, b) {
        (Resolved::Nil, other) | (other, Resolved::Nil) => {
            matches!(other, Resolved::Undefined | Resolved::Nil | Resolved::Value(Value::Null))
        }
        (Resolved::Undefined, Resolved::Undefined) => true,
        (Resolved::Value(x), Resolved::Value(y)) => strict_eq(x, y),
        _ => false,
    }
}

fn number_of(r: &Resolved) -> Option<f64> {
    match r {
        Resolved::Value(v) => as_f64(v),
        _ => None,
    }
}

/// `needle in haystack`: the haystack is a path, the needle a literal.
fn contains(haystack: &Operand, needle: &Operand, ctx: &Context) -> bool {
    let hay = match haystack {
        Operand::Word(w) => ctx.get(w),
        Operand::Quoted(_) => None,
    };
    let Resolved::Value(needle) = resolve_right(needle, ctx) else {
        return false;
    };
    match hay {
        Some(Value::Array(items)) => items.iter().any(|item| strict_eq(item, &needle)),
        Some(Value::Object(map)) => match &needle {
            Value::String(key) => map.contains_key(key),
            Value::Number(n) => map.contains_key(&n.to_string()),
            _ => false,
        },
        Some(Value::String(s)) => needle.as_str().is_some_and(|n| s.contains(n)),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Or,
    And,
    Not,
    Is,
    In,
    Cmp(CmpOp),
    Quoted(String),
    Word(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Or => "'or'".into(),
            Token::And => "'and'".into(),
            Token::Not => "'not'".into(),
            Token::Is => "'is'".into(),
            Token::In => "'in'".into(),
            Token::Cmp(op) => format!("operator {op:?}"),
            Token::Quoted(s) => format!("string '{s}'"),
            Token::Word(w) => format!("'{w}'"),
        }
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut chars: Peekable<Chars> = input.chars().peekable();
    let mut out = Vec::new();
    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Token::LParen);
            }
            ')' => {
                chars.next();
                out.push(Token::RParen);
            }
            '\'' | '"' => {
                chars.next();
                let quote = c;
                let mut s = String::new();
                let mut escaped = false;
                let mut closed = false;
                for nc in chars.by_ref() {
                    if escaped {
                        s.push(nc);
                        escaped = false;
                    } else if nc == '\\' {
                        escaped = true;
                    } else if nc == quote {
                        closed = true;
                        break;
                    } else {
                        s.push(nc);
                    }
                }
                if !closed {
                    return Err("unterminated string literal".into());
                }
                out.push(Token::Quoted(s));
            }
            _ => {
                let mut word = String::new();
                while let Some(&nc) = chars.peek() {
                    if nc.is_whitespace() || nc == '(' || nc == ')' {
                        break;
                    }
                    word.push(nc);
                    chars.next();
                }
                out.push(keyword(word));
            }
        }
    }
    Ok(out)
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "or" | "||" => Token::Or,
        "and" | "&&" => Token::And,
        "not" => Token::Not,
        "is" => Token::Is,
        "in" => Token::In,
        "==" => Token::Cmp(CmpOp::Eq),
        "!=" => Token::Cmp(CmpOp::Ne),
        ">" => Token::Cmp(CmpOp::Gt),
        ">=" => Token::Cmp(CmpOp::Ge),
        "<" => Token::Cmp(CmpOp::Lt),
        "<=" => Token::Cmp(CmpOp::Le),
        _ => Token::Word(word),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut items = vec![self.parse_and()?];
        while self.eat(&Token::Or) {
            items.push(self.parse_and()?);
        }
        Ok(collapse(items, Expr::Or))
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut items = vec![self.parse_not()?];
        while self.eat(&Token::And) {
            items.push(self.parse_not()?);
        }
        Ok(collapse(items, Expr::And))
    }

    fn parse_not(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            if !self.eat(&Token::RParen) {
                return Err("missing closing parenthesis".into());
            }
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.operand()?;
        let op = match self.peek() {
            Some(Token::Is) => {
                self.pos += 1;
                if self.eat(&Token::Not) {
                    CmpOp::Ne
                } else {
                    CmpOp::Eq
                }
            }
            Some(Token::In) => {
                self.pos += 1;
                CmpOp::In
            }
            Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                self.pos += 2;
                CmpOp::NotIn
            }
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                op
            }
            _ => return Ok(Expr::Truthy(left)),
        };
        let right = self.operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn operand(&mut self) -> ParseResult<Operand> {
        match self.next() {
            Some(Token::Word(w)) => Ok(Operand::Word(w)),
            Some(Token::Quoted(s)) => Ok(Operand::Quoted(s)),
            Some(other) => Err(format!("expected operand, found {}", other.describe())),
            None => Err("expected operand, found end of expression".into()),
        }
    }
}

fn collapse(mut items: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}
