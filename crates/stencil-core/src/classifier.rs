//! Routes a document key to its sub-grammar without evaluating anything.
//!
//! | kind | grammar |
//! |---|---|
//! | condition | `if <expr>`, `else if <expr>`, `else` |
//! | times | `<count> times do`, `<count> times with <var> do` |
//! | range | `for\|each <var> in\|of <start>..<end>` (inclusive), `...` (exclusive) |
//! | array | `for\|each <item> of <path> [with <index>]` |
//! | object | `for\|each <key> in <path> [with <index>]` |

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKey<'k> {
    If(&'k str),
    ElseIf(&'k str),
    Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Times,
    Range,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind<'k> {
    Condition(ConditionKey<'k>),
    Loop(LoopKind),
    Plain,
}

/// Loop bound: an integer literal or a context path expected to hold one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Literal(i64),
    Path(String),
}

/// Fully parsed loop key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopDeclaration {
    Times {
        count: Bound,
        var: Option<String>,
    },
    Range {
        var: String,
        start: Bound,
        end: Bound,
        inclusive: bool,
    },
    Array {
        item: String,
        path: String,
        index: Option<String>,
    },
    Object {
        key: String,
        path: String,
        index: Option<String>,
    },
}

pub fn classify(key: &str) -> KeyKind<'_> {
    if let Some(cond) = condition_key(key) {
        return KeyKind::Condition(cond);
    }
    match LoopDeclaration::parse(key) {
        Ok(decl) => KeyKind::Loop(decl.kind()),
        Err(_) => KeyKind::Plain,
    }
}

pub fn condition_key(key: &str) -> Option<ConditionKey<'_>> {
    let trimmed = key.trim();
    if trimmed == "else" {
        return Some(ConditionKey::Else);
    }
    if let Some(rest) = trimmed.strip_prefix("else if ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(ConditionKey::ElseIf(rest));
    }
    if let Some(rest) = trimmed.strip_prefix("if ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then_some(ConditionKey::If(rest));
    }
    None
}

pub fn is_condition_key(key: &str) -> bool {
    condition_key(key).is_some()
}

pub fn is_loop_key(key: &str) -> bool {
    LoopDeclaration::parse(key).is_ok()
}

impl LoopDeclaration {
    pub fn parse(key: &str) -> Result<Self> {
        parse_loop(key).ok_or_else(|| Error::LoopSyntax {
            key: key.to_string(),
        })
    }

    pub fn kind(&self) -> LoopKind {
        match self {
            Self::Times { .. } => LoopKind::Times,
            Self::Range { .. } => LoopKind::Range,
            Self::Array { .. } => LoopKind::Array,
            Self::Object { .. } => LoopKind::Object,
        }
    }
}

fn parse_loop(key: &str) -> Option<LoopDeclaration> {
    let words: Vec<&str> = key.split_whitespace().collect();
    match words.as_slice() {
        [count, "times", "do"] => Some(LoopDeclaration::Times {
            count: bound(count)?,
            var: None,
        }),
        [count, "times", "with", var, "do"] => Some(LoopDeclaration::Times {
            count: bound(count)?,
            var: Some(ident(var)?),
        }),
        ["for" | "each", var, "in" | "of", span] if span.contains("..") => {
            let (start, end, inclusive) = split_range(span)?;
            Some(LoopDeclaration::Range {
                var: ident(var)?,
                start: bound(start)?,
                end: bound(end)?,
                inclusive,
            })
        }
        ["for" | "each", item, "of", path] => Some(LoopDeclaration::Array {
            item: ident(item)?,
            path: (*path).to_string(),
            index: None,
        }),
        ["for" | "each", item, "of", path, "with", index] => Some(LoopDeclaration::Array {
            item: ident(item)?,
            path: (*path).to_string(),
            index: Some(ident(index)?),
        }),
        ["for" | "each", key, "in", path] => Some(LoopDeclaration::Object {
            key: ident(key)?,
            path: (*path).to_string(),
            index: None,
        }),
        ["for" | "each", key, "in", path, "with", index] => Some(LoopDeclaration::Object {
            key: ident(key)?,
            path: (*path).to_string(),
            index: Some(ident(index)?),
        }),
        _ => None,
    }
}

fn split_range(span: &str) -> Option<(&str, &str, bool)> {
    if let Some((start, end)) = span.split_once("...") {
        return Some((start, end, false));
    }
    let (start, end) = span.split_once("..")?;
    Some((start, end, true))
}

fn bound(text: &str) -> Option<Bound> {
    if text.is_empty() || text.starts_with('.') || text.ends_with('.') {
        return None;
    }
    match text.parse::<i64>() {
        Ok(n) => Some(Bound::Literal(n)),
        Err(_) => Some(Bound::Path(text.to_string())),
    }
}

/// Loop variables are plain names: no path separators.
fn ident(text: &str) -> Option<String> {
    let valid = !text.is_empty()
        && !text.contains(['.', '[', ']'])
        && !text.starts_with(|c: char| c.is_ascii_digit());
    valid.then(|| text.to_string())
}
