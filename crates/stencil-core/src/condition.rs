//! Condition blocks: one `if`, any number of `else if`, an optional `else`.

use crate::classifier::{ConditionKey, condition_key};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::expression::{self, Expr};
use serde_json::{Map, Value};

/// An `if` / `else if` / `else` group with its expressions parsed up front.
///
/// Construction enforces the block shape: exactly one leading `if`, any
/// number of `else if`, at most one trailing `else`.
#[derive(Debug, Clone)]
pub struct ConditionBlock<'a> {
    branches: Vec<Branch<'a>>,
}

#[derive(Debug, Clone)]
struct Branch<'a> {
    test: Option<Expr>,
    body: &'a Value,
}

impl<'a> ConditionBlock<'a> {
    /// Build from an object whose every key is a condition key.
    pub fn from_map(map: &'a Map<String, Value>) -> Result<Self> {
        Self::from_entries(map.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut branches = Vec::new();
        let mut ifs = 0usize;
        let mut seen_else = false;
        for (key, body) in entries {
            let Some(cond) = condition_key(key) else {
                return Err(Error::ConditionBlock(format!(
                    "'{key}' is not a condition key"
                )));
            };
            if seen_else {
                return Err(Error::ConditionBlock(format!(
                    "'{key}' appears after 'else'"
                )));
            }
            let test = match cond {
                ConditionKey::If(expr) => {
                    ifs += 1;
                    if ifs > 1 {
                        return Err(Error::ConditionBlock(
                            "exactly one 'if' key is allowed".into(),
                        ));
                    }
                    Some(expression::parse(expr)?)
                }
                ConditionKey::ElseIf(expr) => {
                    if ifs == 0 {
                        return Err(Error::ConditionBlock(format!(
                            "'{key}' must follow an 'if' key"
                        )));
                    }
                    Some(expression::parse(expr)?)
                }
                ConditionKey::Else => {
                    if ifs == 0 {
                        return Err(Error::ConditionBlock(
                            "'else' must follow an 'if' key".into(),
                        ));
                    }
                    seen_else = true;
                    None
                }
            };
            branches.push(Branch { test, body });
        }
        if ifs == 0 {
            return Err(Error::ConditionBlock("an 'if' key is required".into()));
        }
        Ok(Self { branches })
    }

    /// Body of the first branch whose test passes, in declaration order.
    pub fn select(&self, ctx: &Context) -> Option<&'a Value> {
        self.branches
            .iter()
            .find(|b| b.test.as_ref().is_none_or(|t| t.eval(ctx)))
            .map(|b| b.body)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_passing_branch() {
        let block = json!({
            "if role == 'admin'": "admin",
            "else if role == 'editor'": "editor",
            "else if role": "other",
            "else": "anonymous"
        });
        let map = block.as_object().expect("object");
        let cb = ConditionBlock::from_map(map).expect("valid block");
        assert_eq!(cb.len(), 4);

        let pick = |ctx: Value| cb.select(&Context::from_value(ctx)).cloned();
        assert_eq!(pick(json!({"role": "admin"})), Some(json!("admin")));
        assert_eq!(pick(json!({"role": "editor"})), Some(json!("editor")));
        assert_eq!(pick(json!({"role": "guest"})), Some(json!("other")));
        assert_eq!(pick(json!({})), Some(json!("anonymous")));
    }

    #[test]
    fn no_winner_without_else() {
        let block = json!({"if a": 1});
        let cb = ConditionBlock::from_map(block.as_object().expect("object")).expect("valid");
        assert_eq!(cb.select(&Context::new()), None);
    }

    #[test]
    fn shape_violations_fail_at_construction() {
        for bad in [
            json!({"else": 1}),
            json!({"if a": 1, "if b": 2}),
            json!({"else if a": 1}),
            json!({"if a": 1, "else": 2, "else if b": 3}),
            json!({"if a": 1, "title": 2}),
        ] {
            let err = ConditionBlock::from_map(bad.as_object().expect("object"))
                .expect_err("must reject");
            assert_eq!(err.code(), "STENCIL_E_CONDITION_BLOCK", "{bad}");
        }
    }

    #[test]
    fn expression_errors_surface_eagerly() {
        let block = json!({"if (a": 1});
        let err = ConditionBlock::from_map(block.as_object().expect("object"))
            .expect_err("bad expression");
        assert_eq!(err.code(), "STENCIL_E_EXPR_SYNTAX");
    }
}
