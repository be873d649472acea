//! Resolves a raw document fragment: condition blocks collapse to their
//! winning branch, loops expand into arrays, leaf strings are compiled.

use crate::classifier::{KeyKind, LoopDeclaration, classify};
use crate::condition::ConditionBlock;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::loops;
use crate::template::{CompileOptions, compile, compile_str, has_placeholders};
use crate::value::display_text;
use serde_json::{Map, Value};

/// What a node turned into. `Spread` values are spliced into a surrounding
/// array; `Nothing` drops the node.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Value(Value),
    Spread(Vec<Value>),
    Nothing,
}

impl Resolved {
    fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Spread(items) => Some(Value::Array(items)),
            Resolved::Nothing => None,
        }
    }
}

/// Resolve `node` against `ctx`. A top-level condition with no winning
/// branch yields `null`.
pub fn resolve(node: &Value, ctx: &Context, options: &CompileOptions) -> Result<Value> {
    Ok(resolve_node(node, ctx, options)?
        .into_value()
        .unwrap_or(Value::Null))
}

fn resolve_node(node: &Value, ctx: &Context, options: &CompileOptions) -> Result<Resolved> {
    match node {
        Value::Object(map) => resolve_object(map, ctx, options),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match resolve_node(item, ctx, options)? {
                    Resolved::Value(v) => out.push(v),
                    Resolved::Spread(values) => out.extend(values),
                    Resolved::Nothing => {}
                }
            }
            Ok(Resolved::Value(Value::Array(out)))
        }
        other => Ok(Resolved::Value(compile(other, ctx, options))),
    }
}

fn resolve_object(
    map: &Map<String, Value>,
    ctx: &Context,
    options: &CompileOptions,
) -> Result<Resolved> {
    let kinds: Vec<(&String, KeyKind<'_>, &Value)> =
        map.iter().map(|(k, v)| (k, classify(k), v)).collect();

    if let [(key, KeyKind::Loop(_), body)] = kinds.as_slice() {
        return expand_loop(key, body, ctx, options).map(Resolved::Spread);
    }
    if !kinds.is_empty()
        && kinds
            .iter()
            .all(|(_, kind, _)| matches!(kind, KeyKind::Condition(_)))
    {
        let block = ConditionBlock::from_map(map)?;
        return match block.select(ctx) {
            Some(branch) => resolve_node(branch, ctx, options),
            None => Ok(Resolved::Nothing),
        };
    }

    let mut out = Map::with_capacity(map.len());
    let mut run: Vec<(&str, &Value)> = Vec::new();
    for (key, kind, value) in &kinds {
        match kind {
            KeyKind::Condition(_) => run.push((key.as_str(), *value)),
            KeyKind::Loop(_) => {
                return Err(Error::LoopPlacement {
                    key: (*key).clone(),
                });
            }
            KeyKind::Plain => {
                merge_branch(&mut out, &mut run, ctx, options)?;
                let resolved_key = if has_placeholders(&Value::String((*key).clone())) {
                    display_text(&compile_str(key, ctx, options))
                } else {
                    (*key).clone()
                };
                if let Some(v) = resolve_node(value, ctx, options)?.into_value() {
                    out.insert(resolved_key, v);
                }
            }
        }
    }
    merge_branch(&mut out, &mut run, ctx, options)?;
    Ok(Resolved::Value(Value::Object(out)))
}

/// Resolve a pending run of condition keys inside a larger object and merge
/// the winning branch's entries into `out`.
fn merge_branch(
    out: &mut Map<String, Value>,
    run: &mut Vec<(&str, &Value)>,
    ctx: &Context,
    options: &CompileOptions,
) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    let block = ConditionBlock::from_entries(run.drain(..))?;
    let Some(branch) = block.select(ctx) else {
        return Ok(());
    };
    match resolve_node(branch, ctx, options)? {
        Resolved::Value(Value::Object(entries)) => {
            out.extend(entries);
            Ok(())
        }
        Resolved::Nothing => Ok(()),
        _ => Err(Error::BranchPlacement),
    }
}

fn expand_loop(
    key: &str,
    body: &Value,
    ctx: &Context,
    options: &CompileOptions,
) -> Result<Vec<Value>> {
    let decl = LoopDeclaration::parse(key)?;
    let mut out = Vec::new();
    for scope in loops::bind(&decl, ctx)? {
        if let Some(v) = resolve_node(body, &scope, options)?.into_value() {
            out.push(v);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(doc: Value, ctx: Value) -> Result<Value> {
        resolve(&doc, &Context::from_value(ctx), &CompileOptions::default())
    }

    #[test]
    fn sole_condition_object_is_replaced() {
        let doc = json!({"if user": {"text": "Hi ${user.name}"}, "else": {"text": "Sign in"}});
        assert_eq!(
            render(doc.clone(), json!({"user": {"name": "Ada"}})).expect("render"),
            json!({"text": "Hi Ada"})
        );
        assert_eq!(render(doc, json!({})).expect("render"), json!({"text": "Sign in"}));
    }

    #[test]
    fn loops_splice_into_arrays() {
        let doc = json!({
            "type": "list",
            "children": [
                {"text": "Header"},
                {"for item of items with i": {"text": "${i}. ${item}"}},
                {"if footer": {"text": "Footer"}}
            ]
        });
        let out = render(doc, json!({"items": ["a", "b"], "footer": false})).expect("render");
        assert_eq!(
            out,
            json!({
                "type": "list",
                "children": [
                    {"text": "Header"},
                    {"text": "0. a"},
                    {"text": "1. b"}
                ]
            })
        );
    }

    #[test]
    fn condition_runs_merge_into_objects() {
        let doc = json!({
            "type": "button",
            "if disabled": {"style": "muted"},
            "else": {"style": "primary", "action": "submit"},
            "label": "Go"
        });
        let out = render(doc, json!({"disabled": false})).expect("render");
        assert_eq!(
            out,
            json!({"type": "button", "style": "primary", "action": "submit", "label": "Go"})
        );
    }

    #[test]
    fn nested_loops_see_outer_variables() {
        let doc = json!({
            "for row of rows": {"for cell of row.cells": "${row.name}:${cell}"}
        });
        let ctx = json!({"rows": [{"name": "r1", "cells": [1, 2]}, {"name": "r2", "cells": [3]}]});
        assert_eq!(
            render(doc, ctx).expect("render"),
            json!([["r1:1", "r1:2"], ["r2:3"]])
        );
    }

    #[test]
    fn loop_beside_other_keys_is_rejected() {
        let doc = json!({"title": "x", "for i of 1..2": "${i}"});
        let err = render(doc, json!({})).expect_err("misplaced loop");
        assert_eq!(err.code(), "STENCIL_E_DOCUMENT_SHAPE");
    }

    #[test]
    fn scalar_branch_inside_object_is_rejected() {
        let doc = json!({"title": "x", "if a": "scalar"});
        let err = render(doc, json!({"a": true})).expect_err("scalar branch");
        assert_eq!(err.code(), "STENCIL_E_DOCUMENT_SHAPE");
    }

    #[test]
    fn condition_run_in_mixed_object_allows_one_if() {
        let doc = json!({"title": "x", "if a": {"p": 1}, "if b": {"q": 2}});
        let err = render(doc, json!({"a": true, "b": true})).expect_err("two ifs in one run");
        assert_eq!(err.code(), "STENCIL_E_CONDITION_BLOCK");

        let doc = json!({"if a": {"p": 1}, "title": "x", "if b": {"q": 2}});
        assert_eq!(
            render(doc, json!({"a": true, "b": true})).expect("plain key ends the run"),
            json!({"p": 1, "title": "x", "q": 2})
        );
    }

    #[test]
    fn top_level_condition_without_winner_is_null() {
        assert_eq!(render(json!({"if nope": 1}), json!({})).expect("render"), Value::Null);
    }

    #[test]
    fn loop_errors_propagate() {
        let err = render(json!([{"for x of missing": 1}]), json!({})).expect_err("missing");
        assert_eq!(err.to_string(), "Iterable 'missing' not found in context");
    }
}
