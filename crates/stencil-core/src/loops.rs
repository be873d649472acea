//! Loop engine: expands a loop declaration into a lazy sequence of
//! `(compiled template, scoped context)` pairs.
//!
//! Every iteration works on its own clone of the outer context with the
//! loop variables layered on top, so the outer context is never touched.
//! All four loop kinds are finite: a count, a closed range or a snapshot of
//! the iterable taken when the loop is bound.

use crate::classifier::{Bound, LoopDeclaration};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::template::{CompileOptions, compile};
use crate::value::as_integer;
use serde_json::{Value, json};

/// One iteration's output.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopItem {
    pub template: Value,
    pub context: Context,
}

/// True if `key` is a well-formed loop key.
pub fn check(key: &str) -> bool {
    LoopDeclaration::parse(key).is_ok()
}

/// Evaluate a single-entry `{ "<loop key>": template }` declaration.
pub fn evaluate<'a>(
    declaration: &'a Value,
    ctx: &'a Context,
    options: CompileOptions,
) -> Result<LoopIter<'a>> {
    let (key, template) = split_declaration(declaration)?;
    let decl = LoopDeclaration::parse(key)?;
    Ok(LoopIter {
        scopes: bind(&decl, ctx)?,
        template,
        options,
    })
}

/// Split a declaration object into its loop key and body.
pub fn split_declaration(declaration: &Value) -> Result<(&str, &Value)> {
    let Some(map) = declaration.as_object() else {
        return Err(Error::LoopDeclaration);
    };
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, template)), None) => Ok((key.as_str(), template)),
        _ => Err(Error::LoopDeclaration),
    }
}

/// Resolve the declaration's inputs against `ctx` and return the per-
/// iteration scoped contexts, without compiling anything.
pub fn bind<'a>(decl: &LoopDeclaration, ctx: &'a Context) -> Result<Scopes<'a>> {
    let cursor = match decl {
        LoopDeclaration::Times { count, var } => {
            let count = resolve_bound(count, ctx).ok_or(Error::TimesValue)?;
            Cursor::Counter {
                var: var.clone(),
                next: 1,
                end: count.saturating_add(1),
            }
        }
        LoopDeclaration::Range {
            var,
            start,
            end,
            inclusive,
        } => {
            let start = resolve_bound(start, ctx).ok_or(Error::RangeValue)?;
            let end = resolve_bound(end, ctx).ok_or(Error::RangeValue)?;
            Cursor::Counter {
                var: Some(var.clone()),
                next: start,
                end: if *inclusive { end.saturating_add(1) } else { end },
            }
        }
        LoopDeclaration::Array { item, path, index } => {
            let items = match ctx.get(path) {
                None => return Err(Error::IterableNotFound { path: path.clone() }),
                Some(Value::Array(items)) => items.clone(),
                Some(_) => return Err(Error::NotAnArray { path: path.clone() }),
            };
            Cursor::Items {
                item: item.clone(),
                index: index.clone(),
                items: items.into_iter().enumerate(),
            }
        }
        LoopDeclaration::Object { key, path, index } => {
            let keys: Vec<Value> = match ctx.get(path) {
                None => return Err(Error::IterableNotFound { path: path.clone() }),
                Some(Value::Object(map)) => map.keys().cloned().map(Value::String).collect(),
                Some(_) => return Err(Error::NotAnObject { path: path.clone() }),
            };
            Cursor::Items {
                item: key.clone(),
                index: index.clone(),
                items: keys.into_iter().enumerate(),
            }
        }
    };
    Ok(Scopes { base: ctx, cursor })
}

fn resolve_bound(bound: &Bound, ctx: &Context) -> Option<i64> {
    match bound {
        Bound::Literal(n) => Some(*n),
        Bound::Path(path) => ctx.get(path).and_then(as_integer),
    }
}

#[derive(Debug)]
enum Cursor {
    Counter {
        var: Option<String>,
        next: i64,
        end: i64,
    },
    Items {
        item: String,
        index: Option<String>,
        items: std::iter::Enumerate<std::vec::IntoIter<Value>>,
    },
}

/// Lazy sequence of scoped contexts, one per iteration.
#[derive(Debug)]
pub struct Scopes<'a> {
    base: &'a Context,
    cursor: Cursor,
}

impl Iterator for Scopes<'_> {
    type Item = Context;

    fn next(&mut self) -> Option<Context> {
        match &mut self.cursor {
            Cursor::Counter { var, next, end } => {
                if *next >= *end {
                    return None;
                }
                let n = *next;
                *next += 1;
                Some(match var {
                    Some(var) => self.base.clone_with([(var.clone(), json!(n))]),
                    None => self.base.clone(),
                })
            }
            Cursor::Items { item, index, items } => {
                let (i, value) = items.next()?;
                let mut overrides = vec![(item.clone(), value)];
                if let Some(index) = index {
                    overrides.push((index.clone(), json!(i)));
                }
                Some(self.base.clone_with(overrides))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match &self.cursor {
            Cursor::Counter { next, end, .. } => {
                usize::try_from(end.saturating_sub(*next)).unwrap_or(0)
            }
            Cursor::Items { items, .. } => items.len(),
        };
        (n, Some(n))
    }
}

/// Lazy, non-restartable sequence of [`LoopItem`]s. Each item's template is
/// compiled only when it is pulled.
#[derive(Debug)]
pub struct LoopIter<'a> {
    scopes: Scopes<'a>,
    template: &'a Value,
    options: CompileOptions,
}

impl Iterator for LoopIter<'_> {
    type Item = LoopItem;

    fn next(&mut self) -> Option<LoopItem> {
        let context = self.scopes.next()?;
        Some(LoopItem {
            template: compile(self.template, &context, &self.options),
            context,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.scopes.size_hint()
    }
}
