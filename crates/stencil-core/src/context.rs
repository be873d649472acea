//! Variable environment used by every evaluator.
//!
//! Paths use dots and brackets: `user.name`, `items[0]`, `rows[key]`. The
//! contents of a bracket are resolved as a variable first.

use serde_json::{Map, Value};
use std::borrow::Cow;

/// Mutable variable environment queried and mutated during evaluation.
///
/// Entries keep insertion order. Cloning is deep: a [`Context::clone_with`]
/// copy never shares state with its origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'p> {
    Key(&'p str),
    Bracket(&'p str),
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(vars: Map<String, Value>) -> Self {
        Self { vars }
    }

    /// Build a context from a JSON object. Any other value yields an empty
    /// context.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(vars) => Self { vars },
            _ => Self::default(),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.vars
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.vars)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve a dotted/bracketed path. An exact top-level key wins over a
    /// path walk, so `"user.name"` stored verbatim is still reachable.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        if let Some(v) = self.vars.get(path) {
            return Some(v);
        }
        self.walk(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Insert or replace a top-level entry.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(key.into(), value)
    }

    /// Write through a dotted path, creating intermediate objects and
    /// replacing any non-object found on the way.
    pub fn set_path(&mut self, path: &str, value: Value) {
        map_set(&mut self.vars, path, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.shift_remove(key)
    }

    /// Copy of this context with `overrides` applied on top.
    pub fn clone_with<I, K>(&self, overrides: I) -> Context
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut next = self.clone();
        for (key, value) in overrides {
            next.vars.insert(key.into(), value);
        }
        next
    }

    /// Fold dotted top-level keys into nested objects: `{"a.b": 1}` becomes
    /// `{"a": {"b": 1}}`. Borrows when there is nothing to expand.
    pub fn expanded(&self) -> Cow<'_, Context> {
        if !self.vars.keys().any(|k| k.contains('.')) {
            return Cow::Borrowed(self);
        }
        let mut out = Map::new();
        for (key, value) in &self.vars {
            if key.contains('.') {
                merge_path(&mut out, key, value.clone());
            } else {
                match (out.get_mut(key), value) {
                    (Some(Value::Object(existing)), Value::Object(incoming)) => {
                        merge_maps(existing, incoming.clone());
                    }
                    _ => {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Cow::Owned(Context { vars: out })
    }

    fn walk(&self, path: &str) -> Option<&Value> {
        let segments = parse_segments(path)?;
        let mut iter = segments.into_iter();
        let first = self.segment_key(iter.next()?)?;
        let mut current = self.vars.get(first.as_ref())?;
        for segment in iter {
            let key = self.segment_key(segment)?;
            current = match current {
                Value::Object(obj) => obj.get(key.as_ref())?,
                Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Bracket contents are looked up as variables first; a string or
    /// integer result becomes the key. Otherwise the literal text is used.
    fn segment_key<'p>(&self, segment: Segment<'p>) -> Option<Cow<'p, str>> {
        match segment {
            Segment::Key(k) => Some(Cow::Borrowed(k)),
            Segment::Bracket(raw) => {
                let raw = raw.trim();
                if let Some(quoted) = strip_quotes(raw) {
                    return Some(Cow::Borrowed(quoted));
                }
                if raw.parse::<usize>().is_ok() {
                    return Some(Cow::Borrowed(raw));
                }
                match self.get(raw) {
                    Some(Value::String(s)) => Some(Cow::Owned(s.clone())),
                    Some(Value::Number(n)) if n.is_u64() || n.is_i64() => {
                        Some(Cow::Owned(n.to_string()))
                    }
                    _ => Some(Cow::Borrowed(raw)),
                }
            }
        }
    }
}

impl From<Map<String, Value>> for Context {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        ctx.into_value()
    }
}

/// Split `a.b[c].d` into segments. Brackets may nest (`a[b[c]]`).
fn parse_segments(path: &str) -> Option<Vec<Segment<'_>>> {
    let mut out = Vec::new();
    let bytes = path.as_bytes();
    let mut i = 0usize;
    let mut start = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                if i > start {
                    out.push(Segment::Key(&path[start..i]));
                }
                i += 1;
                start = i;
            }
            b'[' => {
                if i > start {
                    out.push(Segment::Key(&path[start..i]));
                }
                let open = i;
                let mut depth = 0usize;
                let mut close = None;
                for (j, b) in bytes.iter().enumerate().skip(open) {
                    match b {
                        b'[' => depth += 1,
                        b']' => {
                            depth -= 1;
                            if depth == 0 {
                                close = Some(j);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let close = close?;
                out.push(Segment::Bracket(&path[open + 1..close]));
                i = close + 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        out.push(Segment::Key(&path[start..]));
    }
    if out.is_empty() { None } else { Some(out) }
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let first = raw.chars().next()?;
    if (first == '\'' || first == '"') && raw.len() >= 2 && raw.ends_with(first) {
        Some(&raw[1..raw.len() - 1])
    } else {
        None
    }
}

fn map_set(map: &mut Map<String, Value>, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut cur = map;
    for part in parents {
        let entry = cur
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        cur = next;
    }
    cur.insert((*last).to_string(), value);
}

fn merge_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut nested = value;
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some((first, rest)) = parts.split_first() else {
        return;
    };
    for part in rest.iter().rev() {
        let mut wrapper = Map::new();
        wrapper.insert((*part).to_string(), nested);
        nested = Value::Object(wrapper);
    }
    match (map.get_mut(*first), nested) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => merge_maps(existing, incoming),
        (_, nested) => {
            map.insert((*first).to_string(), nested);
        }
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_maps(existing, incoming)
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        Context::from_value(value)
    }

    #[test]
    fn get_walks_dots_and_indices() {
        let c = ctx(json!({"user": {"name": "Ada", "tags": ["a", "b"]}}));
        assert_eq!(c.get("user.name"), Some(&json!("Ada")));
        assert_eq!(c.get("user.tags.1"), Some(&json!("b")));
        assert_eq!(c.get("user.tags[0]"), Some(&json!("a")));
        assert_eq!(c.get("user.missing"), None);
        assert_eq!(c.get(""), None);
    }

    #[test]
    fn bracket_contents_resolve_as_variables() {
        let c = ctx(json!({
            "field": "email",
            "row": 1,
            "user": {"email": "a@b.c", "name": "Ada"},
            "rows": [{"id": 1}, {"id": 2}]
        }));
        assert_eq!(c.get("user[field]"), Some(&json!("a@b.c")));
        assert_eq!(c.get("rows[row].id"), Some(&json!(2)));
        assert_eq!(c.get("user['name']"), Some(&json!("Ada")));
        assert_eq!(c.get("user[name]"), Some(&json!("Ada")));
    }

    #[test]
    fn exact_dotted_key_wins() {
        let c = ctx(json!({"a.b": 1, "a": {"b": 2}}));
        assert_eq!(c.get("a.b"), Some(&json!(1)));
    }

    #[test]
    fn clone_with_is_independent() {
        let mut base = ctx(json!({"n": 1, "list": [1]}));
        let mut copy = base.clone_with([("n", json!(2))]);
        copy.set_path("list", json!([1, 2]));
        base.set("extra", json!(true));
        assert_eq!(base.get("n"), Some(&json!(1)));
        assert_eq!(base.get("list"), Some(&json!([1])));
        assert_eq!(copy.get("n"), Some(&json!(2)));
        assert!(!copy.contains("extra"));
    }

    #[test]
    fn set_path_creates_and_replaces_parents() {
        let mut c = ctx(json!({"a": 5}));
        c.set_path("a.b.c", json!("x"));
        assert_eq!(c.get("a.b.c"), Some(&json!("x")));
        assert_eq!(c.remove("a"), Some(json!({"b": {"c": "x"}})));
    }

    #[test]
    fn expanded_nests_dotted_keys() {
        let c = ctx(json!({"user.name": "Ada", "user": {"id": 7}, "plain": 1}));
        let expanded = c.expanded();
        assert_eq!(
            expanded.as_map().get("user"),
            Some(&json!({"id": 7, "name": "Ada"}))
        );
        assert!(matches!(ctx(json!({"a": 1})).expanded(), Cow::Borrowed(_)));
    }
}
