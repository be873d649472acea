//! `${path}` placeholder compiler.

use crate::context::Context;
use crate::value::{coerce_scalar, display_text};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^{}]+)\}").expect("placeholder pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Leave `${path}` untouched when `path` is unknown. When false the
    /// placeholder is replaced by an empty string.
    pub keep_placeholders: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            keep_placeholders: true,
        }
    }
}

/// True if any string inside `template` contains a `${...}` placeholder.
pub fn has_placeholders(template: &Value) -> bool {
    match template {
        Value::String(s) => PLACEHOLDER.is_match(s),
        Value::Array(items) => items.iter().any(has_placeholders),
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| PLACEHOLDER.is_match(k) || has_placeholders(v)),
        _ => false,
    }
}

/// Compile a template against `ctx`, producing a new value.
pub fn compile(template: &Value, ctx: &Context, options: &CompileOptions) -> Value {
    match template {
        Value::String(s) => compile_str(s, ctx, options),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| compile(item, ctx, options))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = if PLACEHOLDER.is_match(key) {
                    display_text(&interpolate(key, ctx, options))
                } else {
                    key.clone()
                };
                out.insert(key, compile(value, ctx, options));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Compile a single string.
///
/// Without placeholders, a whitespace-free string is a bare path (its value
/// when known, the string itself otherwise) and anything else is a literal
/// scalar.
pub fn compile_str(text: &str, ctx: &Context, options: &CompileOptions) -> Value {
    if !PLACEHOLDER.is_match(text) {
        if text.chars().any(char::is_whitespace) {
            return coerce_scalar(text);
        }
        return ctx
            .get(text)
            .cloned()
            .unwrap_or_else(|| Value::String(text.to_string()));
    }
    interpolate(text, ctx, options)
}

fn interpolate(text: &str, ctx: &Context, options: &CompileOptions) -> Value {
    let scope = ctx.expanded();

    // A lone placeholder keeps the resolved value's type.
    if let Some(caps) = PLACEHOLDER.captures(text)
        && caps.get(0).is_some_and(|m| m.len() == text.len())
    {
        let path = caps.get(1).map_or("", |m| m.as_str().trim());
        return match scope.get(path) {
            Some(Value::Null) if !options.keep_placeholders => Value::String(String::new()),
            Some(v) => v.clone(),
            None if options.keep_placeholders => Value::String(text.to_string()),
            None => Value::String(String::new()),
        };
    }

    let out = PLACEHOLDER.replace_all(text, |caps: &regex::Captures| {
        let path = caps.get(1).map_or("", |m| m.as_str().trim());
        match scope.get(path) {
            Some(v) => display_text(v),
            None if options.keep_placeholders => caps[0].to_string(),
            None => String::new(),
        }
    });
    coerce_scalar(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        Context::from_value(value)
    }

    fn opts() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn interpolates_nested_paths() {
        let c = ctx(json!({"c": {"name": "John Doe", "id": "123", "t": {"amount": 100}}}));
        let out = compile(&json!("${c.name} - ${c.id} / $${c.t.amount}"), &c, &opts());
        assert_eq!(out, json!("John Doe - 123 / $100"));
    }

    #[test]
    fn lone_placeholder_keeps_type() {
        let c = ctx(json!({"user": {"tags": ["a"], "age": 30, "id": "7", "gone": null}}));
        assert_eq!(compile(&json!("${user.tags}"), &c, &opts()), json!(["a"]));
        assert_eq!(compile(&json!("${user.age}"), &c, &opts()), json!(30));
        assert_eq!(compile(&json!("${user.id}"), &c, &opts()), json!("7"));
        assert_eq!(compile(&json!("${user.gone}"), &c, &opts()), Value::Null);
    }

    #[test]
    fn null_values_follow_placeholder_mode() {
        let c = ctx(json!({"n": null}));
        let drop = CompileOptions {
            keep_placeholders: false,
        };
        assert_eq!(compile(&json!("${n}"), &c, &opts()), Value::Null);
        assert_eq!(compile(&json!("${n}"), &c, &drop), json!(""));
        assert_eq!(compile(&json!("a${n}b"), &c, &opts()), json!("ab"));
        assert_eq!(compile(&json!("a${n}b"), &c, &drop), json!("ab"));
    }

    #[test]
    fn unknown_placeholders_follow_options() {
        let c = ctx(json!({"a": 1}));
        assert_eq!(compile(&json!("${missing}"), &c, &opts()), json!("${missing}"));
        assert_eq!(
            compile(&json!("x ${missing} y"), &c, &opts()),
            json!("x ${missing} y")
        );
        let drop = CompileOptions {
            keep_placeholders: false,
        };
        assert_eq!(compile(&json!("${missing}"), &c, &drop), json!(""));
        assert_eq!(compile(&json!("x${missing}y"), &c, &drop), json!("xy"));
    }

    #[test]
    fn composed_results_are_coerced() {
        let c = ctx(json!({"n": 4, "flag": true}));
        assert_eq!(compile(&json!("${n}0"), &c, &opts()), json!(40));
        assert_eq!(compile(&json!(" ${flag}"), &c, &opts()), json!(true));
        assert_eq!(compile(&json!("${n} items"), &c, &opts()), json!("4 items"));
    }

    #[test]
    fn bare_strings_resolve_as_paths() {
        let c = ctx(json!({"title": "Home", "items": [1, 2]}));
        assert_eq!(compile(&json!("title"), &c, &opts()), json!("Home"));
        assert_eq!(compile(&json!("items"), &c, &opts()), json!([1, 2]));
        assert_eq!(compile(&json!("unknown"), &c, &opts()), json!("unknown"));
        assert_eq!(compile(&json!("42"), &c, &opts()), json!("42"));
    }

    #[test]
    fn whitespace_strings_are_literal_scalars() {
        let c = ctx(json!({"title": "Home"}));
        assert_eq!(compile(&json!("the title"), &c, &opts()), json!("the title"));
        assert_eq!(compile(&json!(" 12 "), &c, &opts()), json!(12));
        assert_eq!(compile(&json!(" false"), &c, &opts()), json!(false));
    }

    #[test]
    fn dotted_context_keys_expand() {
        let c = ctx(json!({"user.name": "Ada", "user": {"id": 1}}));
        assert_eq!(
            compile(&json!("${user.name}#${user.id}"), &c, &opts()),
            json!("Ada#1")
        );
    }

    #[test]
    fn bracket_indirection() {
        let c = ctx(json!({"lang": "fr", "labels": {"fr": "Bonjour", "en": "Hello"}}));
        assert_eq!(compile(&json!("${labels[lang]}!"), &c, &opts()), json!("Bonjour!"));
    }

    #[test]
    fn objects_and_arrays_compile_recursively_without_mutation() {
        let c = ctx(json!({"name": "Ada", "id": 3}));
        let template = json!({
            "title": "Hi ${name}",
            "row-${id}": ["${id}", 5, null],
            "nested": {"ok": true}
        });
        let before = template.clone();
        let out = compile(&template, &c, &opts());
        assert_eq!(
            out,
            json!({"title": "Hi Ada", "row-3": [3, 5, null], "nested": {"ok": true}})
        );
        assert_eq!(template, before);
    }

    #[test]
    fn placeholder_detection() {
        assert!(has_placeholders(&json!({"a": ["x ${y}"]})));
        assert!(has_placeholders(&json!({"${k}": 1})));
        assert!(!has_placeholders(&json!({"a": ["$y", "{z}", 3]})));
    }
}
