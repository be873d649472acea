//! Instance-local operation registry.
//!
//! Operations are named `<plugin>.<operation>`; every `.`-separated segment
//! is folded to snake_case on the way in and on lookup, so `user.fetchUser`,
//! `user.fetch-user` and `user.fetch_user` address the same entry.
//!
//! Every entry remembers the source that registered it. Re-registering a
//! name from the same source is a warning and a no-op, which keeps plugin
//! installation idempotent. A different source claiming a taken name is
//! rejected with `STENCIL_E_OPERATION_DUPLICATE`.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::display_text;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Source name used for operations registered directly by the host.
pub const HOST_SOURCE: &str = "host";
/// Source name of the builtin operations.
pub const BUILTIN_SOURCE: &str = "stencil";

/// Failure raised by an operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OperationError {
    /// Stop the whole pipeline quietly. Absorbed at the outermost
    /// `handle_operations` call, which then yields no result.
    #[error("pipeline aborted")]
    Abort,

    /// Domain failure. Routed to the step's `on_error` schema when present.
    #[error("{message}")]
    Failed { message: String, data: Value },
}

impl OperationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Failed {
            message: message.into(),
            data,
        }
    }

    /// Payload handed to an `on_error` schema as its previous result.
    pub fn payload(&self) -> Value {
        match self {
            Self::Abort => Value::Null,
            Self::Failed { message, data } => json!({"message": message, "data": data}),
        }
    }
}

pub type OperationResult = std::result::Result<Value, OperationError>;

/// A registered, possibly suspending, action.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn call(&self, args: Value, ctx: &mut Context, previous: Value) -> OperationResult;
}

/// Synchronous closure adapted to [`Operation`]. Build with [`operation_fn`].
pub struct FnOperation<F>(F);

#[async_trait]
impl<F> Operation for FnOperation<F>
where
    F: Fn(Value, &mut Context, Value) -> OperationResult + Send + Sync,
{
    async fn call(&self, args: Value, ctx: &mut Context, previous: Value) -> OperationResult {
        (self.0)(args, ctx, previous)
    }
}

pub fn operation_fn<F>(f: F) -> FnOperation<F>
where
    F: Fn(Value, &mut Context, Value) -> OperationResult + Send + Sync,
{
    FnOperation(f)
}

/// A bundle of operations installed under one namespace.
pub trait Plugin {
    /// Namespace prefix and registration source.
    fn name(&self) -> &str;

    fn install(&self, registrar: &mut PluginRegistrar<'_>) -> Result<()>;
}

/// Registration handle given to [`Plugin::install`]; prefixes every name
/// with the plugin namespace.
pub struct PluginRegistrar<'r> {
    registry: &'r mut OperationRegistry,
    plugin: String,
}

impl PluginRegistrar<'_> {
    pub fn register(&mut self, name: &str, operation: impl Operation + 'static) -> Result<bool> {
        let full = format!("{}.{}", self.plugin, name);
        self.registry.register_in(&self.plugin, &full, operation)
    }
}

struct Entry {
    source: String,
    operation: Arc<dyn Operation>,
}

#[derive(Default)]
pub struct OperationRegistry {
    entries: HashMap<String, Entry>,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl OperationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `context.set`, `context.remove`,
    /// `flow.abort` and `flow.log`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.install_builtins();
        registry
    }

    pub(crate) fn install_builtins(&mut self) {
        let builtins: [(&str, Arc<dyn Operation>); 4] = [
            ("context.set", Arc::new(operation_fn(op_context_set))),
            ("context.remove", Arc::new(operation_fn(op_context_remove))),
            ("flow.abort", Arc::new(operation_fn(op_flow_abort))),
            ("flow.log", Arc::new(operation_fn(op_flow_log))),
        ];
        for (name, operation) in builtins {
            self.entries.insert(
                canonical_name(name),
                Entry {
                    source: BUILTIN_SOURCE.to_string(),
                    operation,
                },
            );
        }
    }

    /// Register on behalf of the host. Returns `Ok(false)` when the host had
    /// already registered the name.
    pub fn register(&mut self, name: &str, operation: impl Operation + 'static) -> Result<bool> {
        self.register_in(HOST_SOURCE, name, operation)
    }

    pub fn register_in(
        &mut self,
        source: &str,
        name: &str,
        operation: impl Operation + 'static,
    ) -> Result<bool> {
        let canonical = canonical_name(name);
        if let Some(existing) = self.entries.get(&canonical) {
            if existing.source == source {
                tracing::warn!(
                    operation = %canonical,
                    source,
                    "operation already registered by this source, skipping"
                );
                return Ok(false);
            }
            return Err(Error::OperationDuplicate {
                name: canonical,
                existing: existing.source.clone(),
                source_name: source.to_string(),
            });
        }
        tracing::debug!(operation = %canonical, source, "operation registered");
        self.entries.insert(
            canonical,
            Entry {
                source: source.to_string(),
                operation: Arc::new(operation),
            },
        );
        Ok(true)
    }

    pub fn install(&mut self, plugin: &dyn Plugin) -> Result<()> {
        let mut registrar = PluginRegistrar {
            plugin: canonical_name(plugin.name()),
            registry: self,
        };
        plugin.install(&mut registrar)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operation>> {
        self.entries
            .get(&canonical_name(name))
            .map(|entry| Arc::clone(&entry.operation))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&canonical_name(name))
    }

    /// Source that registered `name`, if any.
    pub fn source_of(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&canonical_name(name))
            .map(|entry| entry.source.as_str())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold each `.`-separated segment to snake_case.
pub fn canonical_name(name: &str) -> String {
    name.trim()
        .split('.')
        .map(snake_case)
        .collect::<Vec<_>>()
        .join(".")
}

fn snake_case(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::with_capacity(segment.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn op_context_set(args: Value, ctx: &mut Context, previous: Value) -> OperationResult {
    let Value::Object(entries) = args else {
        return Err(OperationError::failed("context.set expects an object of values"));
    };
    for (path, value) in entries {
        ctx.set_path(&path, value);
    }
    Ok(previous)
}

// Keys of the args object name the entries to drop; values are ignored.
fn op_context_remove(args: Value, ctx: &mut Context, previous: Value) -> OperationResult {
    let Value::Object(entries) = args else {
        return Err(OperationError::failed(
            "context.remove expects an object keyed by entry name",
        ));
    };
    for key in entries.keys() {
        ctx.remove(key);
    }
    Ok(previous)
}

fn op_flow_abort(_args: Value, _ctx: &mut Context, _previous: Value) -> OperationResult {
    Err(OperationError::Abort)
}

fn op_flow_log(args: Value, _ctx: &mut Context, previous: Value) -> OperationResult {
    tracing::info!(target: "stencil::flow", text = %display_text(&args), "flow.log");
    Ok(previous)
}
