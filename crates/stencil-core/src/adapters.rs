//! Named payload transforms, mostly used to normalise validation errors
//! coming back from services into one shape before they reach a document.

use crate::context::Context;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOutput {
    pub data: Value,
    pub context: Context,
}

pub type Adapter = Arc<dyn Fn(Value, Context) -> AdapterOutput + Send + Sync>;

#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Adapter>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under `name`. Names are unique: a second
    /// registration fails with `STENCIL_E_ADAPTER_DUPLICATE`.
    pub fn add_adapter<F>(&mut self, name: impl Into<String>, adapter: F) -> Result<()>
    where
        F: Fn(Value, Context) -> AdapterOutput + Send + Sync + 'static,
    {
        let name = name.into();
        if self.adapters.contains_key(&name) {
            return Err(Error::AdapterDuplicate { name });
        }
        tracing::debug!(adapter = %name, "adapter registered");
        self.adapters.insert(name, Arc::new(adapter));
        Ok(())
    }

    pub fn invoke(&self, name: &str, data: Value, ctx: Context) -> Result<AdapterOutput> {
        let adapter = self.adapters.get(name).ok_or_else(|| Error::AdapterMissing {
            name: name.to_string(),
        })?;
        Ok(adapter(data, ctx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Canonical validation error shape: field name to its messages, ordered by
/// field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `{field: "msg"}` and `{field: ["msg", ...]}` entries. Other
    /// message values are rendered as text; non-object input yields nothing.
    pub fn from_value(value: &Value) -> Self {
        let mut errors = Self::new();
        let Some(map) = value.as_object() else {
            return errors;
        };
        for (field, messages) in map {
            match messages {
                Value::Array(items) => {
                    for item in items {
                        errors.insert(field.clone(), message_text(item));
                    }
                }
                Value::Null => {}
                other => errors.insert(field.clone(), message_text(other)),
            }
        }
        errors
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
