//! Sequential operation pipeline.
//!
//! | schema | behaviour |
//! |---|---|
//! | `"ns.op"` | call the operation with `{}` args |
//! | `{ "ns.op": args, ... }` | call each entry in order, threading the result |
//! | `{ "if ..": schema, "else": schema }` | run the winning branch's schema |
//! | `[step, step, ...]` | run each object or string step in order |
//!
//! Every call receives the previous call's result. An object step may carry
//! an `on_error` schema: a failing call in that step runs it with
//! `{message, data}` as the previous result, then the pipeline aborts.
//! Aborting is not an error: the outermost call returns `None`.

use crate::classifier::is_condition_key;
use crate::condition::ConditionBlock;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::operations::{OperationError, OperationRegistry, OperationResult};
use crate::template::{CompileOptions, compile};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

const ON_ERROR: &str = "on_error";

/// Outcome of one stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue(Value),
    Aborted,
}

#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'r> {
    registry: &'r OperationRegistry,
    options: CompileOptions,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r OperationRegistry) -> Self {
        Self {
            registry,
            options: CompileOptions::default(),
        }
    }

    /// Options used when compiling step args.
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `schema` against `ctx`. `Ok(None)` means the pipeline was
    /// aborted; any other failure is returned unchanged.
    pub async fn handle_operations(
        &self,
        schema: &Value,
        ctx: &mut Context,
        previous: Value,
    ) -> Result<Option<Value>> {
        match self.run(schema, ctx, previous).await? {
            Flow::Continue(value) => Ok(Some(value)),
            Flow::Aborted => {
                tracing::debug!("pipeline aborted");
                Ok(None)
            }
        }
    }

    /// Run without absorbing the abort, for callers composing pipelines.
    pub fn run<'a>(
        &'a self,
        schema: &'a Value,
        ctx: &'a mut Context,
        previous: Value,
    ) -> BoxFuture<'a, Result<Flow>> {
        async move {
            match schema {
                Value::String(name) => {
                    match self.call(name, &Value::Object(Map::new()), ctx, previous).await? {
                        Ok(value) => Ok(Flow::Continue(value)),
                        Err(OperationError::Abort) => Ok(Flow::Aborted),
                        Err(err) => Err(failed(name, err)),
                    }
                }
                Value::Object(step) => self.run_step(step, ctx, previous).await,
                Value::Array(steps) => {
                    let mut previous = previous;
                    for (index, step) in steps.iter().enumerate() {
                        if !(step.is_object() || step.is_string()) {
                            return Err(Error::SchemaInvalid(format!(
                                "step {index} must be an object or an operation name, found {}",
                                kind(step)
                            )));
                        }
                        match self.run(step, ctx, previous).await? {
                            Flow::Continue(value) => previous = value,
                            Flow::Aborted => return Ok(Flow::Aborted),
                        }
                    }
                    Ok(Flow::Continue(previous))
                }
                other => Err(Error::SchemaInvalid(format!(
                    "expected an operation name, object or array, found {}",
                    kind(other)
                ))),
            }
        }
        .boxed()
    }

    async fn run_step(
        &self,
        step: &Map<String, Value>,
        ctx: &mut Context,
        previous: Value,
    ) -> Result<Flow> {
        if step.keys().any(|key| is_condition_key(key)) {
            let branch = ConditionBlock::from_map(step)?.select(ctx);
            return match branch {
                Some(schema) => self.run(schema, ctx, previous).await,
                None => Ok(Flow::Continue(previous)),
            };
        }

        let on_error = step.get(ON_ERROR);
        let mut previous = previous;
        for (name, args) in step.iter().filter(|(key, _)| key.as_str() != ON_ERROR) {
            match self.call(name, args, ctx, previous).await? {
                Ok(value) => previous = value,
                Err(OperationError::Abort) => {
                    tracing::debug!(operation = %name, "operation requested abort");
                    return Ok(Flow::Aborted);
                }
                Err(err) => {
                    let Some(handler) = on_error else {
                        return Err(failed(name, err));
                    };
                    tracing::warn!(operation = %name, error = %err, "operation failed, running on_error");
                    self.run(handler, ctx, err.payload()).await?;
                    return Ok(Flow::Aborted);
                }
            }
        }
        Ok(Flow::Continue(previous))
    }

    /// Compile `args` and call the named operation. The outer error is a
    /// lookup failure; the inner result is the operation's own.
    async fn call(
        &self,
        name: &str,
        args: &Value,
        ctx: &mut Context,
        previous: Value,
    ) -> Result<OperationResult> {
        let operation = self
            .registry
            .get(name)
            .ok_or_else(|| Error::OperationMissing {
                name: name.to_string(),
            })?;
        let args = compile(args, ctx, &self.options);
        tracing::debug!(operation = %name, "running operation");
        Ok(operation.call(args, ctx, previous).await)
    }
}

fn failed(name: &str, err: OperationError) -> Error {
    tracing::warn!(operation = %name, error = %err, "operation failed");
    match err {
        OperationError::Failed { message, data } => Error::OperationFailed {
            operation: name.to_string(),
            message,
            data,
        },
        OperationError::Abort => Error::OperationFailed {
            operation: name.to_string(),
            message: err.to_string(),
            data: Value::Null,
        },
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
