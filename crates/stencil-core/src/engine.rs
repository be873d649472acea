//! `Engine` facade owning the config and the instance-local registries.

use crate::adapters::{AdapterOutput, AdapterRegistry};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::document;
use crate::error::Result;
use crate::expression;
use crate::loops::{self, LoopIter};
use crate::operations::{Operation, OperationRegistry, Plugin};
use crate::pipeline::Pipeline;
use crate::template::{self, CompileOptions};
use serde_json::Value;

/// Engine-scoped surface for rendering documents and running operations.
///
/// Operation and adapter registration is instance-local (no global
/// registry), so separate hosts can carry different plugin sets side by side.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    operations: OperationRegistry,
    adapters: AdapterRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Create an engine with the default config and builtin operations.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let operations = if config.builtins {
            OperationRegistry::with_builtins()
        } else {
            OperationRegistry::new()
        };
        Self {
            config,
            operations,
            adapters: AdapterRegistry::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compile_options(&self) -> CompileOptions {
        self.config.compile_options()
    }

    /// Compile placeholders only; condition and loop keys are left as is.
    pub fn compile(&self, template: &Value, ctx: &Context) -> Value {
        template::compile(template, ctx, &self.compile_options())
    }

    /// Resolve a whole document: conditions, loops and placeholders.
    pub fn render(&self, document: &Value, ctx: &Context) -> Result<Value> {
        document::resolve(document, ctx, &self.compile_options())
    }

    /// Evaluate an `if ...` expression.
    pub fn evaluate_condition(&self, expr: &str, ctx: &Context) -> Result<bool> {
        expression::evaluate(expr, ctx)
    }

    /// Lazily expand a single-key loop declaration.
    pub fn loop_items<'a>(&self, declaration: &'a Value, ctx: &'a Context) -> Result<LoopIter<'a>> {
        loops::evaluate(declaration, ctx, self.compile_options())
    }

    /// Run an operations schema. `Ok(None)` means the run was aborted.
    pub async fn handle_operations(
        &self,
        schema: &Value,
        ctx: &mut Context,
        previous: Value,
    ) -> Result<Option<Value>> {
        Pipeline::new(&self.operations)
            .with_options(self.compile_options())
            .handle_operations(schema, ctx, previous)
            .await
    }

    /// Register a host operation. `Ok(false)` when it was already present.
    pub fn register(&mut self, name: &str, operation: impl Operation + 'static) -> Result<bool> {
        self.operations.register(name, operation)
    }

    pub fn install(&mut self, plugin: &dyn Plugin) -> Result<()> {
        self.operations.install(plugin)
    }

    pub fn add_adapter<F>(&mut self, name: impl Into<String>, adapter: F) -> Result<()>
    where
        F: Fn(Value, Context) -> AdapterOutput + Send + Sync + 'static,
    {
        self.adapters.add_adapter(name, adapter)
    }

    pub fn adapt(&self, name: &str, data: Value, ctx: Context) -> Result<AdapterOutput> {
        self.adapters.invoke(name, data, ctx)
    }

    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }
}
