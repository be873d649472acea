//! Stencil core crate.
//!
//! Interprets declarative documents already materialised as JSON values.
//! The crate is layered bottom-up:
//!
//! - `value` + `context`: truthiness, coercion and the path-addressed
//!   variable environment every other layer reads.
//! - `expression`: `if ...` strings parsed into an AST and evaluated.
//! - `classifier`: routes document keys to the condition or loop grammar.
//! - `template` + `loops` + `condition`: placeholder compilation, lazy loop
//!   expansion and `if`/`else if`/`else` selection.
//! - `document`: applies all of the above to a whole document tree.
//! - `operations` + `pipeline`: registered async actions and the sequential
//!   schema runner with branching, `on_error` and abort.
//! - `adapters`: named payload normalisers.
//! - `engine`: instance-scoped facade owning config and registries.
//!
//! Grammar errors surface as soon as a key or expression is read; aborting
//! a pipeline is a result (`Ok(None)`), never an error.

pub mod adapters;
pub mod classifier;
pub mod condition;
pub mod config;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod expression;
pub mod loops;
pub mod operations;
pub mod pipeline;
pub mod template;
pub mod value;

pub use adapters::{Adapter, AdapterOutput, AdapterRegistry, ValidationErrors};
pub use classifier::{KeyKind, LoopDeclaration, LoopKind, classify};
pub use condition::ConditionBlock;
pub use config::EngineConfig;
pub use context::Context;
pub use engine::Engine;
pub use error::{Error, Result};
pub use expression::Expr;
pub use loops::{LoopItem, LoopIter};
pub use operations::{
    Operation, OperationError, OperationRegistry, OperationResult, Plugin, PluginRegistrar,
    operation_fn,
};
pub use pipeline::{Flow, Pipeline};
pub use template::{CompileOptions, compile, has_placeholders};
pub use value::truthy;
