//! Error type shared by the whole crate. Each variant maps to a stable
//! `STENCIL_E_*` code.

use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the interpreter can surface to its caller.
///
/// Loop messages are part of the observable contract and are matched
/// verbatim by document authors.
/// Use [`Error::code`] for a stable machine-readable classification.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid expression '{expr}': {message}")]
    ExprSyntax { expr: String, message: String },

    #[error("invalid condition block: {0}")]
    ConditionBlock(String),

    #[error("Invalid for loop syntax")]
    LoopSyntax { key: String },

    #[error("loop declaration must be an object with exactly one loop key")]
    LoopDeclaration,

    #[error("Iterable '{path}' not found in context")]
    IterableNotFound { path: String },

    #[error("'{path}' is not an array")]
    NotAnArray { path: String },

    #[error("'{path}' is not an object")]
    NotAnObject { path: String },

    #[error("Times loop requires an integer value")]
    TimesValue,

    #[error("Range values must be integers")]
    RangeValue,

    #[error("loop key '{key}' cannot share an object with other keys")]
    LoopPlacement { key: String },

    #[error("condition branch inside an object must resolve to an object")]
    BranchPlacement,

    #[error("operation '{name}' is not registered")]
    OperationMissing { name: String },

    #[error("operation '{name}' is already registered by '{existing}' (attempted by '{source_name}')")]
    OperationDuplicate {
        name: String,
        existing: String,
        source_name: String,
    },

    #[error("operation '{operation}' failed: {message}")]
    OperationFailed {
        operation: String,
        message: String,
        data: Value,
    },

    #[error("adapter '{name}' is already registered")]
    AdapterDuplicate { name: String },

    #[error("adapter '{name}' is not registered")]
    AdapterMissing { name: String },

    #[error("invalid operations schema: {0}")]
    SchemaInvalid(String),

    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn expr(expr: &str, message: impl Into<String>) -> Self {
        Self::ExprSyntax {
            expr: expr.to_string(),
            message: message.into(),
        }
    }

    /// Stable error code, e.g. `STENCIL_E_LOOP_SYNTAX`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ExprSyntax { .. } => "STENCIL_E_EXPR_SYNTAX",
            Self::ConditionBlock(_) => "STENCIL_E_CONDITION_BLOCK",
            Self::LoopSyntax { .. } => "STENCIL_E_LOOP_SYNTAX",
            Self::LoopDeclaration => "STENCIL_E_LOOP_DECLARATION",
            Self::IterableNotFound { .. } => "STENCIL_E_LOOP_ITERABLE",
            Self::NotAnArray { .. } | Self::NotAnObject { .. } => "STENCIL_E_LOOP_TYPE",
            Self::TimesValue | Self::RangeValue => "STENCIL_E_LOOP_VALUE",
            Self::LoopPlacement { .. } | Self::BranchPlacement => "STENCIL_E_DOCUMENT_SHAPE",
            Self::OperationMissing { .. } => "STENCIL_E_OPERATION_MISSING",
            Self::OperationDuplicate { .. } => "STENCIL_E_OPERATION_DUPLICATE",
            Self::OperationFailed { .. } => "STENCIL_E_OPERATION_FAILED",
            Self::AdapterDuplicate { .. } => "STENCIL_E_ADAPTER_DUPLICATE",
            Self::AdapterMissing { .. } => "STENCIL_E_ADAPTER_MISSING",
            Self::SchemaInvalid(_) => "STENCIL_E_SCHEMA_INVALID",
            Self::ConfigRead { .. } | Self::ConfigParse(_) => "STENCIL_E_CONFIG",
        }
    }

    /// Grammar errors are raised while reading keys and expressions, before
    /// anything is evaluated.
    pub fn is_grammar(&self) -> bool {
        matches!(
            self,
            Self::ExprSyntax { .. }
                | Self::ConditionBlock(_)
                | Self::LoopSyntax { .. }
                | Self::LoopDeclaration
        )
    }
}
