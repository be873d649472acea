//! Engine configuration loaded from JSON.

use crate::error::{Error, Result};
use crate::template::CompileOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine settings, usually read from a `stencil.json` file.
///
/// ```json
/// { "keepPlaceholders": false, "builtins": true }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Leave unresolved `${path}` placeholders in compiled output.
    pub keep_placeholders: bool,
    /// Preload `context.*` and `flow.*` operations.
    pub builtins: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            keep_placeholders: true,
            builtins: true,
        }
    }
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            keep_placeholders: self.keep_placeholders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{"keepPlaceholders": false}"#).expect("parse");
        assert!(!config.keep_placeholders);
        assert!(config.builtins);
        assert_eq!(EngineConfig::from_json_str("{}").expect("parse"), EngineConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{"builtins": false}}"#).expect("write");
        let config = EngineConfig::from_path(file.path()).expect("load");
        assert!(!config.builtins);
        assert!(config.compile_options().keep_placeholders);
    }

    #[test]
    fn errors_are_classified() {
        let err = EngineConfig::from_path(Path::new("/nonexistent/stencil.json")).expect_err("io");
        assert_eq!(err.code(), "STENCIL_E_CONFIG");
        assert!(err.to_string().contains("/nonexistent/stencil.json"));
        let err = EngineConfig::from_json_str("{not json").expect_err("parse");
        assert_eq!(err.code(), "STENCIL_E_CONFIG");
    }
}
