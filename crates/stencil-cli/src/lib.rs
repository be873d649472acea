//! Command line front end: `render`, `check` and `run`.

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use stencil_core::{Context, Engine, EngineConfig};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_FILE: &str = "stencil.json";
/// Environment variable holding the log filter, e.g. `STENCIL_LOG=debug`.
pub const LOG_ENV: &str = "STENCIL_LOG";

/// Render stencil documents and run operation schemas from the shell.
#[derive(Debug, Parser)]
#[command(name = "stencil", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Engine config file (JSON). Defaults to ./stencil.json when present.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve conditions, loops and placeholders in a document.
    Render {
        /// Document file or inline JSON.
        document: String,
        /// Context object: file or inline JSON.
        #[arg(long, short)]
        context: Option<String>,
    },
    /// Evaluate an `if ...` expression and print true or false.
    Check {
        expression: String,
        #[arg(long, short)]
        context: Option<String>,
    },
    /// Run an operations schema with the builtin operations.
    Run {
        /// Schema file or inline JSON.
        schema: String,
        #[arg(long, short)]
        context: Option<String>,
        /// Initial previous result (JSON).
        #[arg(long)]
        previous: Option<String>,
    },
}

pub async fn run_from_env() -> Result<(), String> {
    init_tracing();
    let cli = Cli::parse();
    let output = execute(cli).await?;
    let pretty = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    println!("{pretty}");
    Ok(())
}

/// Install the stderr subscriber. Filter comes from `STENCIL_LOG`, default
/// `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one parsed command and return what would be printed.
pub async fn execute(cli: Cli) -> Result<Value, String> {
    let config = load_config(cli.config.as_deref(), Path::new("."))?;
    let engine = Engine::with_config(config);

    match cli.command {
        Command::Render { document, context } => {
            let document = load_json_arg(&document)?;
            let ctx = load_context(context.as_deref())?;
            engine.render(&document, &ctx).map_err(describe)
        }
        Command::Check {
            expression,
            context,
        } => {
            let ctx = load_context(context.as_deref())?;
            engine
                .evaluate_condition(&expression, &ctx)
                .map(Value::Bool)
                .map_err(describe)
        }
        Command::Run {
            schema,
            context,
            previous,
        } => {
            let schema = load_json_arg(&schema)?;
            let mut ctx = load_context(context.as_deref())?;
            let previous = match previous {
                Some(raw) => load_json_arg(&raw)?,
                None => Value::Null,
            };
            let result = engine
                .handle_operations(&schema, &mut ctx, previous)
                .await
                .map_err(describe)?;
            Ok(json!({
                "aborted": result.is_none(),
                "result": result.unwrap_or(Value::Null),
                "context": ctx.into_value(),
            }))
        }
    }
}

fn describe(err: stencil_core::Error) -> String {
    format!("{}: {err}", err.code())
}

/// Explicit path first, then `stencil.json` inside `dir`, then defaults.
fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<EngineConfig, String> {
    if let Some(path) = explicit {
        return EngineConfig::from_path(path).map_err(describe);
    }
    let fallback = dir.join(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        tracing::debug!(path = %fallback.display(), "loading config");
        return EngineConfig::from_path(&fallback).map_err(describe);
    }
    Ok(EngineConfig::default())
}

/// Accepts either a path to a JSON file or inline JSON text.
fn load_json_arg(input: &str) -> Result<Value, String> {
    let as_path = PathBuf::from(input);
    if as_path.is_file() {
        let content = fs::read_to_string(&as_path)
            .map_err(|e| format!("failed to read {}: {e}", as_path.display()))?;
        return serde_json::from_str(&content)
            .map_err(|e| format!("invalid JSON in {}: {e}", as_path.display()));
    }
    serde_json::from_str(input).map_err(|e| format!("invalid JSON argument: {e}"))
}

fn load_context(input: Option<&str>) -> Result<Context, String> {
    let Some(input) = input else {
        return Ok(Context::new());
    };
    match load_json_arg(input)? {
        Value::Object(vars) => Ok(Context::from_map(vars)),
        _ => Err("--context must be a JSON object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn parses_subcommands() {
        let cli = parse(&["stencil", "check", "if a", "--context", "{}"]);
        assert!(matches!(cli.command, Command::Check { ref expression, .. } if expression == "if a"));

        let cli = parse(&["stencil", "run", "[]", "--previous", "1", "--config", "x.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.json")));
        assert!(matches!(cli.command, Command::Run { previous: Some(_), .. }));

        assert!(Cli::try_parse_from(["stencil", "render"]).is_err());
    }

    #[tokio::test]
    async fn render_reads_document_file() {
        let mut doc = tempfile::NamedTempFile::new().expect("temp file");
        write!(doc, r#"{{"for n of 1..2": {{"text": "Number ${{n}}"}}}}"#).expect("write");
        let path = doc.path().to_string_lossy().to_string();
        let out = execute(parse(&["stencil", "render", &path])).await.expect("render");
        assert_eq!(out, json!([{"text": "Number 1"}, {"text": "Number 2"}]));
    }

    #[tokio::test]
    async fn check_uses_inline_context() {
        let out = execute(parse(&[
            "stencil",
            "check",
            "if role == 'admin' or owner",
            "--context",
            r#"{"role": "admin"}"#,
        ]))
        .await
        .expect("check");
        assert_eq!(out, json!(true));
    }

    #[tokio::test]
    async fn run_reports_context_and_abort() {
        let out = execute(parse(&[
            "stencil",
            "run",
            r#"[{"context.set": {"step": 1}}, "flow.abort", {"context.set": {"step": 2}}]"#,
        ]))
        .await
        .expect("run");
        assert_eq!(
            out,
            json!({"aborted": true, "result": null, "context": {"step": 1}})
        );
    }

    #[tokio::test]
    async fn errors_carry_codes() {
        let err = execute(parse(&["stencil", "run", r#"{"nav.go": "/"}"#]))
            .await
            .expect_err("missing operation");
        assert!(err.starts_with("STENCIL_E_OPERATION_MISSING"), "{err}");

        let err = execute(parse(&["stencil", "check", "a", "--context", "[1]"]))
            .await
            .expect_err("context must be an object");
        assert!(err.contains("JSON object"));
    }

    #[test]
    fn config_resolution_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(
            load_config(None, dir.path()).expect("defaults"),
            EngineConfig::default()
        );

        fs::write(dir.path().join(DEFAULT_CONFIG_FILE), r#"{"builtins": false}"#)
            .expect("write config");
        assert!(!load_config(None, dir.path()).expect("fallback").builtins);

        let explicit = dir.path().join("other.json");
        fs::write(&explicit, r#"{"keepPlaceholders": false}"#).expect("write config");
        let config = load_config(Some(&explicit), dir.path()).expect("explicit");
        assert!(config.builtins);
        assert!(!config.keep_placeholders);
    }
}
