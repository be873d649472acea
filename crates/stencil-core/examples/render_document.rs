//! Render a document file against an optional context file.
//!
//! Usage: cargo run -p stencil-core --example render_document -- page.json [context.json]

use serde_json::Value;
use stencil_core::{Context, Engine};
use std::env;
use std::fs;
use std::process;

fn read_json(path: &str) -> Value {
    let src = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("read {path}: {e}");
        process::exit(1);
    });
    serde_json::from_str(&src).unwrap_or_else(|e| {
        eprintln!("parse {path}: {e}");
        process::exit(1);
    })
}

fn main() {
    let mut args = env::args().skip(1);
    let Some(doc_path) = args.next() else {
        eprintln!("Usage: render_document <page.json> [context.json]");
        process::exit(1);
    };
    let document = read_json(&doc_path);
    let ctx = args
        .next()
        .map(|path| Context::from_value(read_json(&path)))
        .unwrap_or_default();

    let engine = Engine::new();
    let out = engine.render(&document, &ctx).unwrap_or_else(|e| {
        eprintln!("render {doc_path}: {} - {e}", e.code());
        process::exit(1);
    });
    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("serialize: {e}"),
    }
}
