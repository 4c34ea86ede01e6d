//! # capscript-cli
//!
//! Command-line host for capscript snippets.
//!
//! Reads a JavaScript snippet, executes its `handle` entry point against the
//! demo capability surface, and prints the settled result as JSON.
//!
//! ## Snippet Contract
//!
//! ```javascript
//! async function handle(api) {
//!     const folder = await api.openFolder();
//!     log("picked", folder);
//!     return folder;
//! }
//! ```
//!
//! ## Running
//!
//! ```bash
//! # Run a snippet
//! cargo run --bin capscript -- snippet.js
//!
//! # With a custom entry point and debug logging
//! RUST_LOG=debug cargo run --bin capscript -- --entry main snippet.js
//! ```

use anyhow::{bail, Context, Result};
use capscript_core::ScriptValue;
use capscript_engine::{ScriptEngine, ENTRY_POINT};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod host;

use host::SnippetHost;

struct CliArgs {
    snippet: std::path::PathBuf,
    entry: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut snippet = None;
    let mut entry = ENTRY_POINT.to_string();

    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--entry" => {
                entry = args
                    .next()
                    .context("--entry requires a function name")?;
            }
            "--help" | "-h" => {
                bail!("usage: capscript [--entry <function>] <snippet.js>");
            }
            _ if arg.starts_with('-') => bail!("unknown option: {arg}"),
            _ => {
                if snippet.is_some() {
                    bail!("only one snippet file may be given");
                }
                snippet = Some(std::path::PathBuf::from(arg));
            }
        }
    }

    Ok(CliArgs {
        snippet: snippet.context("usage: capscript [--entry <function>] <snippet.js>")?,
        entry,
    })
}

async fn run(args: CliArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.snippet)
        .with_context(|| format!("failed to read snippet {}", args.snippet.display()))?;

    let host = SnippetHost::new();
    let engine = ScriptEngine::new();

    let result: ScriptValue = engine
        .execute_entry(&source, &args.entry, &host)
        .await
        .with_context(|| format!("snippet {} failed", args.snippet.display()))?;

    if let Some(color) = host.editor_color() {
        info!(color = %color, "editor color after run");
    }

    println!("{}", serde_json::Value::from(result));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!(
        snippet = %args.snippet.display(),
        entry = %args.entry,
        "executing snippet"
    );
    run(args).await
}
