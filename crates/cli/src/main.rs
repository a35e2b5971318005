mod render;

use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser as _, Subcommand};
use tagweave_core::{FilterRegistry, Grammar, LogEntry, ParseResult, Parser, Severity, unparse};
use tagweave_diagnostics as diag;

use crate::render::{Format, print_summary, render_log_pretty};

// ── Embedded grammar ────────────────────────────────────────────────────

/// Default grammar baked into the binary at compile time.
#[cfg(has_embedded_grammar)]
const EMBEDDED_GRAMMAR: Option<&str> = Some(include_str!(concat!(env!("OUT_DIR"), "/bbcode.jsonc")));

#[cfg(not(has_embedded_grammar))]
const EMBEDDED_GRAMMAR: Option<&str> = None;

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(clap::Parser, Debug)]
#[command(
    name = "tagweave",
    version,
    about = "tagweave: turn BBCode-style markup into lossless tagged XML and back"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Hide log entries below this severity (debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    min_severity: Severity,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a markup file (or `-` for stdin) and print its XML form.
    Parse {
        file: String,
        /// Path to a grammar JSONC file. When omitted, uses the grammar
        /// embedded at compile time.
        #[arg(long)]
        grammar: Option<String>,
    },

    /// Parse a markup file and report its log; exit 1 on errors.
    #[command(alias = "lint")]
    Check {
        file: String,
        /// Path to a grammar JSONC file (see `parse --help`).
        #[arg(long)]
        grammar: Option<String>,
    },

    /// Restore the original text from a parsed XML document.
    Unparse { file: String },

    /// Explain a log code (e.g. TW3005).
    Explain { id: String },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    match cli.cmd {
        Cmd::Parse { file, grammar } => {
            cmd_parse(&file, grammar.as_deref(), cli.min_severity, format)?;
        }
        Cmd::Check { file, grammar } => {
            cmd_check(&file, grammar.as_deref(), cli.min_severity, format)?;
        }
        Cmd::Unparse { file } => cmd_unparse(&file)?,
        Cmd::Explain { id } => cmd_explain(&id, format)?,
    }

    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_parse(file: &str, grammar: Option<&str>, min: Severity, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let parser = load_parser(grammar)?;
    let res = parser.parse(&input);
    let log = visible(&res, min);
    let xml = res.to_xml(&input);

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "xml": xml,
                "tags": res.tags,
                "log": log,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // XML to stdout, log to stderr.
            println!("{xml}");
            render_log_pretty(&input, file, &log);
            print_summary(&log);
        }
    }

    Ok(())
}

fn cmd_check(file: &str, grammar: Option<&str>, min: Severity, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let parser = load_parser(grammar)?;
    let res = parser.parse(&input);
    let log = visible(&res, min);
    let ok = !res.has_errors();

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": ok,
                "log": log,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            render_log_pretty(&input, file, &log);
            print_summary(&log);
            if ok {
                eprintln!("check ok");
            }
        }
    }

    if !ok {
        process::exit(1);
    }
    Ok(())
}

fn cmd_unparse(file: &str) -> Result<()> {
    let xml = read_input(file)?;
    print!("{}", unparse(xml.trim_end_matches(['\n', '\r'])));
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "severity": diag::default_severity(id),
                "template": diag::template(id),
                "explanation": diag::explain(id),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // Explanation is the expected output, so it goes to stdout.
            use ariadne::Fmt;
            match diag::explain(id) {
                Some(text) => {
                    let severity = diag::default_severity(id).map_or("?", Severity::as_str);
                    println!("{} ({severity}): {text}", id.fg(ariadne::Color::Cyan));
                }
                None => println!("{id}: (no explanation available)"),
            }
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Read `path`, or all of stdin when `path` is `-`.
fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("failed to read stdin")?;
        return Ok(input);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))
}

/// Compile the grammar from `--grammar`, or the embedded default.
fn load_parser(path: Option<&str>) -> Result<Parser> {
    let json = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read grammar file '{path}'"))?,
        None => EMBEDDED_GRAMMAR
            .context("this build has no embedded grammar; use --grammar <PATH>")?
            .to_string(),
    };
    let grammar = Grammar::from_jsonc(&json, &FilterRegistry::new())
        .with_context(|| format!("invalid grammar '{}'", path.unwrap_or("<embedded>")))?;
    Parser::new(Arc::new(grammar)).context("grammar cannot be used from the command line")
}

/// Log entries at or above `min`, in recorded order.
fn visible(res: &ParseResult, min: Severity) -> Vec<&LogEntry> {
    res.log.iter().filter(|e| e.severity >= min).collect()
}
