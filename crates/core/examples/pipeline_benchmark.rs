//! Lightweight parse/serialize benchmark harness for local baselines.
//!
//! Run from repository root:
//! `cargo run -p tagweave_core --example pipeline_benchmark --release`

use std::sync::Arc;
use std::time::Instant;

use tagweave_core::{FilterRegistry, Grammar, Parser, unparse};

const GRAMMAR: &str = include_str!("../../../grammars/bbcode.jsonc");

fn forum_post(paragraphs: usize) -> String {
    let mut text = String::new();
    for i in 0..paragraphs {
        text.push_str(&format!(
            "[quote=user{i}]\n[b]Re:[/b] see [url=https://example.com/{i}]this[/url] :)\n[/quote]\n"
        ));
        text.push_str("[list]\n[*] one [i]two[/i]\n[*] [color=#c00]three[/color]\n[/list]\n");
        text.push_str("[code]fn main() { let [b] = 1; }[/code] [size=12]small[/size]\n");
    }
    text
}

fn run_benchmark(label: &str, input: &str, parser: &Parser, iterations: usize) {
    let parse_start = Instant::now();
    for _ in 0..iterations {
        let _ = parser.parse(input);
    }
    let parse_elapsed = parse_start.elapsed();

    let result = parser.parse(input);

    let xml_start = Instant::now();
    for _ in 0..iterations {
        let _ = result.to_xml(input);
    }
    let xml_elapsed = xml_start.elapsed();

    let xml = result.to_xml(input);
    let unparse_start = Instant::now();
    for _ in 0..iterations {
        let _ = unparse(&xml);
    }
    let unparse_elapsed = unparse_start.elapsed();

    println!("Benchmark: {label}");
    println!("  input_bytes: {}", input.len());
    println!("  tags: {}, log: {}", result.tags.len(), result.log.len());
    for (name, elapsed) in [
        ("parse:  ", parse_elapsed),
        ("xml:    ", xml_elapsed),
        ("unparse:", unparse_elapsed),
    ] {
        println!(
            "  {name} total={:?}, per_iter={:.3} ms",
            elapsed,
            elapsed.as_secs_f64() * 1000.0 / iterations as f64
        );
    }
}

fn main() -> Result<(), String> {
    let grammar = Grammar::from_jsonc(GRAMMAR, &FilterRegistry::new())
        .map_err(|e| format!("failed to compile grammar: {e}"))?;
    let parser = Parser::new(Arc::new(grammar)).map_err(|e| e.to_string())?;
    let iterations = std::env::var("TAGWEAVE_BENCH_ITERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(500);

    for (label, paragraphs) in [("short_post", 1), ("long_thread", 200)] {
        run_benchmark(label, &forum_post(paragraphs), &parser, iterations);
    }

    Ok(())
}
