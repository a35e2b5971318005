//! Fuzz smoke tests for the tokenizer passes and the resolver.
//!
//! Random and adversarial inputs go through the default grammar; every
//! result must be well formed, respect the nesting and occurrence limits,
//! and serialize back to the exact input.
//!
//! A small deterministic PRNG keeps runs reproducible.

mod common;

use common::{DEFAULT, assert_well_formed};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tagweave_core::{ParseResult, TagId, codes, unparse};

// ─── Simple deterministic PRNG (LCG) ────────────────────────────────────────

struct SimpleRng(u64);

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 16
    }

    fn gen_range(&mut self, max: usize) -> usize {
        (self.next() as usize) % max
    }
}

const FRAGMENTS: &[&str] = &[
    "[b]", "[/b]", "[i]", "[/i]", "[u]", "[/u]", "[s]", "[/s]", "[b:1]", "[/b:1]",
    "[list]", "[list=1]", "[/list]", "[*]", "[li]", "[/li]", "[quote]", "[quote=\"x\"]",
    "[/quote]", "[code]", "[/code]", "[url=http://a.example/]", "[url]", "[/url]",
    "[img]", "[/img]", "[size=99]", "[/size]", "[color=red]", "[color=#zz]", "[/color]",
    "[e]", ":)", ":-(", "[", "]", "/", "=", "\"", "'", "\\", " ", "\n", "\t", "x", "é",
    "✓", "[b ", "[b foo=\"", "[/", "[*:", "&", "<", ">",
];

// ─── Invariant checking ─────────────────────────────────────────────────────

/// Limits and round trip on top of [`assert_well_formed`].
fn assert_invariants(result: &ParseResult, text: &str) {
    assert_well_formed(result, text);

    let grammar = DEFAULT.grammar();
    let mut open: HashMap<TagId, u32> = HashMap::new();
    let mut total: HashMap<TagId, u32> = HashMap::new();
    for tag in &result.tags {
        let def = grammar.tag(tag.id);
        if tag.kind.is_start() {
            *total.entry(tag.id).or_default() += 1;
            assert!(total[&tag.id] <= def.tag_limit, "{} over its tag limit", def.name);
        }
        if tag.kind.is_self_closing() {
            continue;
        }
        let count = open.entry(tag.id).or_default();
        if tag.kind.is_start() {
            *count += 1;
            assert!(*count <= def.nesting_limit, "{} over its nesting limit", def.name);
        } else {
            *count -= 1;
        }
    }

    for entry in &result.log {
        assert!(entry.pos <= text.len(), "log position past the end of {text:?}");
    }

    let xml = result.to_xml(text);
    assert_eq!(unparse(&xml), text, "round trip failed: {xml}");
}

fn check(text: &str) {
    let result = DEFAULT.parse(text);
    assert_invariants(&result, text);
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn random_fragment_soup() {
    let mut rng = SimpleRng::new(0x7A6);
    for _ in 0..500 {
        let len = rng.gen_range(40);
        let text: String = (0..len)
            .map(|_| FRAGMENTS[rng.gen_range(FRAGMENTS.len())])
            .collect();
        check(&text);
    }
}

#[test]
fn random_ascii_noise() {
    let mut rng = SimpleRng::new(42);
    for _ in 0..300 {
        let len = rng.gen_range(64);
        let text: String = (0..len)
            .map(|_| char::from(b" []/=\"'\\:*bBiIlLsStu1\n"[rng.gen_range(23)]))
            .collect();
        check(&text);
    }
}

#[test]
fn deep_nesting_respects_limit() {
    let text = "[quote]".repeat(50) + "x" + &"[/quote]".repeat(50);
    let result = DEFAULT.parse(&text);
    assert_invariants(&result, &text);
    let quotes = result.tags.iter().filter(|t| t.name == "QUOTE").count();
    assert_eq!(quotes, 6);
}

#[test]
fn pass_limit_bounds_candidates() {
    let text = "[b][/b]".repeat(5100);
    let result = DEFAULT.parse(&text);
    assert_invariants(&result, &text);
    assert_eq!(result.tags.len(), 10_000);
    assert!(result.log.iter().any(|e| e.id == codes::PASS_LIMIT_EXCEEDED));
}

#[test]
fn unclosed_content_attribute_flood_is_linear() {
    let text = "[url]".repeat(100_000);
    let started = Instant::now();
    let result = DEFAULT.parse(&text);
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    assert_invariants(&result, &text);
    assert!(result.tags.iter().all(|t| !t.params.contains_key("url")));
}

#[test]
fn emoticon_flood_is_capped() {
    let text = ":) ".repeat(500);
    let result = DEFAULT.parse(&text);
    assert_invariants(&result, &text);
    assert_eq!(result.tags.len(), 100);
}

#[test]
fn edge_case_inputs() {
    for text in [
        "", "[", "]", "[/", "[b", "[b=", "[b=\"", "[/b", "[*]", "[/*]", "[list][*]",
        "[code]", "[code][/code][/code]", "[url=]", "[url][/url]", "[b:99999999999999999999]",
        "\u{0}[b]\u{0}[/b]", "[quote=\"\\\"]", "[b]\r\n[/b]",
    ] {
        check(text);
    }
}
