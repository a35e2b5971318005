//! Shared test helpers for `tagweave_core` integration tests.

#![allow(unreachable_pub)]

use std::sync::{Arc, LazyLock};
use tagweave_core::{FilterRegistry, Grammar, ParseResult, Parser, Tag, TagType};

/// The workspace's default grammar.
pub const DEFAULT_GRAMMAR: &str = include_str!("../../../../grammars/bbcode.jsonc");

/// Parser over the default grammar, built once per test binary.
pub static DEFAULT: LazyLock<Parser> = LazyLock::new(|| parser(DEFAULT_GRAMMAR));

/// Compile `json` with no custom filters and wrap it in a parser.
pub fn parser(json: &str) -> Parser {
    let grammar = Grammar::from_jsonc(json, &FilterRegistry::new())
        .unwrap_or_else(|e| panic!("grammar failed to compile: {e}"));
    Parser::new(Arc::new(grammar)).unwrap_or_else(|e| panic!("parser failed to build: {e}"))
}

/// Parse with the default grammar and return the XML form.
#[allow(dead_code)]
pub fn xml(text: &str) -> String {
    DEFAULT.parse(text).to_xml(text)
}

// ─── Result helpers ──────────────────────────────────────────────────────────

/// Log codes in the order they were recorded.
#[allow(dead_code)]
pub fn log_codes(result: &ParseResult) -> Vec<String> {
    result.log.iter().map(|e| e.id.to_string()).collect()
}

/// `(name, kind)` of every accepted tag.
#[allow(dead_code)]
pub fn shape(result: &ParseResult) -> Vec<(String, TagType)> {
    result
        .tags
        .iter()
        .map(|t| (t.name.clone(), t.kind))
        .collect()
}

/// Assert the structural guarantees every parse result must satisfy:
/// ascending non-overlapping spans inside the text, and start/end tags
/// forming a balanced tree.
#[allow(dead_code)]
pub fn assert_well_formed(result: &ParseResult, text: &str) {
    let mut cursor = 0;
    let mut open: Vec<&Tag> = Vec::new();
    for tag in &result.tags {
        assert!(
            tag.pos >= cursor,
            "tag {} at {} overlaps previous tag ending at {cursor} in {text:?}",
            tag.name,
            tag.pos
        );
        assert!(tag.end() <= text.len(), "tag {} past end of {text:?}", tag.name);
        cursor = tag.end();
        if tag.kind.is_self_closing() {
            continue;
        }
        if tag.kind.is_start() {
            open.push(tag);
        } else {
            let start = open
                .pop()
                .unwrap_or_else(|| panic!("end tag {} without start in {text:?}", tag.name));
            assert_eq!(start.id, tag.id, "mismatched end tag in {text:?}");
            assert_eq!(start.suffix, tag.suffix, "mismatched suffix in {text:?}");
        }
    }
    assert!(open.is_empty(), "unclosed tags in {text:?}");
}
