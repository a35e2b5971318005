//! Regexp passes, plugin passes and per-pass limits.

mod common;

use common::{log_codes, parser, shape};
use std::sync::Arc;
use tagweave_core::{
    Candidate, FilterRegistry, Grammar, PassSink, Parser, ParserError, Severity, TagPass,
    TagType, codes,
};

fn smilies(limit_action: &str) -> String {
    format!(
        r#"{{
            "tags": {{ "E": {{ "internal": true, "attributes": {{ "face": {{}} }} }} }},
            "passes": [{{
                "name": "smilies",
                "type": "regexp",
                "regexp": ":(?P<face>[()])",
                "tagName": "E",
                "attributes": {{ "face": "face" }},
                "limit": 2,
                "limitAction": "{limit_action}"
            }}]
        }}"#
    )
}

const PLUGGED: &str = r#"{
    "tags": { "B": {}, "M": { "attributes": { "user": {} } } },
    "passes": [
        { "name": "bbcodes", "type": "bracket", "bbcodes": { "b": {} } },
        { "name": "mentions", "type": "plugin" }
    ]
}"#;

/// `@name` → self-closing `M`; `@@` → a name the grammar does not know.
struct Mentions;

impl TagPass for Mentions {
    fn scan(&self, text: &str, _grammar: &Grammar, sink: &mut PassSink<'_>) {
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'@' {
                i += 1;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'@') {
                if !sink.push(Candidate::new("nobody", i, 2, TagType::SELF_CLOSING)) {
                    return;
                }
                i += 2;
                continue;
            }
            let end = (i + 1..=bytes.len())
                .find(|&j| j == bytes.len() || !bytes[j].is_ascii_alphanumeric())
                .unwrap_or(bytes.len());
            if end > i + 1 {
                let mut candidate = Candidate::new("m", i, end - i, TagType::SELF_CLOSING);
                candidate.set_param("user", &text[i + 1..end]);
                if !sink.push(candidate) {
                    return;
                }
            }
            i = end.max(i + 1);
        }
    }
}

/// Claims the first two bytes of a leading `[b]` as a `B` start tag.
struct Shadow;

impl TagPass for Shadow {
    fn scan(&self, text: &str, _grammar: &Grammar, sink: &mut PassSink<'_>) {
        if text.starts_with("[b]") {
            sink.push(Candidate::new("B", 0, 2, TagType::START));
        }
    }
}

/// Offers spans that fall outside the text or split a character, then one
/// valid span.
struct OffTheEnd;

impl TagPass for OffTheEnd {
    fn scan(&self, _text: &str, _grammar: &Grammar, sink: &mut PassSink<'_>) {
        for (pos, len) in [(10, 1), (4, 1), (usize::MAX, 2), (0, 1)] {
            if !sink.push(Candidate::new("M", pos, len, TagType::SELF_CLOSING)) {
                return;
            }
        }
    }
}

fn plugged(pass: impl TagPass + 'static) -> Parser {
    let grammar = Grammar::from_jsonc(PLUGGED, &FilterRegistry::new()).unwrap();
    Parser::builder(Arc::new(grammar))
        .plugin("mentions", pass)
        .build()
        .unwrap()
}

// ── Regexp passes ───────────────────────────────────────────────────────

#[test]
fn regexp_matches_become_self_closing_tags() {
    let p = parser(&smilies("warn"));
    let text = "a :) b :(";
    let r = p.parse(text);
    assert_eq!(
        r.to_xml(text),
        "<rt>a <E face=\")\">:)</E> b <E face=\"(\">:(</E></rt>"
    );
    assert!(r.log.is_empty());
}

// ── Limits ──────────────────────────────────────────────────────────────

#[test]
fn warn_limit_truncates_and_logs_once() {
    let p = parser(&smilies("warn"));
    let r = p.parse(":) :) :) :)");
    assert_eq!(r.tags.len(), 2);
    assert_eq!(log_codes(&r), vec![codes::PASS_LIMIT_EXCEEDED]);
    assert_eq!(r.log[0].params, vec!["smilies", "2"]);
    assert_eq!(r.log[0].pos, 6);
}

#[test]
fn ignore_limit_truncates_silently() {
    let p = parser(&smilies("ignore"));
    let r = p.parse(":) :) :)");
    assert_eq!(r.tags.len(), 2);
    assert!(r.log.is_empty());
}

#[test]
fn abort_limit_discards_the_whole_pass() {
    let p = parser(&smilies("abort"));
    let r = p.parse(":) :) :)");
    assert!(r.tags.is_empty());
    assert_eq!(log_codes(&r), vec![codes::PASS_ABORTED]);
    assert_eq!(r.log[0].severity, Severity::Error);

    let r = p.parse(":) :)");
    assert_eq!(r.tags.len(), 2);
}

// ── Plugins ─────────────────────────────────────────────────────────────

#[test]
fn plugin_candidates_are_resolved() {
    let p = plugged(Mentions);
    let text = "hi @ann, [b]@bob[/b]";
    let r = p.parse(text);
    assert_eq!(
        r.to_xml(text),
        "<rt>hi <M user=\"ann\">@ann</M>, <B><st>[b]</st><M user=\"bob\">@bob</M>\
         <et>[/b]</et></B></rt>"
    );
}

#[test]
fn plugin_unknown_names_are_logged() {
    let p = plugged(Mentions);
    let r = p.parse("x @@ y");
    assert!(r.tags.is_empty());
    assert_eq!(log_codes(&r), vec![codes::UNKNOWN_TAG]);
    assert_eq!(r.log[0].params, vec!["@@", "mentions"]);
}

#[test]
fn later_pass_wins_at_the_same_position() {
    let p = plugged(Shadow);
    let r = p.parse("[b]x[/b]");
    assert_eq!(
        shape(&r),
        vec![("B".to_string(), TagType::START), ("B".to_string(), TagType::END)]
    );
    assert_eq!(r.tags[0].len, 2);
    assert_eq!(log_codes(&r), vec![codes::OVERLAPPING_TAG]);
}

#[test]
fn plugin_spans_outside_the_text_are_dropped() {
    let grammar = Grammar::from_jsonc(
        r#"{
            "tags": { "M": { "rules": { "trimBefore": true } } },
            "passes": [{ "name": "edges", "type": "plugin" }]
        }"#,
        &FilterRegistry::new(),
    )
    .unwrap();
    let p = Parser::builder(Arc::new(grammar))
        .plugin("edges", OffTheEnd)
        .build()
        .unwrap();

    let text = "ab é";
    let r = p.parse(text);
    assert_eq!(r.to_xml(text), "<rt><M>a</M>b é</rt>");
    assert_eq!(log_codes(&r), vec![codes::INVALID_SPAN; 3]);
    assert_eq!(r.log[0].params, vec!["edges", "10", "1"]);
    assert_eq!(r.log[0].pos, text.len());
    assert_eq!(r.log[1].pos, 4);
    assert_eq!(r.log[0].severity, Severity::Warn);
}

#[test]
fn builder_requires_every_plugin() {
    let grammar = Arc::new(Grammar::from_jsonc(PLUGGED, &FilterRegistry::new()).unwrap());
    assert_eq!(
        Parser::new(Arc::clone(&grammar)).unwrap_err(),
        ParserError::MissingPlugin("mentions".into())
    );
    assert_eq!(
        Parser::builder(grammar)
            .plugin("mentions", Mentions)
            .plugin("other", Shadow)
            .build()
            .unwrap_err(),
        ParserError::UnknownPlugin("other".into())
    );
}

#[test]
fn parser_is_shareable_across_threads() {
    let p = Arc::new(plugged(Mentions));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let p = Arc::clone(&p);
            std::thread::spawn(move || {
                let text = format!("[b]@user{i}[/b]");
                p.parse(&text).tags.len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 3);
    }
}
