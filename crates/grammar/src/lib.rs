//! Declarative tag grammar for tagweave.
//!
//! A grammar is written as JSON or JSONC ([`GrammarSpec`]) and compiled once
//! into an immutable [`Grammar`]: tag table, case-insensitive alias table,
//! allowed-set bitsets, compiled pass regexps and filter chains. A compiled
//! grammar is `Send + Sync` and can serve any number of concurrent parses.
//!
//! ```
//! use tagweave_filters::FilterRegistry;
//! use tagweave_grammar::Grammar;
//!
//! let grammar = Grammar::from_jsonc(
//!     r#"{
//!         // bold only
//!         "tags": { "B": {} },
//!         "passes": [{ "name": "bbcodes", "type": "bracket", "bbcodes": { "b": {} } }]
//!     }"#,
//!     &FilterRegistry::new(),
//! )
//! .unwrap();
//! assert_eq!(grammar.tag_by_name("b").unwrap().name, "B");
//! ```

mod compile;
mod decl;
mod tagset;

pub use compile::{
    AttributeDef, Bbcode, BracketPass, Grammar, PassDef, PassKind, RegexpPass, TagDef, TrimRules,
};
pub use decl::{
    AttributeSpec, BbcodeSpec, BracketPassSpec, DEFAULT_NESTING_LIMIT, DEFAULT_PASS_LIMIT,
    DEFAULT_TAG_LIMIT, DefaultRule, GRAMMAR_FORMAT_VERSION, GrammarSpec, LimitAction,
    PassKindSpec, PassSpec, RegexpPassSpec, RootSpec, RuleSpec, TagFiltersSpec, TagSpec,
};
pub use tagset::{TagId, TagSet};

use tagweave_filters::FilterConfigError;
use tagweave_jsonc_strip::strip_jsonc;
use thiserror::Error;

/// Errors raised while loading or compiling a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// The file is not valid JSON for the grammar schema.
    #[error("invalid grammar JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Path of the offending field.
        field: String,
        /// Why it is invalid.
        reason: String,
    },

    /// A rule, alias or pass names a tag that does not exist.
    #[error("{context} references unknown tag '{name}'")]
    UnknownTag {
        /// Where the reference appears.
        context: String,
        /// The unresolved name.
        name: String,
    },

    /// Two tag names differ only by case.
    #[error("duplicate tag name '{0}' (tag names are case-insensitive)")]
    DuplicateTag(String),

    /// A name (alias or BBCode) would resolve to two different tags.
    #[error("name '{name}' maps to both '{first}' and '{second}'")]
    ConflictingAlias {
        /// The ambiguous name.
        name: String,
        /// Tag it already resolves to.
        first: String,
        /// Tag it was also bound to.
        second: String,
    },

    /// A tag lists more than one `requireParent` target.
    #[error("tag '{tag}' declares conflicting requireParent targets: {targets}")]
    ConflictingRequireParent {
        /// The tag.
        tag: String,
        /// The listed targets.
        targets: String,
    },

    /// A pass regexp does not compile.
    #[error("invalid regexp in {context}: {source}")]
    InvalidRegex {
        /// Which pass.
        context: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// An attribute or tag filter could not be compiled.
    #[error("{context}: {source}")]
    Filter {
        /// Which tag/attribute.
        context: String,
        /// Underlying error.
        #[source]
        source: FilterConfigError,
    },

    /// More tags than [`TagId`] can address.
    #[error("grammar declares {count} tags, more than the supported {max}")]
    TooManyTags {
        /// Declared count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// `schemaVersion` has an unsupported major version.
    #[error("unsupported grammar schemaVersion '{0}' (expected {GRAMMAR_FORMAT_VERSION})")]
    UnsupportedVersion(String),
}

/// Parse a JSON or JSONC grammar file without compiling it.
pub fn load_grammar_spec(source: &str) -> Result<GrammarSpec, GrammarError> {
    Ok(serde_json::from_str(&strip_jsonc(source))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagweave_filters::FilterRegistry;

    const LIST_GRAMMAR: &str = r#"{
        "schemaVersion": "1.0.0",
        "root": { "deny": ["LI"] },
        "aliases": { "BOLD": "B" },
        "tags": {
            "B": {},
            "URL": {
                "attributes": { "href": { "filter": "url" } },
                "rules": { "deny": ["URL"] }
            },
            "LIST": { "defaultRule": "deny", "rules": { "allow": ["LI"] } },
            "LI": {
                "nestingLimit": 3,
                "rules": { "closeParent": ["LI"], "requireParent": ["LIST"], "trimBefore": true }
            },
            "E": { "internal": true, "attributes": { "face": { "required": false } } }
        },
        "passes": [
            {
                "name": "bbcodes",
                "type": "bracket",
                "bbcodes": {
                    "b": {},
                    "url": { "defaultAttribute": "href", "contentAttributes": ["href"] },
                    "list": {},
                    "*": { "tagName": "LI" }
                }
            },
            { "name": "smilies", "type": "regexp", "regexp": ":(?P<face>[()])", "tagName": "E", "attributes": { "face": "face" }, "limit": 5, "limitAction": "abort" },
            { "name": "mentions", "type": "plugin" }
        ]
    }"#;

    fn compile(json: &str) -> Result<Grammar, GrammarError> {
        Grammar::from_jsonc(json, &FilterRegistry::new())
    }

    fn with_tags(tags: &str) -> String {
        format!(r#"{{ "tags": {tags} }}"#)
    }

    // ── Loading ─────────────────────────────────────────────────────────

    #[test]
    fn load_full_grammar() {
        let g = compile(LIST_GRAMMAR).unwrap();
        assert_eq!(g.tags().len(), 5);
        assert_eq!(g.passes().len(), 3);
        assert_eq!(g.plugin_passes().collect::<Vec<_>>(), vec!["mentions"]);
    }

    #[test]
    fn load_minimal_grammar() {
        let g = compile(&with_tags(r#"{ "B": {} }"#)).unwrap();
        let b = g.tag_by_name("B").unwrap();
        assert_eq!(b.nesting_limit, DEFAULT_NESTING_LIMIT);
        assert_eq!(b.tag_limit, DEFAULT_TAG_LIMIT);
        assert!(!b.restricts_descendants);
        assert!(g.passes().is_empty());
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(compile("{ tags: "), Err(GrammarError::InvalidJson(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(matches!(
            compile(&with_tags(r#"{ "B": { "nestinglimit": 2 } }"#)),
            Err(GrammarError::InvalidJson(_))
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let json = r#"{ "schemaVersion": "2.0.0", "tags": {} }"#;
        assert!(matches!(compile(json), Err(GrammarError::UnsupportedVersion(v)) if v == "2.0.0"));
    }

    // ── Name resolution ─────────────────────────────────────────────────

    #[test]
    fn resolution_is_case_insensitive_and_covers_aliases_and_bbcodes() {
        let g = compile(LIST_GRAMMAR).unwrap();
        let b = g.resolve("B").unwrap();
        assert_eq!(g.resolve("b"), Some(b));
        assert_eq!(g.resolve("Bold"), Some(b));
        assert_eq!(g.resolve("*"), g.resolve("LI"));
        assert_eq!(g.resolve("nope"), None);
    }

    #[test]
    fn duplicate_tag_names_rejected() {
        let err = compile(&with_tags(r#"{ "B": {}, "b": {} }"#)).unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateTag(_)), "{err}");
    }

    #[test]
    fn conflicting_alias_rejected() {
        let json = r#"{
            "aliases": { "I": "B" },
            "tags": { "B": {}, "I": {} }
        }"#;
        assert!(matches!(compile(json), Err(GrammarError::ConflictingAlias { .. })));
    }

    #[test]
    fn invalid_and_reserved_tag_names_rejected() {
        for tags in [r#"{ "1B": {} }"#, r#"{ "A B": {} }"#, r#"{ "st": {} }"#] {
            assert!(
                matches!(compile(&with_tags(tags)), Err(GrammarError::InvalidField { .. })),
                "{tags}"
            );
        }
    }

    // ── Rules ───────────────────────────────────────────────────────────

    #[test]
    fn unknown_tag_in_rule_rejected() {
        let err = compile(&with_tags(r#"{ "B": { "rules": { "deny": ["Q"] } } }"#)).unwrap_err();
        match err {
            GrammarError::UnknownTag { context, name } => {
                assert_eq!(name, "Q");
                assert!(context.contains("tag 'B'"), "{context}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn conflicting_require_parent_rejected() {
        let tags = r#"{ "A": {}, "B": {}, "C": { "rules": { "requireParent": ["A", "B"] } } }"#;
        assert!(matches!(
            compile(&with_tags(tags)),
            Err(GrammarError::ConflictingRequireParent { .. })
        ));
    }

    #[test]
    fn zero_limits_rejected() {
        for tags in [r#"{ "B": { "nestingLimit": 0 } }"#, r#"{ "B": { "tagLimit": 0 } }"#] {
            assert!(matches!(
                compile(&with_tags(tags)),
                Err(GrammarError::InvalidField { .. })
            ));
        }
    }

    #[test]
    fn permitted_sets_follow_default_rule() {
        let g = compile(LIST_GRAMMAR).unwrap();
        let li = g.resolve("LI").unwrap();
        let b = g.resolve("B").unwrap();
        let list = g.tag_by_name("LIST").unwrap();
        assert!(list.restricts_descendants);
        assert!(list.permitted_descendants.contains(li));
        assert!(!list.permitted_descendants.contains(b));
        let url = g.tag_by_name("URL").unwrap();
        assert!(!url.permitted_descendants.contains(url.id));
        assert!(url.permitted_descendants.contains(b));
        assert!(!g.root_allowed().contains(li));
        assert!(g.root_allowed().contains(b));
    }

    #[test]
    fn rule_references_resolve() {
        let g = compile(LIST_GRAMMAR).unwrap();
        let li = g.tag_by_name("LI").unwrap();
        assert_eq!(li.close_parent, vec![li.id]);
        assert_eq!(li.require_parent, g.resolve("LIST"));
        assert_eq!(li.nesting_limit, 3);
        assert!(li.trim.before);
        assert!(!li.trim.after);
    }

    // ── Attributes & filters ────────────────────────────────────────────

    #[test]
    fn attribute_chain_order() {
        let tags = r#"{ "SIZE": { "attributes": { "size": {
            "preFilters": ["text"],
            "filter": { "name": "range", "min": 1, "max": 7 },
            "postFilters": ["number"],
            "required": false,
            "defaultValue": "3"
        } } } }"#;
        let g = compile(&with_tags(tags)).unwrap();
        let attr = g.tag_by_name("SIZE").unwrap().attribute("size").unwrap();
        let names: Vec<&str> = attr.chain.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["text", "range", "number"]);
        assert!(!attr.required);
        assert_eq!(attr.default_value.as_deref(), Some("3"));
    }

    #[test]
    fn attributes_required_by_default() {
        let g = compile(LIST_GRAMMAR).unwrap();
        assert!(g.tag_by_name("URL").unwrap().attribute("href").unwrap().required);
    }

    #[test]
    fn unregistered_filters_rejected() {
        let attr = r#"{ "B": { "attributes": { "x": { "filter": "shout" } } } }"#;
        assert!(matches!(compile(&with_tags(attr)), Err(GrammarError::Filter { .. })));
        let tag = r#"{ "B": { "filters": { "pre": ["audit"] } } }"#;
        assert!(matches!(compile(&with_tags(tag)), Err(GrammarError::Filter { .. })));

        let mut registry = FilterRegistry::new();
        registry.register_attribute_filter("shout", |v| Some(v.to_uppercase()));
        registry.register_tag_filter("audit", |_| true);
        assert!(Grammar::from_jsonc(&with_tags(attr), &registry).is_ok());
        assert!(Grammar::from_jsonc(&with_tags(tag), &registry).is_ok());
    }

    #[test]
    fn uppercase_attribute_names_rejected() {
        let tags = r#"{ "B": { "attributes": { "Href": {} } } }"#;
        assert!(matches!(compile(&with_tags(tags)), Err(GrammarError::InvalidField { .. })));
    }

    // ── Passes ──────────────────────────────────────────────────────────

    #[test]
    fn bracket_scanner_prefers_longest_name() {
        let json = r#"{
            "tags": { "B": {}, "BR": {} },
            "passes": [{ "name": "p", "type": "bracket", "bbcodes": { "b": {}, "br": {} } }]
        }"#;
        let g = compile(json).unwrap();
        let PassKind::Bracket(pass) = &g.passes()[0].kind else {
            panic!("expected bracket pass");
        };
        let scanner = pass.scanner.as_ref().unwrap();
        let caps = scanner.captures("[BR]").unwrap();
        assert_eq!(&caps[1], "BR");
        assert_eq!(pass.bbcode("Br").unwrap().name, "br");
    }

    #[test]
    fn bracket_scanner_includes_internal_tags() {
        let g = compile(LIST_GRAMMAR).unwrap();
        let PassKind::Bracket(pass) = &g.passes()[0].kind else {
            panic!("expected bracket pass");
        };
        assert!(pass.scanner.as_ref().unwrap().is_match("[e]"));
        assert!(pass.bbcode("e").is_none());
    }

    #[test]
    fn bbcode_attributes_must_be_declared() {
        let json = r#"{
            "tags": { "URL": {} },
            "passes": [{ "name": "p", "type": "bracket", "bbcodes": { "url": { "defaultAttribute": "href" } } }]
        }"#;
        assert!(matches!(compile(json), Err(GrammarError::InvalidField { .. })));
    }

    #[test]
    fn bbcode_for_unknown_tag_rejected() {
        let json = r#"{
            "tags": { "B": {} },
            "passes": [{ "name": "p", "type": "bracket", "bbcodes": { "q": {} } }]
        }"#;
        assert!(matches!(compile(json), Err(GrammarError::UnknownTag { .. })));
    }

    #[test]
    fn regexp_pass_validated() {
        let g = compile(LIST_GRAMMAR).unwrap();
        let pass = &g.passes()[1];
        assert_eq!(pass.limit, 5);
        assert_eq!(pass.limit_action, LimitAction::Abort);
        let PassKind::Regexp(re) = &pass.kind else {
            panic!("expected regexp pass");
        };
        assert_eq!(re.tag_name, "E");
        assert_eq!(re.captures, vec![("face".to_string(), "face".to_string())]);

        let bad_group = r#"{
            "tags": { "E": {} },
            "passes": [{ "name": "p", "type": "regexp", "regexp": "x", "tagName": "E", "attributes": { "g": "a" } }]
        }"#;
        assert!(matches!(compile(bad_group), Err(GrammarError::InvalidField { .. })));

        let bad_regex = r#"{
            "tags": { "E": {} },
            "passes": [{ "name": "p", "type": "regexp", "regexp": "(", "tagName": "E" }]
        }"#;
        assert!(matches!(compile(bad_regex), Err(GrammarError::InvalidRegex { .. })));
    }

    #[test]
    fn duplicate_pass_names_rejected() {
        let json = r#"{
            "tags": {},
            "passes": [{ "name": "p", "type": "plugin" }, { "name": "p", "type": "plugin" }]
        }"#;
        assert!(matches!(compile(json), Err(GrammarError::InvalidField { .. })));
    }

    #[test]
    fn grammar_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Grammar>();
    }
}
