//! tagweave core library.
//!
//! Locates BBCode-style tags in untrusted text and resolves them into a
//! flat, well-formed tag list. The pipeline runs each tokenizer pass of a
//! [`Grammar`] over the text, binds the candidates to grammar entries,
//! orders them and feeds them through a stack machine that enforces the
//! grammar's nesting rules and filters attribute values. The main entry
//! point is [`Parser::parse`]; [`ParseResult::to_xml`] and [`unparse`]
//! convert to and from the reference XML form.
//!
//! ```
//! use std::sync::Arc;
//! use tagweave_core::{FilterRegistry, Grammar, Parser};
//!
//! let grammar = Grammar::from_jsonc(
//!     r#"{
//!         "tags": { "B": {} },
//!         "passes": [{ "name": "bbcodes", "type": "bracket", "bbcodes": { "b": {} } }]
//!     }"#,
//!     &FilterRegistry::new(),
//! )
//! .unwrap();
//! let parser = Parser::new(Arc::new(grammar)).unwrap();
//! let text = "[b]bold[/b]";
//! let result = parser.parse(text);
//! assert_eq!(
//!     result.to_xml(text),
//!     "<rt><B><st>[b]</st>bold<et>[/b]</et></B></rt>"
//! );
//! ```

#![warn(missing_docs)]

mod context;
mod dump;
mod normalize;
pub mod output;
mod parser;
pub mod passes;
mod resolve;
mod tag;

// ── Convenience re-exports ──────────────────────────────────────────────────

// Parser
pub use parser::{ParseResult, Parser, ParserBuilder, ParserError};

// Tags
pub use tag::{Candidate, Tag, TagType};

// Plugin passes
pub use passes::{PassSink, TagPass};

// Output
pub use output::{render_xml, unparse};

// Serialization helpers
pub use dump::to_pretty_json;

// Grammar, filters and diagnostics (re-exported from their crates)
pub use tagweave_diagnostics::{LogEntry, Logger, Severity, codes};
pub use tagweave_filters::{FilterError, FilterRegistry};
pub use tagweave_grammar::{Grammar, GrammarError, TagId};
