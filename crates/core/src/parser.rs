use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tagweave_diagnostics::{LogEntry, Severity};
use tagweave_grammar::Grammar;
use thiserror::Error;

use crate::context::ParseContext;
use crate::normalize::{normalize, sequence};
use crate::output::render_xml;
use crate::passes::{TagPass, run_passes};
use crate::resolve::resolve;
use crate::tag::Tag;

/// Result of parsing one text.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// Accepted tags in ascending position, never overlapping.
    pub tags: Vec<Tag>,
    /// Everything the passes and the resolver reported, in order.
    pub log: Vec<LogEntry>,
}

impl ParseResult {
    /// Serialize `text` with the accepted tags. `text` must be the input
    /// this result was produced from.
    pub fn to_xml(&self, text: &str) -> String {
        render_xml(text, &self.tags)
    }

    /// Any entry at [`Severity::Error`].
    pub fn has_errors(&self) -> bool {
        self.log.iter().any(|e| e.severity == Severity::Error)
    }
}

/// Parser configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParserError {
    /// The grammar declares a plugin pass nobody registered.
    #[error("no plugin registered for pass '{0}'")]
    MissingPlugin(String),
    /// A registered plugin matches no plugin pass of the grammar.
    #[error("plugin '{0}' does not match any plugin pass of the grammar")]
    UnknownPlugin(String),
}

// ─── Builder ────────────────────────────────────────────────────────────────

/// Binds plugin passes to a grammar. See [`Parser::builder`].
pub struct ParserBuilder {
    grammar: Arc<Grammar>,
    plugins: HashMap<String, Box<dyn TagPass>>,
}

impl ParserBuilder {
    /// Register the implementation of the plugin pass called `name`.
    #[must_use]
    pub fn plugin(mut self, name: impl Into<String>, pass: impl TagPass + 'static) -> Self {
        self.plugins.insert(name.into(), Box::new(pass));
        self
    }

    /// Check that every plugin pass has exactly one implementation.
    pub fn build(self) -> Result<Parser, ParserError> {
        for name in self.grammar.plugin_passes() {
            if !self.plugins.contains_key(name) {
                return Err(ParserError::MissingPlugin(name.to_string()));
            }
        }
        let mut registered: Vec<&String> = self.plugins.keys().collect();
        registered.sort();
        if let Some(unknown) = registered
            .into_iter()
            .find(|name| !self.grammar.plugin_passes().any(|p| p == name.as_str()))
        {
            return Err(ParserError::UnknownPlugin(unknown.clone()));
        }
        Ok(Parser {
            grammar: self.grammar,
            plugins: self.plugins,
        })
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// A compiled grammar plus its plugin passes.
///
/// Parsing never mutates the parser, so one instance can serve concurrent
/// calls from several threads.
pub struct Parser {
    grammar: Arc<Grammar>,
    plugins: HashMap<String, Box<dyn TagPass>>,
}

impl Parser {
    /// Start binding plugin passes to `grammar`.
    pub fn builder(grammar: Arc<Grammar>) -> ParserBuilder {
        ParserBuilder {
            grammar,
            plugins: HashMap::new(),
        }
    }

    /// A parser for a grammar without plugin passes.
    pub fn new(grammar: Arc<Grammar>) -> Result<Self, ParserError> {
        Self::builder(grammar).build()
    }

    /// The grammar this parser applies.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Locate and resolve the tags of `text`.
    pub fn parse(&self, text: &str) -> ParseResult {
        let grammar = &*self.grammar;
        let mut ctx = ParseContext::new(text, grammar.tags().len());
        let candidates = run_passes(text, grammar, &self.plugins, &mut ctx.log);
        let queue = sequence(normalize(candidates, grammar, text, &mut ctx.log));
        let tags = resolve(grammar, &mut ctx, queue);
        ParseResult {
            tags,
            log: ctx.log.into_entries(),
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut plugins: Vec<&String> = self.plugins.keys().collect();
        plugins.sort();
        f.debug_struct("Parser")
            .field("tags", &self.grammar.tags().len())
            .field("passes", &self.grammar.passes().len())
            .field("plugins", &plugins)
            .finish()
    }
}
