//! Structured log entries for tagweave.
//!
//! Parsing never fails on user text: every abandoned or adjusted match is
//! recorded as a [`LogEntry`] in the [`Logger`] owned by the parse. Entries
//! carry a code from [`codes`], a [`Severity`], the byte position in the source
//! text, a positional message template and the ordered template parameters.

#![warn(missing_docs)]

/// Log entry code constants generated from the catalogue.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Expected recovery, e.g. a dangling end tag left as text.
    Debug,
    /// Informational note, e.g. a default value substitution.
    Info,
    /// The input is probably not what the author meant.
    Warn,
    /// A tag or attribute was rejected outright.
    Error,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];

    /// Lowercase name as used in serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown severity '{s}' (expected debug, info, warn or error)"))
    }
}

/// One structured log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Code from [`codes`] (e.g. `"TW3005"`).
    pub id: Cow<'static, str>,
    /// Severity level.
    pub severity: Severity,
    /// Byte offset in the source text the entry relates to.
    pub pos: usize,
    /// Message template with `{0}`, `{1}`, ... placeholders.
    pub template: Cow<'static, str>,
    /// Template parameters, in placeholder order.
    pub params: Vec<String>,
}

impl LogEntry {
    /// Create an entry with explicit fields.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        pos: usize,
        template: impl Into<Cow<'static, str>>,
        params: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            pos,
            template: template.into(),
            params,
        }
    }

    /// Create an entry for a catalogued code, using its default severity and
    /// template. Unknown codes fall back to `info` with the code as template.
    pub fn from_code(id: &'static str, pos: usize, params: Vec<String>) -> Self {
        Self::new(
            id,
            default_severity(id).unwrap_or(Severity::Info),
            pos,
            template(id).unwrap_or(id),
            params,
        )
    }

    /// Render the template with its parameters.
    pub fn message(&self) -> String {
        interpolate(&self.template, &self.params)
    }

    /// Long explanation of this entry's code, if catalogued.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] at {}: {}",
            self.severity,
            self.id,
            self.pos,
            self.message()
        )
    }
}

/// Replace `{N}` placeholders with `params[N]`.
///
/// Placeholders without a matching parameter, and braces that do not enclose
/// an index, are copied through unchanged.
pub fn interpolate(template: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + params.iter().map(String::len).sum::<usize>());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let index: usize = after[..close].parse().ok()?;
            Some((params.get(index)?, close))
        });
        match value {
            Some((param, close)) => {
                out.push_str(param);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Collects the log entries of one parse.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    entries: Vec<LogEntry>,
}

impl Logger {
    /// An empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a catalogued code at `pos`.
    pub fn log(&mut self, id: &'static str, pos: usize, params: Vec<String>) {
        self.entries.push(LogEntry::from_code(id, pos, params));
    }

    /// Record a prepared entry.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Entries in the order they were recorded.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Consume the logger, returning its entries.
    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if any entry has [`Severity::Error`].
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    /// Entries at or above `min` severity.
    pub fn at_least(&self, min: Severity) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.severity >= min)
    }
}

/// Long explanation for a code, if catalogued.
pub fn explain(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}

/// Default severity for a code, if catalogued.
pub fn default_severity(id: &str) -> Option<Severity> {
    include!(concat!(env!("OUT_DIR"), "/generated_severity.rs"))
}

/// Message template for a code, if catalogued.
pub fn template(id: &str) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_templates.rs"))
}
