//! Log rendering using ariadne.
//!
//! Converts parse [`LogEntry`] values into ariadne [`Report`]s anchored at
//! the entry's byte position. JSON output is assembled by the commands
//! themselves.

use std::io::{self, IsTerminal};

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use tagweave_core::{LogEntry, Severity};

// ── Output format ───────────────────────────────────────────────────────

/// Output format for results and log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    /// Coloured, source-annotated output (ariadne).
    Pretty,
    /// Machine-readable JSON.
    Json,
}

impl Format {
    /// Pick a format from `--output`, or from whether stdout is a TTY.
    pub(crate) fn resolve_or_detect(explicit: Option<&str>) -> Self {
        match explicit {
            Some("json") => Format::Json,
            Some("pretty") => Format::Pretty,
            _ => {
                if io::stdout().is_terminal() {
                    Format::Pretty
                } else {
                    Format::Json
                }
            }
        }
    }
}

// ── Severity mapping ────────────────────────────────────────────────────

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warn => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
        _ => ReportKind::Custom("debug", Color::Cyan),
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warn => Color::Yellow,
        Severity::Info => Color::Blue,
        _ => Color::Cyan,
    }
}

/// Byte range of the character at `pos`, or an empty range at the end of
/// the text.
fn char_span(source: &str, pos: usize) -> std::ops::Range<usize> {
    let start = pos.min(source.len());
    let width = source
        .get(start..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8);
    start..start + width
}

// ── Pretty rendering ────────────────────────────────────────────────────

/// Render log entries in pretty (ariadne) format to stderr.
pub(crate) fn render_log_pretty(source: &str, filename: &str, entries: &[&LogEntry]) {
    if entries.is_empty() {
        return;
    }

    let config = Config::default()
        .with_compact(false)
        .with_index_type(IndexType::Byte);

    // Build the Source once and reuse it across all reports.
    let mut cache = (filename, Source::from(source));

    for entry in entries {
        let span = char_span(source, entry.pos);
        let message = entry.message();

        let mut builder = Report::build(report_kind(entry.severity), (filename, span.clone()))
            .with_code(entry.id.as_ref())
            .with_message(&message)
            .with_config(config);

        builder = builder.with_label(
            Label::new((filename, span))
                .with_message(label_message(entry, &message))
                .with_color(severity_color(entry.severity)),
        );

        if let Some(explanation) = entry.explain() {
            builder = builder.with_help(explanation);
        }

        builder.finish().eprint(&mut cache).ok();
    }
}

/// The first parameter usually names the tag or pass; show it inline and
/// leave the full message to the report header.
fn label_message(entry: &LogEntry, message: &str) -> String {
    match entry.params.first() {
        Some(first) if !first.is_empty() => first.clone(),
        _ => message.to_string(),
    }
}

// ── Summary line ────────────────────────────────────────────────────────

/// Print a coloured summary line showing error/warning/info counts.
///
/// Example: `2 errors, 1 warning, 0 info`
pub(crate) fn print_summary(entries: &[&LogEntry]) {
    use ariadne::Fmt;

    let (mut errors, mut warnings, mut infos) = (0usize, 0usize, 0usize);
    for entry in entries {
        match entry.severity {
            Severity::Error => errors += 1,
            Severity::Warn => warnings += 1,
            Severity::Info => infos += 1,
            _ => {}
        }
    }

    if errors + warnings + infos == 0 {
        return;
    }

    let mut parts = Vec::new();
    if errors > 0 {
        let s = if errors == 1 { "" } else { "s" };
        parts.push(format!("{}", format!("{errors} error{s}").fg(Color::Red)));
    }
    if warnings > 0 {
        let s = if warnings == 1 { "" } else { "s" };
        parts.push(format!(
            "{}",
            format!("{warnings} warning{s}").fg(Color::Yellow)
        ));
    }
    if infos > 0 {
        parts.push(format!("{}", format!("{infos} info").fg(Color::Blue)));
    }
    eprintln!("{}", parts.join(", "));
}
