//! XML-like serialization of a resolved tag list, and its inverse.
//!
//! The document interleaves escaped source text with elements: `<rt>` is
//! the root when at least one tag was accepted and `<pt>` otherwise; the
//! literal markup of start and end tags is kept in `<st>` and `<et>`, and
//! absorbed whitespace in `<i>`. Stripping every element and unescaping
//! gives back the source text byte for byte.

use std::fmt::Write as _;

use crate::tag::Tag;

/// Serialize `text` annotated with `tags`.
///
/// `tags` must be in ascending position, non-overlapping and on character
/// boundaries, as returned by the parser. A tag that violates this fails a
/// debug assertion and is skipped in release builds.
pub fn render_xml(text: &str, tags: &[Tag]) -> String {
    let mut out = String::with_capacity(text.len() + tags.len() * 16 + 9);
    let root = if tags.is_empty() { "pt" } else { "rt" };
    let _ = write!(out, "<{root}>");

    let mut pos = 0;
    for tag in tags {
        let marker = tag.marker();
        let parts = (
            text.get(pos..tag.pos),
            text.get(tag.pos..marker.start),
            text.get(marker.clone()),
            text.get(marker.end..tag.end()),
        );
        debug_assert!(
            matches!(parts, (Some(_), Some(_), Some(_), Some(_))),
            "tag {} at {}..{} does not fit the text after offset {pos}",
            tag.name,
            tag.pos,
            tag.end()
        );
        let (Some(gap), Some(before), Some(literal), Some(after)) = parts else {
            continue;
        };
        escape_text(&mut out, gap);
        whitespace(&mut out, before);
        if tag.kind.is_self_closing() {
            if literal.is_empty() {
                open(&mut out, tag, true);
            } else {
                open(&mut out, tag, false);
                escape_text(&mut out, literal);
                close(&mut out, tag);
            }
        } else if tag.kind.is_start() {
            open(&mut out, tag, false);
            wrapped(&mut out, "st", literal);
        } else {
            wrapped(&mut out, "et", literal);
            close(&mut out, tag);
        }
        whitespace(&mut out, after);
        pos = tag.end();
    }
    escape_text(&mut out, text.get(pos..).unwrap_or_default());
    let _ = write!(out, "</{root}>");
    out
}

/// Recover the source text from a document produced by [`render_xml`].
pub fn unparse(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(at) = rest.find(['<', '&']) {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        if rest.starts_with('<') {
            rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
            continue;
        }
        let entity = ENTITIES
            .iter()
            .find(|(name, _)| rest.starts_with(*name));
        match entity {
            Some((name, c)) => {
                out.push(*c);
                rest = &rest[name.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

const ENTITIES: [(&str, char); 4] = [("&lt;", '<'), ("&gt;", '>'), ("&amp;", '&'), ("&quot;", '"')];

fn open(out: &mut String, tag: &Tag, self_closing: bool) {
    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in &tag.params {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_text(out, value);
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

fn close(out: &mut String, tag: &Tag) {
    let _ = write!(out, "</{}>", tag.name);
}

fn wrapped(out: &mut String, element: &str, literal: &str) {
    if literal.is_empty() {
        return;
    }
    let _ = write!(out, "<{element}>");
    escape_text(out, literal);
    let _ = write!(out, "</{element}>");
}

fn whitespace(out: &mut String, ws: &str) {
    wrapped(out, "i", ws);
}

fn escape_text(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
