//! Bracket markup scanner: `[name attr=value]`, `[/name]`, `[name/]`.

use std::collections::HashMap;

use tagweave_diagnostics::codes;
use tagweave_grammar::{Bbcode, BracketPass, Grammar, TagDef};

use super::PassSink;
use crate::context::params;
use crate::tag::{Candidate, TagType};

pub(super) fn scan(text: &str, grammar: &Grammar, pass: &BracketPass, sink: &mut PassSink<'_>) {
    let Some(scanner) = &pass.scanner else {
        return;
    };
    let mut end_markers = EndMarkers::default();
    for caps in scanner.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let reader = Reader {
            text,
            bytes: text.as_bytes(),
            grammar,
            pass,
            lpos: whole.start(),
            name: name.as_str(),
        };
        let is_end = whole.as_str().starts_with("[/");
        let Some(candidate) = reader.read(name.end(), is_end, &mut end_markers, sink) else {
            continue;
        };
        if !sink.push(candidate) {
            break;
        }
    }
}

/// Reads one marker starting at `lpos`.
struct Reader<'a> {
    text: &'a str,
    bytes: &'a [u8],
    grammar: &'a Grammar,
    pass: &'a BracketPass,
    lpos: usize,
    name: &'a str,
}

impl Reader<'_> {
    fn read(
        &self,
        mut rpos: usize,
        is_end: bool,
        end_markers: &mut EndMarkers,
        sink: &mut PassSink<'_>,
    ) -> Option<Candidate> {
        let mut suffix = None;
        match self.bytes.get(rpos) {
            Some(b':') => {
                let start = rpos + 1;
                let end = self.skip_while(start, |b| b.is_ascii_digit());
                if end == start {
                    self.unexpected(start, sink);
                    return None;
                }
                suffix = Some(self.text[start..end].to_string());
                rpos = end;
            }
            Some(b']' | b'/' | b'=') => {}
            Some(b) if b.is_ascii_whitespace() => {}
            // A longer word that merely starts with a known name.
            _ => return None,
        }

        let id = self.grammar.resolve(self.name)?;
        let def = self.grammar.tag(id);
        if def.internal {
            if !is_end {
                sink.log(codes::INTERNAL_TAG, self.lpos, params![self.name]);
            }
            return None;
        }
        let bbcode = self.pass.bbcode(self.name)?;

        if is_end {
            if self.bytes.get(rpos) != Some(&b']') {
                sink.log(
                    codes::MALFORMED_END_TAG,
                    rpos,
                    params![self.found(rpos), self.name],
                );
                return None;
            }
            let mut candidate =
                Candidate::new(self.name, self.lpos, rpos + 1 - self.lpos, TagType::END);
            candidate.suffix = suffix;
            return Some(candidate);
        }

        let mut candidate = Candidate::new(self.name, self.lpos, 0, TagType::START);
        candidate.suffix = suffix;
        rpos = self.read_attributes(rpos, def, bbcode, &mut candidate, sink)?;
        candidate.len = rpos - self.lpos;

        for (name, value) in &bbcode.predefined_attributes {
            if candidate.param(name).is_none() {
                candidate.set_param(name.as_str(), value.as_str());
            }
        }

        if candidate.kind == TagType::START {
            let marker = end_marker(&bbcode.name, candidate.suffix.as_deref());
            for attribute in &bbcode.content_attributes {
                if candidate.param(attribute).is_some() {
                    continue;
                }
                if let Some(at) = end_markers.find(self.text, &marker, rpos) {
                    candidate.set_param(attribute.as_str(), &self.text[rpos..at]);
                }
            }
            if def.auto_close && !starts_with_ignore_case(&self.text[rpos..], &marker) {
                candidate.kind = TagType::SELF_CLOSING;
            }
        }
        Some(candidate)
    }

    /// Parse attributes up to the closing `]` or `/]`. Returns the offset
    /// one past the marker.
    fn read_attributes(
        &self,
        mut rpos: usize,
        def: &TagDef,
        bbcode: &Bbcode,
        candidate: &mut Candidate,
        sink: &mut PassSink<'_>,
    ) -> Option<usize> {
        let mut first = true;
        loop {
            rpos = self.skip_whitespace(rpos);
            let Some(&c) = self.bytes.get(rpos) else {
                sink.log(codes::UNEXPECTED_END, self.lpos, params![self.name]);
                return None;
            };
            match c {
                b']' => return Some(rpos + 1),
                b'/' => {
                    if self.bytes.get(rpos + 1) == Some(&b']') {
                        candidate.kind = TagType::SELF_CLOSING;
                        return Some(rpos + 2);
                    }
                    self.unexpected(rpos + 1, sink);
                    return None;
                }
                _ => {}
            }

            let attr_pos = rpos;
            let name = if c == b'=' && first {
                match &bbcode.default_attribute {
                    Some(name) => name.clone(),
                    None => {
                        let name = bbcode.name.to_ascii_lowercase();
                        sink.log(
                            codes::DEFAULT_ATTRIBUTE_FALLBACK,
                            rpos,
                            params![self.name, name],
                        );
                        name
                    }
                }
            } else {
                let end = self.skip_while(rpos, is_attribute_name_byte);
                if end == rpos {
                    self.unexpected(rpos, sink);
                    return None;
                }
                let name = self.text[rpos..end].to_ascii_lowercase();
                rpos = self.skip_whitespace(end);
                if self.bytes.get(rpos) != Some(&b'=') {
                    self.unexpected(rpos, sink);
                    return None;
                }
                name
            };
            first = false;
            rpos = self.skip_whitespace(rpos + 1);

            let value = match self.bytes.get(rpos) {
                Some(&quote @ (b'"' | b'\'')) => {
                    let Some(close) = find_closing_quote(self.bytes, rpos, quote) else {
                        sink.log(
                            codes::UNTERMINATED_QUOTE,
                            rpos,
                            params![name, self.name],
                        );
                        return None;
                    };
                    let value = unescape(&self.text[rpos + 1..close]);
                    rpos = close + 1;
                    value
                }
                _ => {
                    let end = self.skip_while(rpos, |b| b != b']' && !b.is_ascii_whitespace());
                    let value = self.text[rpos..end].to_string();
                    rpos = end;
                    value
                }
            };

            if def.attribute(&name).is_some() {
                candidate.set_param(name, value);
            } else {
                sink.log(codes::UNKNOWN_ATTRIBUTE, attr_pos, params![self.name, name]);
            }
        }
    }

    /// Log whatever sits at `pos` as unexpected.
    fn unexpected(&self, pos: usize, sink: &mut PassSink<'_>) {
        if pos >= self.bytes.len() {
            sink.log(codes::UNEXPECTED_END, self.lpos, params![self.name]);
        } else {
            sink.log(
                codes::UNEXPECTED_CHARACTER,
                pos,
                params![self.found(pos), self.name],
            );
        }
    }

    fn found(&self, pos: usize) -> String {
        match self.text.get(pos..).and_then(|rest| rest.chars().next()) {
            Some(c) => format!("'{c}'"),
            None => "end of text".to_string(),
        }
    }

    fn skip_while(&self, mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
        while self.bytes.get(pos).is_some_and(|&b| pred(b)) {
            pos += 1;
        }
        pos
    }

    fn skip_whitespace(&self, pos: usize) -> usize {
        self.skip_while(pos, |b| b.is_ascii_whitespace())
    }
}

fn is_attribute_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Offset of the quote closing the one at `open`: the next `quote` byte
/// preceded by an even number of backslashes.
fn find_closing_quote(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    let mut from = open + 1;
    loop {
        let at = from + bytes.get(from..)?.iter().position(|&b| b == quote)?;
        let backslashes = bytes[open + 1..at]
            .iter()
            .rev()
            .take_while(|&&b| b == b'\\')
            .count();
        if backslashes % 2 == 0 {
            return Some(at);
        }
        from = at + 1;
    }
}

/// `\x` → `x`.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn end_marker(name: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("[/{name}:{suffix}]"),
        None => format!("[/{name}]"),
    }
}

/// Offsets of every `[/...]` marker in the text, keyed by the marker with
/// ASCII letters lowercased. Built on first use, once per scan.
#[derive(Default)]
struct EndMarkers(Option<HashMap<String, Vec<usize>>>);

impl EndMarkers {
    /// Offset of the first case-insensitive `marker` at or after `from`.
    fn find(&mut self, text: &str, marker: &str, from: usize) -> Option<usize> {
        let index = self.0.get_or_insert_with(|| index_end_markers(text));
        let offsets = index.get(&marker.to_ascii_lowercase())?;
        offsets.get(offsets.partition_point(|&at| at < from)).copied()
    }
}

/// Every `[/` up to the next `]`, unless another `[` comes first. BBCode
/// names contain neither bracket, so each end marker is found exactly once
/// and the text is walked once.
fn index_end_markers(text: &str) -> HashMap<String, Vec<usize>> {
    let bytes = text.as_bytes();
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'[' || bytes.get(i + 1) != Some(&b'/') {
            i += 1;
            continue;
        }
        let mut j = i + 2;
        while j < bytes.len() && bytes[j] != b'[' && bytes[j] != b']' {
            j += 1;
        }
        if bytes.get(j) == Some(&b']') {
            index
                .entry(text[i..=j].to_ascii_lowercase())
                .or_default()
                .push(i);
            i = j + 1;
        } else {
            i = j;
        }
    }
    index
}

fn starts_with_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .as_bytes()
        .get(..needle.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(needle.as_bytes()))
}
