//! Tag candidates and resolved tags.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use tagweave_grammar::{TagDef, TagId};

bitflags! {
    /// Role of a tag. A self-closing tag is both a start and an end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TagType: u8 {
        /// Opens an element.
        const START = 1;
        /// Closes an element.
        const END = 2;
        /// Opens and closes an element in one marker.
        const SELF_CLOSING = Self::START.bits() | Self::END.bits();
    }
}

impl TagType {
    /// Opens an element (start or self-closing).
    pub fn is_start(self) -> bool {
        self.contains(Self::START)
    }

    /// Closes an element (end or self-closing).
    pub fn is_end(self) -> bool {
        self.contains(Self::END)
    }

    /// Both start and end.
    pub fn is_self_closing(self) -> bool {
        self == Self::SELF_CLOSING
    }

    /// Name used in serialized output.
    pub fn as_str(self) -> &'static str {
        if self.is_self_closing() {
            "selfClosing"
        } else if self.is_start() {
            "start"
        } else {
            "end"
        }
    }
}

impl Serialize for TagType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A tag proposed by a tokenizer pass, before its name is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Name as found in the source; resolved case-insensitively.
    pub name: String,
    /// Byte offset of the first byte of the marker.
    pub pos: usize,
    /// Byte length of the marker.
    pub len: usize,
    /// Start, end or self-closing.
    pub kind: TagType,
    /// Pairing suffix (`[b:1]` … `[/b:1]`).
    pub suffix: Option<String>,
    /// Raw attribute values, in the order they were found.
    pub params: Vec<(String, String)>,
    pub(crate) pass: usize,
}

impl Candidate {
    /// A candidate with no suffix and no attributes.
    pub fn new(name: impl Into<String>, pos: usize, len: usize, kind: TagType) -> Self {
        Self {
            name: name.into(),
            pos,
            len,
            kind,
            suffix: None,
            params: Vec::new(),
            pass: 0,
        }
    }

    /// Attach a pairing suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Set an attribute, replacing any earlier value of the same name.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    /// Value of an attribute, if set.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Index of the pass that produced this candidate.
    pub fn pass(&self) -> usize {
        self.pass
    }
}

/// A tag bound to a grammar entry.
///
/// After resolution `pos..pos + len` covers the marker plus any whitespace
/// absorbed around it; `trim_before` and `trim_after` give the absorbed
/// byte counts on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Grammar entry.
    pub id: TagId,
    /// Canonical name.
    pub name: String,
    /// Byte offset of the first covered byte.
    pub pos: usize,
    /// Covered byte length.
    pub len: usize,
    /// Start, end or self-closing.
    pub kind: TagType,
    /// Pairing suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Attribute values.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Whitespace bytes absorbed before the marker.
    #[serde(skip_serializing_if = "is_zero")]
    pub trim_before: usize,
    /// Whitespace bytes absorbed after the marker.
    #[serde(skip_serializing_if = "is_zero")]
    pub trim_after: usize,
    #[serde(skip)]
    pub(crate) pass: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Tag {
    /// A zero-length end tag closing `def` at `pos`.
    pub(crate) fn synthetic_end(def: &TagDef, pos: usize, suffix: Option<String>) -> Self {
        Self {
            id: def.id,
            name: def.name.clone(),
            pos,
            len: 0,
            kind: TagType::END,
            suffix,
            params: BTreeMap::new(),
            trim_before: 0,
            trim_after: 0,
            pass: usize::MAX,
        }
    }

    /// Byte offset one past the last covered byte.
    pub fn end(&self) -> usize {
        self.pos + self.len
    }

    /// Range of the marker itself, without absorbed whitespace.
    pub fn marker(&self) -> std::ops::Range<usize> {
        self.pos + self.trim_before..self.end() - self.trim_after
    }

    /// Pairs with an open element of the same entry and suffix.
    pub(crate) fn pairs_with(&self, id: TagId, suffix: Option<&str>) -> bool {
        self.id == id && self.suffix.as_deref() == suffix
    }
}
