//! Open-element stack and the allowed-set arena.

use tagweave_grammar::{TagDef, TagId, TagSet};

/// One open element.
#[derive(Debug)]
pub(super) struct Frame {
    pub(super) id: TagId,
    pub(super) suffix: Option<String>,
    /// Arena length to restore when the frame closes.
    pub(super) saved_sets: usize,
    pub(super) ignore_tags: bool,
}

/// Stack of allowed sets. A frame only pushes a new set when it actually
/// narrows the current one, so deep nesting of permissive tags costs
/// nothing.
#[derive(Debug)]
pub(super) struct AllowedSets {
    sets: Vec<TagSet>,
}

impl AllowedSets {
    pub(super) fn new(root: &TagSet) -> Self {
        Self {
            sets: vec![root.clone()],
        }
    }

    pub(super) fn current(&self) -> &TagSet {
        // The root set is never popped.
        &self.sets[self.sets.len() - 1]
    }

    pub(super) fn len(&self) -> usize {
        self.sets.len()
    }

    pub(super) fn narrow(&mut self, def: &TagDef) {
        if !def.restricts_descendants {
            return;
        }
        let current = self.current();
        if current.is_subset(&def.permitted_descendants) {
            return;
        }
        let narrowed = current.intersection(&def.permitted_descendants);
        self.sets.push(narrowed);
    }

    pub(super) fn restore(&mut self, len: usize) {
        self.sets.truncate(len.max(1));
    }
}
