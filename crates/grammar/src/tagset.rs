//! Tag identifiers and fixed-capacity tag sets.

use serde::Serialize;

/// Index of a tag in its [`crate::Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TagId(u16);

impl TagId {
    /// Maximum number of tags a grammar can declare.
    pub const MAX_TAGS: usize = u16::MAX as usize;

    pub(crate) fn new(index: usize) -> Self {
        debug_assert!(index < Self::MAX_TAGS);
        Self(index as u16)
    }

    /// Position in [`crate::Grammar::tags`].
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A bitset over the tags of one grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagSet {
    words: Box<[u64]>,
}

impl TagSet {
    /// A set with room for `capacity` tags and no members.
    pub fn empty(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)].into_boxed_slice(),
        }
    }

    /// A set containing every tag below `capacity`.
    pub fn full(capacity: usize) -> Self {
        let mut set = Self::empty(capacity);
        for (i, word) in set.words.iter_mut().enumerate() {
            let remaining = capacity - i * 64;
            *word = if remaining >= 64 {
                u64::MAX
            } else {
                (1u64 << remaining) - 1
            };
        }
        set
    }

    /// Membership test. Ids beyond the capacity are never members.
    pub fn contains(&self, id: TagId) -> bool {
        let i = id.index();
        self.words
            .get(i / 64)
            .is_some_and(|word| word & (1 << (i % 64)) != 0)
    }

    /// Add a tag.
    pub fn insert(&mut self, id: TagId) {
        let i = id.index();
        if let Some(word) = self.words.get_mut(i / 64) {
            *word |= 1 << (i % 64);
        }
    }

    /// Remove a tag.
    pub fn remove(&mut self, id: TagId) {
        let i = id.index();
        if let Some(word) = self.words.get_mut(i / 64) {
            *word &= !(1 << (i % 64));
        }
    }

    /// Members of both sets.
    pub fn intersection(&self, other: &TagSet) -> TagSet {
        TagSet {
            words: self
                .words
                .iter()
                .zip(other.words.iter())
                .map(|(a, b)| a & b)
                .collect(),
        }
    }

    /// `true` when every member of `self` is in `other`.
    pub fn is_subset(&self, other: &TagSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// `true` when the set has no members.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Members in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = TagId> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| TagId::new(wi * 64 + bit))
        })
    }
}
