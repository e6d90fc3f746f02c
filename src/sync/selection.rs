//! Ordered block selection with value semantics

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// An ordered set of block ids.
///
/// Every change returns a new selection; an existing value is never modified,
/// so a snapshot handed to a pending save cannot shift underneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockSelection(IndexSet<String>);

impl BlockSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Ids in selection order, ready to send
    pub fn to_ids(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Add if absent, remove if present
    pub fn toggled(&self, id: &str) -> Self {
        if self.contains(id) {
            self.without(id)
        } else {
            self.with(id)
        }
    }

    /// Selection with `id` appended (no-op if already selected)
    pub fn with(&self, id: &str) -> Self {
        let mut next = self.0.clone();
        next.insert(id.to_string());
        Self(next)
    }

    /// Selection without `id`, order of the rest kept
    pub fn without(&self, id: &str) -> Self {
        let mut next = self.0.clone();
        next.shift_remove(id);
        Self(next)
    }

    /// Drop ids that are not among `live`
    pub fn retain_present<'a, I>(&self, live: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let live: IndexSet<&str> = live.into_iter().collect();
        Self(
            self.0
                .iter()
                .filter(|id| live.contains(id.as_str()))
                .cloned()
                .collect(),
        )
    }
}

impl<S: Into<String>> FromIterator<S> for BlockSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
