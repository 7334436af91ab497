//! Data model shared by the sampler, delta engine and dispatcher.
//!
//! A [`Snapshot`] is one poll's worth of cumulative InnoDB data-file counters
//! keyed by entity (table) name. A [`DeltaSet`] has the same shape and holds
//! the per-interval differences computed against the previous snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::Serialize;

/// One of the fixed cumulative counters tracked per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    CountRead,
    CountWrite,
    BytesRead,
    BytesWrite,
}

impl Counter {
    /// All counters in emission order.
    pub const ALL: [Counter; 4] = [
        Counter::CountRead,
        Counter::CountWrite,
        Counter::BytesRead,
        Counter::BytesWrite,
    ];

    /// Name used in the metric type instance (`<entity>:<name>`).
    pub fn as_str(self) -> &'static str {
        match self {
            Counter::CountRead => "count_read",
            Counter::CountWrite => "count_write",
            Counter::BytesRead => "bytes_read",
            Counter::BytesWrite => "bytes_write",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File I/O counters of a single entity.
///
/// Used both for cumulative values (in a [`Snapshot`]) and for
/// per-interval differences (in a [`DeltaSet`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileIo {
    pub count_read: u64,
    pub count_write: u64,
    pub bytes_read: u64,
    pub bytes_write: u64,
}

impl FileIo {
    pub fn new(count_read: u64, count_write: u64, bytes_read: u64, bytes_write: u64) -> Self {
        Self {
            count_read,
            count_write,
            bytes_read,
            bytes_write,
        }
    }

    /// Iterates `(counter, value)` pairs in [`Counter::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Counter, u64)> + '_ {
        Counter::ALL.into_iter().map(move |c| (c, self[c]))
    }

    /// Adds another set of counters, saturating at `u64::MAX`.
    pub fn saturating_add(&mut self, other: &FileIo) {
        for c in Counter::ALL {
            self[c] = self[c].saturating_add(other[c]);
        }
    }
}

impl Index<Counter> for FileIo {
    type Output = u64;

    fn index(&self, counter: Counter) -> &u64 {
        match counter {
            Counter::CountRead => &self.count_read,
            Counter::CountWrite => &self.count_write,
            Counter::BytesRead => &self.bytes_read,
            Counter::BytesWrite => &self.bytes_write,
        }
    }
}

impl IndexMut<Counter> for FileIo {
    fn index_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::CountRead => &mut self.count_read,
            Counter::CountWrite => &mut self.count_write,
            Counter::BytesRead => &mut self.bytes_read,
            Counter::BytesWrite => &mut self.bytes_write,
        }
    }
}

/// Cumulative counters for every entity seen in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entities: BTreeMap<String, FileIo>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records counters for an entity. Counters of an entity that is already
    /// present are summed into the existing entry.
    pub fn record(&mut self, entity: impl Into<String>, io: FileIo) {
        self.entities
            .entry(entity.into())
            .and_modify(|existing| existing.saturating_add(&io))
            .or_insert(io);
    }

    pub fn get(&self, entity: &str) -> Option<&FileIo> {
        self.entities.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates entities in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileIo)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, FileIo)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (S, FileIo)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (entity, io) in iter {
            snapshot.record(entity, io);
        }
        snapshot
    }
}

/// Per-interval differences produced by [`crate::delta::DeltaEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSet {
    deltas: BTreeMap<String, FileIo>,
    resets: BTreeSet<String>,
}

impl DeltaSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<String>, delta: FileIo) {
        self.deltas.insert(entity.into(), delta);
    }

    /// Marks an entity whose counters went backwards this interval.
    pub fn mark_reset(&mut self, entity: impl Into<String>) {
        self.resets.insert(entity.into());
    }

    pub fn get(&self, entity: &str) -> Option<&FileIo> {
        self.deltas.get(entity)
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileIo)> {
        self.deltas.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entities with at least one counter regression in this interval.
    pub fn resets(&self) -> impl Iterator<Item = &str> {
        self.resets.iter().map(String::as_str)
    }

    pub fn is_reset(&self, entity: &str) -> bool {
        self.resets.contains(entity)
    }
}
