//! Deduplicated play queue
//!
//! Entries keep the index they were given when appended. The queue never
//! renumbers them, and indices are never reused after a removal, so
//! `Track::index` reflects insertion order rather than the live position; use
//! [`Queue::position_of`] for the latter.

use serde::{Deserialize, Serialize};

use crate::types::{Track, TrackId};

/// Ordered, deduplicated list of playable tracks
///
/// Invariants:
/// - `count() == entries().len()`
/// - a track id appears at most once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawQueue", into = "RawQueue")]
pub struct Queue {
    entries: Vec<Track>,
    next_index: i64,
}

/// Wire shape of the queue in the persisted store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawQueue {
    count: usize,
    #[serde(alias = "data")]
    entries: Vec<Track>,
}

impl From<RawQueue> for Queue {
    /// Rebuild from stored data, dropping duplicate ids and ignoring the
    /// stored count in favour of the real length
    fn from(raw: RawQueue) -> Self {
        let mut queue = Queue::new();
        for track in raw.entries {
            if !queue.contains(track.id) {
                queue.next_index = queue.next_index.max(track.index + 1);
                queue.entries.push(track);
            }
        }
        queue
    }
}

impl From<Queue> for RawQueue {
    fn from(queue: Queue) -> Self {
        RawQueue {
            count: queue.entries.len(),
            entries: queue.entries,
        }
    }
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_index: 0,
        }
    }

    /// Append a track
    ///
    /// Returns `false` (and leaves the queue untouched) if a track with the
    /// same id is already queued. The appended entry gets the next unused
    /// `index`.
    pub fn push(&mut self, mut track: Track) -> bool {
        if self.contains(track.id) {
            return false;
        }

        track.index = self.next_index;
        self.next_index += 1;
        self.entries.push(track);
        true
    }

    /// Remove a track by id
    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let position = self.position_of(id)?;
        Some(self.entries.remove(position))
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_index = 0;
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Alias of [`Queue::count`]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Track] {
        &self.entries
    }

    /// Entry at a live position
    pub fn get(&self, position: usize) -> Option<&Track> {
        self.entries.get(position)
    }

    /// Find an entry by id
    pub fn find(&self, id: TrackId) -> Option<&Track> {
        self.entries.iter().find(|track| track.id == id)
    }

    /// Live position of an entry
    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.entries.iter().position(|track| track.id == id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.position_of(id).is_some()
    }
}
