//! Core types for the playback session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::queue::Queue;

/// Volume used when nothing has been persisted yet
pub const DEFAULT_VOLUME: f32 = 0.5;

const SENTINEL_NAME: &str = "No track";
const UNKNOWN_TITLE: &str = "Unknown track";
const UNKNOWN_ARTIST: &str = "Unknown artist";

/// Track identifier from the music service
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Queue entry
///
/// Carries the display metadata the UI needs plus the position the entry was
/// given when it was appended. `source_tag` records where the track was queued
/// from (search result, album, playlist, ...) and never influences ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Position at insertion time, `-1` for the sentinel
    pub index: i64,

    /// Service track id
    pub id: TrackId,

    /// Display name
    pub name: String,

    /// Cover art URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    /// Provenance of the entry
    #[serde(rename = "source", default)]
    pub source_tag: i32,

    /// Artist names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<Vec<String>>,
}

impl Track {
    /// Create a track; `index` is assigned when it enters a queue
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>) -> Self {
        Self {
            index: 0,
            id: id.into(),
            name: name.into(),
            cover: None,
            source_tag: 0,
            artists: None,
        }
    }

    /// Placeholder used while nothing is selected
    pub fn sentinel() -> Self {
        Self {
            index: -1,
            id: TrackId::default(),
            name: SENTINEL_NAME.to_string(),
            cover: None,
            source_tag: 0,
            artists: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.index == -1
    }

    pub fn with_cover(mut self, cover: impl Into<String>) -> Self {
        self.cover = Some(cover.into());
        self
    }

    pub fn with_artists<I, S>(mut self, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = Some(artists.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_source_tag(mut self, source_tag: i32) -> Self {
        self.source_tag = source_tag;
        self
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// Playback mode
///
/// Serialized with the names the persisted store has always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Play the queue in order, wrapping at the end
    #[default]
    #[serde(rename = "list")]
    Sequential,

    /// Pick a random other entry
    #[serde(rename = "random")]
    Random,

    /// Loop the current track
    #[serde(rename = "single")]
    SingleRepeat,
}

/// Persisted session state
///
/// Positions are stored as float seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    #[serde(alias = "playlist")]
    pub queue: Queue,
    #[serde(alias = "currentSong")]
    pub current_track: Track,
    pub seek: f64,
    pub duration: f64,
    pub volume: f32,
    pub mode: PlaybackMode,
    pub muted: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            queue: Queue::new(),
            current_track: Track::sentinel(),
            seek: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            mode: PlaybackMode::Sequential,
            muted: false,
        }
    }
}

impl Snapshot {
    /// Merge a partial update into this snapshot
    pub fn apply(&mut self, patch: SnapshotPatch) {
        let SnapshotPatch {
            queue,
            current_track,
            seek,
            duration,
            volume,
            mode,
            muted,
        } = patch;

        if let Some(queue) = queue {
            self.queue = queue;
        }
        if let Some(track) = current_track {
            self.current_track = track;
        }
        if let Some(seek) = seek {
            self.seek = seek;
        }
        if let Some(duration) = duration {
            self.duration = duration;
        }
        if let Some(volume) = volume {
            self.volume = volume;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        if let Some(muted) = muted {
            self.muted = muted;
        }
    }

    /// Persisted seek position, or zero when the stored value is unusable
    pub fn seek_position(&self) -> Duration {
        Duration::try_from_secs_f64(self.seek).unwrap_or_default()
    }
}

/// Partial snapshot update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<Queue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_track: Option<Track>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<PlaybackMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl SnapshotPatch {
    pub fn queue(queue: Queue) -> Self {
        Self {
            queue: Some(queue),
            ..Self::default()
        }
    }

    pub fn current_track(track: Track) -> Self {
        Self {
            current_track: Some(track),
            ..Self::default()
        }
    }

    pub fn seek(position: Duration) -> Self {
        Self {
            seek: Some(position.as_secs_f64()),
            ..Self::default()
        }
    }

    pub fn volume(volume: f32) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    pub fn mode(mode: PlaybackMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn muted(muted: bool) -> Self {
        Self {
            muted: Some(muted),
            ..Self::default()
        }
    }
}

/// Metadata pushed to OS "now playing" surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
}

impl From<&Track> for NowPlaying {
    fn from(track: &Track) -> Self {
        let title = if track.name.is_empty() {
            UNKNOWN_TITLE.to_string()
        } else {
            track.name.clone()
        };

        let artist = match track.artists.as_deref() {
            Some(artists) if !artists.is_empty() => artists.join("/"),
            _ => UNKNOWN_ARTIST.to_string(),
        };

        Self {
            track_id: track.id,
            title,
            artist,
            artwork: track.cover.clone(),
        }
    }
}
