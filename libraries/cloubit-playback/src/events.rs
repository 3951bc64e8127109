//! Session events
//!
//! Most session failures are absorbed silently (dropped switches, skipped
//! tracks, unknown ids). Each such transition is also recorded here so the UI
//! and tests can observe it. Events queue up until drained with
//! `PlaybackSession::drain_events`.

use serde::{Deserialize, Serialize};

use crate::types::{PlaybackMode, TrackId};

/// Observable session transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Queue gained or lost entries
    QueueChanged {
        /// New queue length
        count: usize,
    },

    /// A switch completed and a new engine handle is live
    TrackChanged {
        track_id: TrackId,
        previous_track_id: Option<TrackId>,
    },

    /// A switch was requested while another was in flight and was dropped
    SwitchDropped { track_id: TrackId },

    /// A switch named an id that is not queued
    TrackNotFound { track_id: TrackId },

    /// No playable URL for this track; advancing past it
    TrackSkipped { track_id: TrackId },

    /// Too many unplayable tracks in a row; playback stopped
    SkipBudgetExhausted {
        /// Number of tracks skipped before giving up
        attempts: usize,
    },

    /// The engine could not build a handle
    EngineFailed { track_id: TrackId, message: String },

    /// The loaded source refused to play
    PlayError { track_id: TrackId, message: String },

    /// Playing flag changed
    PlaybackStateChanged { playing: bool },

    ModeChanged { mode: PlaybackMode },

    VolumeChanged { volume: f32, muted: bool },

    /// Queue and current track were reset
    Cleared,
}
