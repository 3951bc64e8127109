//! Cross-surface notifications
//!
//! Other windows (the picture-in-picture player, tray, OS media controls)
//! mirror the session through these broadcasts. Nothing is expected back.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::NowPlaying;

/// Broadcast payloads, serialized as `{ "event": name, "payload": ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum PlayerNotification {
    /// Playback started
    #[serde(rename = "player-play")]
    Play,

    /// Playback paused
    #[serde(rename = "player-pause")]
    Pause,

    /// Current track changed; `None` once the session is cleared
    #[serde(rename = "player-update-playing")]
    UpdatePlaying(Option<NowPlaying>),

    /// Duration of the loaded track
    #[serde(rename = "player-duration")]
    Duration(Duration),

    /// Lyric line at the current position
    #[serde(rename = "player-lyric")]
    Lyric(String),
}

impl PlayerNotification {
    /// Channel name other surfaces listen on
    pub fn name(&self) -> &'static str {
        match self {
            PlayerNotification::Play => "player-play",
            PlayerNotification::Pause => "player-pause",
            PlayerNotification::UpdatePlaying(_) => "player-update-playing",
            PlayerNotification::Duration(_) => "player-duration",
            PlayerNotification::Lyric(_) => "player-lyric",
        }
    }

    /// `Play` or `Pause` for a playing flag
    pub fn playback_state(playing: bool) -> Self {
        if playing {
            PlayerNotification::Play
        } else {
            PlayerNotification::Pause
        }
    }
}

/// Fire-and-forget broadcast channel
pub trait Notifier: Send + Sync {
    fn broadcast(&self, notification: PlayerNotification) -> Result<()>;
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn broadcast(&self, _notification: PlayerNotification) -> Result<()> {
        Ok(())
    }
}

/// In-process fan-out over a tokio broadcast channel
///
/// Having no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<PlayerNotification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn broadcast(&self, notification: PlayerNotification) -> Result<()> {
        // send only fails when nobody is listening
        let _ = self.tx.send(notification);
        Ok(())
    }
}
