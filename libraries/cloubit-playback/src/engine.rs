//! Playback engine contract
//!
//! The session never decodes audio. It asks a [`PlaybackEngine`] for one
//! [`EngineHandle`] per track and drives it through this minimal surface.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

/// Everything an engine needs to build a handle for one track
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    /// Playable URL returned by the resolver
    pub source_url: String,

    /// Initial volume (0.0-1.0)
    pub volume: f32,

    /// Initial mute state
    pub muted: bool,

    /// Start playing as soon as the source is loaded
    pub autoplay: bool,

    /// Loop the source natively (the session handles repeat itself)
    pub looping: bool,

    /// Seek here once the source is loaded (startup resume)
    pub start_at: Option<Duration>,
}

/// Notifications an engine handle reports back to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The source played to the end
    Ended,

    /// Playback started or resumed
    Played,

    /// Playback paused
    Paused,

    /// The loaded source refused to play
    PlayError(String),

    /// A fade started with [`EngineHandle::fade`] finished
    FadeComplete,
}

/// Per-handle event subscription
///
/// Each sink carries the generation of the handle it was created for. Once
/// the session releases that handle it moves to a new generation, and events
/// still arriving through the old sink are ignored.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    tx: UnboundedSender<(u64, EngineEvent)>,
}

impl EngineEventSink {
    pub(crate) fn new(generation: u64, tx: UnboundedSender<(u64, EngineEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Report an event to the owning session
    ///
    /// Returns `false` once the session is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Factory for per-track engine handles
pub trait PlaybackEngine: Send + Sync {
    /// Build a handle bound to `request.source_url`
    ///
    /// The handle must report its lifecycle through `events`.
    ///
    /// # Errors
    /// Returns an error if the underlying engine cannot create the source.
    fn load(&self, request: EngineRequest, events: EngineEventSink)
        -> Result<Box<dyn EngineHandle>>;
}

/// Live handle to one loaded track
///
/// Exclusively owned by the session; dropped after [`EngineHandle::unload`].
pub trait EngineHandle: Send {
    /// Start or resume playback
    fn play(&mut self);

    /// Pause playback
    fn pause(&mut self);

    /// Stop playback and rewind
    fn stop(&mut self);

    /// Release the underlying resource
    fn unload(&mut self);

    /// Current playback position
    fn seek(&self) -> Duration;

    /// Move to a position
    fn set_seek(&mut self, position: Duration);

    /// Current volume (0.0-1.0)
    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    fn muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    /// Total length of the loaded source
    fn duration(&self) -> Duration;

    fn is_playing(&self) -> bool;

    /// Ramp volume from `from` to `to` over `duration`
    ///
    /// Returns `true` if the engine will report [`EngineEvent::FadeComplete`]
    /// when the ramp ends. The default jumps straight to `to` and returns
    /// `false`.
    fn fade(&mut self, from: f32, to: f32, duration: Duration) -> bool {
        let _ = (from, duration);
        self.set_volume(to);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn sink_tags_events_with_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EngineEventSink::new(3, tx);

        assert!(sink.emit(EngineEvent::Ended));
        assert_eq!(rx.try_recv().unwrap(), (3, EngineEvent::Ended));
        assert_eq!(sink.generation(), 3);
    }

    #[test]
    fn sink_reports_closed_session() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EngineEventSink::new(0, tx);
        drop(rx);

        assert!(!sink.emit(EngineEvent::Played));
    }

    struct FixedHandle {
        volume: f32,
    }

    impl EngineHandle for FixedHandle {
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn stop(&mut self) {}
        fn unload(&mut self) {}
        fn seek(&self) -> Duration {
            Duration::ZERO
        }
        fn set_seek(&mut self, _position: Duration) {}
        fn volume(&self) -> f32 {
            self.volume
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn muted(&self) -> bool {
            false
        }
        fn set_muted(&mut self, _muted: bool) {}
        fn duration(&self) -> Duration {
            Duration::from_secs(1)
        }
        fn is_playing(&self) -> bool {
            false
        }
    }

    #[test]
    fn default_fade_jumps_to_target() {
        let mut handle = FixedHandle { volume: 0.0 };
        let async_fade = handle.fade(0.0, 0.7, Duration::from_millis(300));

        assert!(!async_fade);
        assert_eq!(handle.volume(), 0.7);
    }
}
