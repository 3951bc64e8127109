//! Cloubit - Playback Session
//!
//! The desktop client's single playback session: a deduplicated queue, the
//! current track, one live engine handle and the playback mode.
//!
//! This crate provides:
//! - Idempotent queue (add, remove, clear)
//! - Single-flight track switching (concurrent requests are dropped)
//! - Sequential, random and single-repeat advance
//! - Auto-skip of tracks without a playable URL
//! - Write-through persistence of the player snapshot
//! - Broadcasts for other windows and OS media surfaces
//! - LRC lyric lookup
//!
//! # Architecture
//!
//! The session decodes nothing and talks to no network. URL resolution,
//! audio output, storage and broadcasting are injected as traits:
//!
//! - [`TrackUrlResolver`] - track id to playable URL (and lyric)
//! - [`PlaybackEngine`] / [`EngineHandle`] - one audio handle per track
//! - [`StateStore`] - persisted [`Snapshot`]
//! - [`Notifier`] - fire-and-forget [`PlayerNotification`]s
//!
//! Failures inside a command never reach the caller. They turn into no-ops or
//! skips and are recorded as [`SessionEvent`]s instead.
//!
//! # Example: Queue
//!
//! ```rust
//! use cloubit_playback::{Queue, Track, TrackId};
//!
//! let mut queue = Queue::new();
//! assert!(queue.push(Track::new(TrackId(1), "Intro")));
//! assert!(!queue.push(Track::new(TrackId(1), "Intro (again)")));
//! assert_eq!(queue.count(), 1);
//! ```
//!
//! # Example: Session wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cloubit_playback::{
//!     Collaborators, JsonFileStore, PlaybackEngine, PlaybackSession, SessionConfig,
//!     TrackUrlResolver,
//! };
//!
//! async fn start(
//!     resolver: Arc<dyn TrackUrlResolver>,
//!     engine: Arc<dyn PlaybackEngine>,
//! ) -> cloubit_playback::Result<Arc<PlaybackSession>> {
//!     let config = SessionConfig::load(None)?;
//!     let collaborators = Collaborators::new(resolver, engine)
//!         .with_store(Arc::new(JsonFileStore::new("player.json")));
//!
//!     let session = Arc::new(PlaybackSession::new(config, collaborators)?);
//!     session.resume().await;
//!
//!     let events = Arc::clone(&session);
//!     tokio::spawn(async move { events.run_engine_events().await });
//!
//!     Ok(session)
//! }
//! ```

mod config;
mod engine;
mod error;
mod events;
pub mod lyric;
pub mod mode;
mod notify;
mod queue;
mod resolver;
mod scrobble;
mod session;
mod store;
pub mod types;

// Public exports
pub use config::SessionConfig;
pub use engine::{EngineEvent, EngineEventSink, EngineHandle, EngineRequest, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use events::SessionEvent;
pub use lyric::{Lyric, LyricKind};
pub use notify::{BroadcastNotifier, Notifier, NullNotifier, PlayerNotification};
pub use queue::Queue;
pub use resolver::{ResolvedUrl, TrackUrlResolver};
pub use scrobble::Scrobbler;
pub use session::{Collaborators, PlaybackSession, SessionCommand};
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use types::{NowPlaying, PlaybackMode, Snapshot, SnapshotPatch, Track, TrackId};
