//! Playback session - core orchestration
//!
//! Owns the queue, the current track and the single live engine handle, and
//! keeps the persisted snapshot and other surfaces in step with them.
//!
//! Every command takes `&self`: state sits behind a mutex that is never held
//! across an await, and track switches are serialized by a single-flight
//! flag. A switch requested while another is in flight is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::{
    config::SessionConfig,
    engine::{EngineEvent, EngineEventSink, EngineHandle, EngineRequest, PlaybackEngine},
    error::Result,
    events::SessionEvent,
    lyric::{Lyric, LyricKind},
    mode::{pick_advance, Advance, Direction},
    notify::{Notifier, NullNotifier, PlayerNotification},
    queue::Queue,
    resolver::TrackUrlResolver,
    scrobble::Scrobbler,
    store::{MemoryStore, StateStore},
    types::{NowPlaying, PlaybackMode, Snapshot, SnapshotPatch, Track, TrackId},
};

/// External capabilities the session drives
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn TrackUrlResolver>,
    pub engine: Arc<dyn PlaybackEngine>,
    pub store: Arc<dyn StateStore>,
    pub notifier: Arc<dyn Notifier>,
    pub scrobbler: Option<Arc<dyn Scrobbler>>,
}

impl Collaborators {
    /// Resolver and engine with an in-memory store and no broadcasts
    pub fn new(resolver: Arc<dyn TrackUrlResolver>, engine: Arc<dyn PlaybackEngine>) -> Self {
        Self {
            resolver,
            engine,
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(NullNotifier),
            scrobbler: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_scrobbler(mut self, scrobbler: Arc<dyn Scrobbler>) -> Self {
        self.scrobbler = Some(scrobbler);
        self
    }
}

/// Commands other windows and media keys send over the message bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionCommand {
    TogglePlay,
    SetPlaying(bool),
    SetVolume(f32),
    ToggleMute,
    Next,
    Prev,
    SetMode(PlaybackMode),
    Seek(Duration),
}

/// Result of one switch attempt
enum SwitchOutcome {
    Switched(Track),
    NotFound,
    Unplayable,
    EngineFailed,
}

struct SessionState {
    queue: Queue,
    current: Track,
    mode: PlaybackMode,
    volume: f32,
    muted: bool,
    playing: bool,

    /// Position restored on an initial load
    persisted_seek: Duration,

    handle: Option<Box<dyn EngineHandle>>,

    /// Bumped on every release; events tagged with an older value are stale
    generation: u64,

    /// Fade-out in progress, pause on `FadeComplete`
    pending_pause: bool,

    lyric: Lyric,
    pending_events: Vec<SessionEvent>,
}

/// Holds the single-flight flag for the duration of one switch
struct SwitchGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SwitchGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The player's single long-lived session
pub struct PlaybackSession {
    state: Mutex<SessionState>,
    switching: AtomicBool,

    engine_tx: UnboundedSender<(u64, EngineEvent)>,
    engine_rx: tokio::sync::Mutex<UnboundedReceiver<(u64, EngineEvent)>>,

    resolver: Arc<dyn TrackUrlResolver>,
    engine: Arc<dyn PlaybackEngine>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    scrobbler: Option<Arc<dyn Scrobbler>>,

    config: SessionConfig,
}

impl PlaybackSession {
    /// Build a session from the persisted snapshot
    ///
    /// Nothing is loaded into the engine until [`resume`](Self::resume) or a
    /// switch. A persisted current track that is no longer queued is dropped.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            resolver,
            engine,
            store,
            notifier,
            scrobbler,
        } = collaborators;

        let snapshot = store.load()?.unwrap_or_else(|| Snapshot {
            volume: config.default_volume,
            ..Snapshot::default()
        });

        let current = if snapshot.current_track.is_sentinel() {
            Track::sentinel()
        } else {
            snapshot
                .queue
                .find(snapshot.current_track.id)
                .cloned()
                .unwrap_or_else(Track::sentinel)
        };

        info!(
            queued = snapshot.queue.count(),
            current = %current.id,
            mode = ?snapshot.mode,
            "playback session restored"
        );

        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let persisted_seek = snapshot.seek_position();

        Ok(Self {
            state: Mutex::new(SessionState {
                queue: snapshot.queue,
                current,
                mode: snapshot.mode,
                volume: snapshot.volume,
                muted: snapshot.muted,
                playing: false,
                persisted_seek,
                handle: None,
                generation: 0,
                pending_pause: false,
                lyric: Lyric::default(),
                pending_events: Vec::new(),
            }),
            switching: AtomicBool::new(false),
            engine_tx,
            engine_rx: tokio::sync::Mutex::new(engine_rx),
            resolver,
            engine,
            store,
            notifier,
            scrobbler,
            config,
        })
    }

    /// Reload the persisted current track at startup
    ///
    /// Autoplay follows `config.autoplay`; with `config.save_seek` the engine
    /// starts at the persisted position.
    pub async fn resume(&self) {
        let current = {
            let state = self.state();
            (!state.current.is_sentinel()).then_some(state.current.id)
        };

        if let Some(id) = current {
            self.set_current_track(id, self.config.autoplay, true).await;
        }
    }

    // ===== Queue =====

    /// Append a track; a track whose id is already queued is ignored
    pub fn add_to_queue(&self, track: Track) {
        let mut guard = self.state();
        let state = &mut *guard;

        let id = track.id;
        if !state.queue.push(track) {
            debug!(track_id = %id, "track already queued");
            return;
        }

        self.persist(SnapshotPatch::queue(state.queue.clone()));
        state.pending_events.push(SessionEvent::QueueChanged {
            count: state.queue.count(),
        });
        debug!(track_id = %id, count = state.queue.count(), "track queued");
    }

    /// Remove a track
    ///
    /// Removing the only entry clears the whole session, whatever `id` is.
    /// Removing the current track releases it and moves on to the entry after
    /// it, ignoring the playback mode.
    pub async fn remove_from_queue(&self, id: TrackId) {
        let replacement = {
            let mut guard = self.state();
            let state = &mut *guard;

            match state.queue.len() {
                0 => return,
                1 => {
                    drop(guard);
                    self.clear();
                    return;
                }
                _ => {}
            }

            if !state.queue.contains(id) {
                debug!(track_id = %id, "remove: track not queued");
                return;
            }

            let mut replacement = None;
            let mut patch = SnapshotPatch::default();
            if !state.current.is_sentinel() && state.current.id == id {
                self.release_engine(state);
                // picked before removal so the outgoing entry still anchors the step
                replacement = self.pick_target(state, Direction::Next, true);

                state.current = Track::sentinel();
                state.persisted_seek = Duration::ZERO;
                patch.current_track = Some(Track::sentinel());
                patch.seek = Some(0.0);
            }

            state.queue.remove(id);
            patch.queue = Some(state.queue.clone());
            self.persist(patch);
            state.pending_events.push(SessionEvent::QueueChanged {
                count: state.queue.count(),
            });
            debug!(track_id = %id, count = state.queue.count(), "track removed");

            replacement
        };

        if let Some(next_id) = replacement {
            self.set_current_track(next_id, true, false).await;
        }
    }

    /// Empty the queue and release the engine
    pub fn clear(&self) {
        {
            let mut guard = self.state();
            let state = &mut *guard;

            self.release_engine(state);
            state.queue.clear();
            state.current = Track::sentinel();
            state.persisted_seek = Duration::ZERO;
            state.lyric = Lyric::default();

            self.persist(SnapshotPatch {
                queue: Some(Queue::new()),
                current_track: Some(Track::sentinel()),
                seek: Some(0.0),
                ..SnapshotPatch::default()
            });

            state.pending_events.push(SessionEvent::Cleared);
            state
                .pending_events
                .push(SessionEvent::QueueChanged { count: 0 });
        }

        self.notify(PlayerNotification::UpdatePlaying(None));
        info!("playback session cleared");
    }

    // ===== Switching =====

    /// Switch to a queued track
    ///
    /// Dropped if another switch is in flight. An id that is not queued is a
    /// no-op. A track without a playable URL is skipped: the session advances
    /// past it, up to `config.max_skip_attempts` times in a row.
    pub async fn set_current_track(&self, id: TrackId, autoplay: bool, initial_load: bool) {
        let mut target = id;
        let mut autoplay = autoplay;
        let mut initial_load = initial_load;
        let mut skipped = 0usize;

        loop {
            let Some(guard) = SwitchGuard::acquire(&self.switching) else {
                debug!(track_id = %target, "switch in flight, request dropped");
                self.state()
                    .pending_events
                    .push(SessionEvent::SwitchDropped { track_id: target });
                return;
            };

            let outcome = self.switch_to(target, autoplay, initial_load).await;
            drop(guard);

            match outcome {
                SwitchOutcome::Switched(track) => {
                    self.after_switch(track).await;
                    return;
                }
                SwitchOutcome::NotFound | SwitchOutcome::EngineFailed => return,
                SwitchOutcome::Unplayable => {
                    skipped += 1;
                    let budget = self
                        .config
                        .max_skip_attempts
                        .unwrap_or_else(|| self.state().queue.len());

                    if skipped >= budget {
                        warn!(attempts = skipped, "too many unplayable tracks, stopping");
                        self.state()
                            .pending_events
                            .push(SessionEvent::SkipBudgetExhausted { attempts: skipped });
                        return;
                    }

                    match self.skip_target(target) {
                        Some(next_id) => target = next_id,
                        None => return,
                    }
                    autoplay = true;
                    initial_load = false;
                }
            }
        }
    }

    async fn switch_to(&self, id: TrackId, autoplay: bool, initial_load: bool) -> SwitchOutcome {
        let start_at = {
            let mut guard = self.state();
            let state = &mut *guard;

            if !initial_load {
                state.persisted_seek = Duration::ZERO;
                self.persist(SnapshotPatch::seek(Duration::ZERO));
            }

            if !state.queue.contains(id) {
                debug!(track_id = %id, "switch target not queued");
                state
                    .pending_events
                    .push(SessionEvent::TrackNotFound { track_id: id });
                return SwitchOutcome::NotFound;
            }

            self.release_engine(state);

            let resume_at = state.persisted_seek;
            (initial_load && self.config.save_seek && !resume_at.is_zero()).then_some(resume_at)
        };

        let url = match self.resolver.resolve(id).await {
            Ok(Some(resolved)) if resolved.is_usable() => resolved.url,
            Ok(_) => {
                warn!(track_id = %id, "no playable url, skipping track");
                self.state()
                    .pending_events
                    .push(SessionEvent::TrackSkipped { track_id: id });
                return SwitchOutcome::Unplayable;
            }
            Err(e) => {
                warn!(track_id = %id, error = %e, "url resolution failed, skipping track");
                self.state()
                    .pending_events
                    .push(SessionEvent::TrackSkipped { track_id: id });
                return SwitchOutcome::Unplayable;
            }
        };

        let mut guard = self.state();
        let state = &mut *guard;

        // the queue may have changed while resolving
        let Some(track) = state.queue.find(id).cloned() else {
            debug!(track_id = %id, "track left the queue while resolving");
            state
                .pending_events
                .push(SessionEvent::TrackNotFound { track_id: id });
            return SwitchOutcome::NotFound;
        };

        let request = EngineRequest {
            source_url: url,
            volume: state.volume,
            muted: state.muted,
            autoplay,
            looping: false,
            start_at,
        };
        let sink = EngineEventSink::new(state.generation, self.engine_tx.clone());

        match self.engine.load(request, sink) {
            Ok(handle) => {
                let previous = (!state.current.is_sentinel()).then_some(state.current.id);

                state.handle = Some(handle);
                state.current = track.clone();
                self.persist(SnapshotPatch::current_track(track.clone()));
                self.set_playing(state, autoplay);

                state.pending_events.push(SessionEvent::TrackChanged {
                    track_id: id,
                    previous_track_id: previous,
                });
                info!(track_id = %id, name = %track.name, autoplay, "track loaded");

                SwitchOutcome::Switched(track)
            }
            Err(e) => {
                // silence anything the failed load emitted
                state.generation += 1;
                error!(track_id = %id, error = %e, "engine failed to load track");
                state.pending_events.push(SessionEvent::EngineFailed {
                    track_id: id,
                    message: e.to_string(),
                });
                SwitchOutcome::EngineFailed
            }
        }
    }

    /// Lyric fetch and surface updates once a switch has landed
    async fn after_switch(&self, track: Track) {
        let lyric = match self.resolver.fetch_lyric(track.id).await {
            Ok(lyric) => lyric.unwrap_or_default(),
            Err(e) => {
                debug!(track_id = %track.id, error = %e, "lyric fetch failed");
                Lyric::default()
            }
        };

        let duration = {
            let mut state = self.state();
            if state.current.id != track.id {
                return;
            }
            state.lyric = lyric;

            let duration = state
                .handle
                .as_ref()
                .map(|handle| handle.duration())
                .unwrap_or_default();
            self.persist(SnapshotPatch {
                duration: Some(duration.as_secs_f64()),
                ..SnapshotPatch::default()
            });
            duration
        };

        self.notify(PlayerNotification::UpdatePlaying(Some(NowPlaying::from(
            &track,
        ))));
        self.notify(PlayerNotification::Duration(duration));
    }

    /// Next entry after an unplayable one
    ///
    /// Single repeat steps forward like sequential so a dead track is not
    /// retried forever.
    fn skip_target(&self, dead: TrackId) -> Option<TrackId> {
        let state = self.state();
        let mode = match state.mode {
            PlaybackMode::SingleRepeat => PlaybackMode::Sequential,
            mode => mode,
        };

        let mut rng = rand::thread_rng();
        let advance = pick_advance(
            mode,
            Direction::Next,
            state.queue.position_of(dead),
            state.queue.len(),
            &mut rng,
        );

        match advance {
            Advance::Select(position) => state.queue.get(position).map(|track| track.id),
            Advance::Repeat | Advance::Rewind => None,
        }
    }

    // ===== Advance =====

    /// Advance according to the playback mode
    ///
    /// `force` advances sequentially whatever the mode is.
    pub async fn next(&self, force: bool) {
        self.advance(Direction::Next, force).await;
    }

    /// Step back according to the playback mode
    ///
    /// Random mode picks another random entry; there is no history.
    pub async fn prev(&self) {
        self.advance(Direction::Prev, false).await;
    }

    async fn advance(&self, direction: Direction, force: bool) {
        let target = {
            let mut guard = self.state();
            let state = &mut *guard;

            state.persisted_seek = Duration::ZERO;
            self.persist(SnapshotPatch::seek(Duration::ZERO));

            self.pick_target(state, direction, force)
        };

        if let Some(id) = target {
            self.set_current_track(id, true, false).await;
        }
    }

    /// Apply the mode decision; returns the id to switch to, if any
    fn pick_target(
        &self,
        state: &mut SessionState,
        direction: Direction,
        force: bool,
    ) -> Option<TrackId> {
        let mode = if force {
            PlaybackMode::Sequential
        } else {
            state.mode
        };
        let position = if state.current.is_sentinel() {
            None
        } else {
            state.queue.position_of(state.current.id)
        };

        let mut rng = rand::thread_rng();
        match pick_advance(mode, direction, position, state.queue.len(), &mut rng) {
            Advance::Repeat => {
                self.restart(state, true);
                None
            }
            Advance::Rewind => {
                self.restart(state, false);
                None
            }
            Advance::Select(index) => state.queue.get(index).map(|track| track.id),
        }
    }

    /// Seek the live handle to zero, optionally resuming it
    fn restart(&self, state: &mut SessionState, resume: bool) {
        let Some(handle) = state.handle.as_mut() else {
            return;
        };

        handle.set_seek(Duration::ZERO);
        if resume && !handle.is_playing() {
            handle.play();
            state.pending_pause = false;
            self.set_playing(state, true);
        }
    }

    // ===== Transport =====

    /// Start or resume playback
    ///
    /// No-op without a loaded track or when the engine is already playing.
    pub fn play(&self) {
        let mut guard = self.state();
        let state = &mut *guard;

        if state.current.is_sentinel() {
            return;
        }
        let Some(handle) = state.handle.as_mut() else {
            return;
        };
        if handle.is_playing() && !state.pending_pause {
            return;
        }

        match self.config.fade() {
            // cancel a fade-out that has not finished yet
            Some(fade) if state.pending_pause => {
                let from = handle.volume();
                handle.fade(from, state.volume, fade);
            }
            Some(fade) => {
                handle.set_volume(0.0);
                handle.play();
                handle.fade(0.0, state.volume, fade);
            }
            None => handle.play(),
        }

        state.pending_pause = false;
        self.set_playing(state, true);
    }

    /// Pause playback
    ///
    /// With fades enabled the engine keeps playing until the fade-out
    /// completes.
    pub fn pause(&self) {
        let mut guard = self.state();
        let state = &mut *guard;

        if state.current.is_sentinel() || state.pending_pause {
            return;
        }
        let Some(handle) = state.handle.as_mut() else {
            return;
        };
        if !handle.is_playing() {
            return;
        }

        let deferred = match self.config.fade() {
            Some(fade) => {
                let from = handle.volume();
                if handle.fade(from, 0.0, fade) {
                    true
                } else {
                    handle.pause();
                    handle.set_volume(state.volume);
                    false
                }
            }
            None => {
                handle.pause();
                false
            }
        };

        state.pending_pause = deferred;
        self.set_playing(state, false);
    }

    /// Move the engine to `position`
    pub fn set_seek(&self, position: Duration) {
        let mut guard = self.state();
        let state = &mut *guard;

        if let Some(handle) = state.handle.as_mut() {
            handle.set_seek(position);
        }
        state.persisted_seek = position;
        self.persist(SnapshotPatch::seek(position));
    }

    /// Engine position, zero without a handle
    pub fn seek(&self) -> Duration {
        self.state()
            .handle
            .as_ref()
            .map(|handle| handle.seek())
            .unwrap_or_default()
    }

    /// Length of the loaded track, zero without a handle
    pub fn duration(&self) -> Duration {
        self.state()
            .handle
            .as_ref()
            .map(|handle| handle.duration())
            .unwrap_or_default()
    }

    /// Whether the engine is audibly playing
    pub fn playing(&self) -> bool {
        let state = self.state();
        state
            .handle
            .as_ref()
            .is_some_and(|handle| handle.is_playing() && !state.pending_pause)
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    /// Store `volume` and forward it to the engine; the value is not clamped
    pub fn set_volume(&self, volume: f32) {
        let mut guard = self.state();
        let state = &mut *guard;

        state.volume = volume;
        if let Some(handle) = state.handle.as_mut() {
            handle.set_volume(volume);
        }
        self.persist(SnapshotPatch::volume(volume));
        state.pending_events.push(SessionEvent::VolumeChanged {
            volume,
            muted: state.muted,
        });
    }

    /// Engine mute state, `false` without a handle
    pub fn muted(&self) -> bool {
        self.state()
            .handle
            .as_ref()
            .is_some_and(|handle| handle.muted())
    }

    pub fn set_muted(&self, muted: bool) {
        let mut guard = self.state();
        let state = &mut *guard;

        state.muted = muted;
        if let Some(handle) = state.handle.as_mut() {
            handle.set_muted(muted);
        }
        self.persist(SnapshotPatch::muted(muted));
        state.pending_events.push(SessionEvent::VolumeChanged {
            volume: state.volume,
            muted,
        });
    }

    pub fn mode(&self) -> PlaybackMode {
        self.state().mode
    }

    pub fn set_mode(&self, mode: PlaybackMode) {
        let mut state = self.state();
        if state.mode == mode {
            return;
        }
        state.mode = mode;
        self.persist(SnapshotPatch::mode(mode));
        state.pending_events.push(SessionEvent::ModeChanged { mode });
        debug!(?mode, "playback mode changed");
    }

    /// Persist the engine position and track length
    ///
    /// Call periodically and before shutdown so [`resume`](Self::resume) can
    /// pick up where playback stopped.
    pub fn save_position(&self) {
        let mut guard = self.state();
        let state = &mut *guard;

        let Some(handle) = state.handle.as_ref() else {
            return;
        };
        let seek = handle.seek();
        let duration = handle.duration();

        state.persisted_seek = seek;
        self.persist(SnapshotPatch {
            seek: Some(seek.as_secs_f64()),
            duration: Some(duration.as_secs_f64()),
            ..SnapshotPatch::default()
        });
    }

    // ===== Read-only views =====

    pub fn queue(&self) -> Queue {
        self.state().queue.clone()
    }

    /// Current track, the sentinel when nothing is selected
    pub fn current_track(&self) -> Track {
        self.state().current.clone()
    }

    pub fn is_switching(&self) -> bool {
        self.switching.load(Ordering::Acquire)
    }

    /// Lyric line at the current engine position
    pub fn current_lyric(&self, kind: LyricKind) -> String {
        let state = self.state();
        let position = state
            .handle
            .as_ref()
            .map(|handle| handle.seek())
            .unwrap_or_default();
        state.lyric.line_at(kind, position)
    }

    // ===== Surfaces =====

    /// Re-broadcast everything a freshly opened surface needs
    pub fn sync_surfaces(&self) {
        let current = self.current_track();
        let now_playing = (!current.is_sentinel()).then(|| NowPlaying::from(&current));

        self.notify(PlayerNotification::UpdatePlaying(now_playing));
        self.notify(PlayerNotification::playback_state(self.playing()));
        self.notify(PlayerNotification::Duration(self.duration()));
        self.notify(PlayerNotification::Lyric(
            self.current_lyric(LyricKind::Original),
        ));
    }

    /// Apply a command from another window or a media key
    pub async fn dispatch(&self, command: SessionCommand) {
        debug!(?command, "dispatching command");
        match command {
            SessionCommand::TogglePlay => {
                if self.playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            SessionCommand::SetPlaying(true) => self.play(),
            SessionCommand::SetPlaying(false) => self.pause(),
            SessionCommand::SetVolume(volume) => self.set_volume(volume),
            SessionCommand::ToggleMute => {
                let muted = self.state().muted;
                self.set_muted(!muted);
            }
            SessionCommand::Next => self.next(false).await,
            SessionCommand::Prev => self.prev().await,
            SessionCommand::SetMode(mode) => self.set_mode(mode),
            SessionCommand::Seek(position) => self.set_seek(position),
        }
    }

    // ===== Engine events =====

    /// Handle every engine event received so far
    ///
    /// Returns the number of events taken off the channel. Returns 0 without
    /// waiting while [`run_engine_events`](Self::run_engine_events) owns the
    /// channel.
    pub async fn process_engine_events(&self) -> usize {
        let mut handled = 0;
        loop {
            let received = match self.engine_rx.try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                Err(_) => {
                    debug!("engine events are consumed by run_engine_events");
                    None
                }
            };
            let Some((generation, event)) = received else {
                break;
            };
            self.handle_engine_event(generation, event).await;
            handled += 1;
        }
        handled
    }

    /// Handle engine events as they arrive
    ///
    /// Runs for the lifetime of the session; spawn it next to the UI loop.
    /// Holds the event channel while running, so use either this or
    /// [`process_engine_events`](Self::process_engine_events), not both.
    pub async fn run_engine_events(&self) {
        loop {
            let received = {
                let mut rx = self.engine_rx.lock().await;
                rx.recv().await
            };
            match received {
                Some((generation, event)) => self.handle_engine_event(generation, event).await,
                None => break,
            }
        }
    }

    /// Handle one engine event
    ///
    /// Events from a released handle are ignored.
    pub async fn handle_engine_event(&self, generation: u64, event: EngineEvent) {
        let ended = {
            let mut guard = self.state();
            let state = &mut *guard;

            if generation != state.generation {
                debug!(
                    generation,
                    current = state.generation,
                    ?event,
                    "stale engine event ignored"
                );
                return;
            }

            match event {
                EngineEvent::Ended => true,
                EngineEvent::Played => {
                    if !state.pending_pause {
                        self.set_playing(state, true);
                    }
                    false
                }
                EngineEvent::Paused => {
                    self.set_playing(state, false);
                    false
                }
                EngineEvent::PlayError(message) => {
                    warn!(track_id = %state.current.id, %message, "engine could not play track");
                    state.pending_events.push(SessionEvent::PlayError {
                        track_id: state.current.id,
                        message,
                    });
                    self.set_playing(state, false);
                    false
                }
                EngineEvent::FadeComplete => {
                    if state.pending_pause {
                        state.pending_pause = false;
                        if let Some(handle) = state.handle.as_mut() {
                            handle.pause();
                            handle.set_volume(state.volume);
                        }
                    }
                    false
                }
            }
        };

        if ended {
            debug!("track ended, advancing");
            self.next(false).await;
        }
    }

    // ===== Events =====

    /// Take all recorded session events
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.state().pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.state().pending_events.is_empty()
    }

    // ===== Internals =====

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop and drop the live handle, silencing its event sink
    fn release_engine(&self, state: &mut SessionState) {
        if let Some(mut handle) = state.handle.take() {
            self.scrobble_outgoing(&state.current, handle.seek());
            handle.stop();
            handle.unload();
            debug!(track_id = %state.current.id, "engine handle released");
        }
        state.generation += 1;
        state.pending_pause = false;
        self.set_playing(state, false);
    }

    fn set_playing(&self, state: &mut SessionState, playing: bool) {
        if state.playing == playing {
            return;
        }
        state.playing = playing;
        state
            .pending_events
            .push(SessionEvent::PlaybackStateChanged { playing });
        self.notify(PlayerNotification::playback_state(playing));
    }

    fn scrobble_outgoing(&self, track: &Track, listened: Duration) {
        if !self.config.scrobble || track.is_sentinel() || listened.is_zero() {
            return;
        }
        let Some(scrobbler) = self.scrobbler.as_ref() else {
            return;
        };
        if let Err(e) = scrobbler.scrobble(track.id, track.source_tag, listened) {
            warn!(track_id = %track.id, error = %e, "scrobble failed");
        }
    }

    fn persist(&self, patch: SnapshotPatch) {
        if let Err(e) = self.store.save(patch) {
            warn!(error = %e, "failed to persist player state");
        }
    }

    fn notify(&self, notification: PlayerNotification) {
        let name = notification.name();
        if let Err(e) = self.notifier.broadcast(notification) {
            debug!(event = name, error = %e, "broadcast failed");
        }
    }
}
