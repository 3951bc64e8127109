//! Shared fakes for session tests

use async_trait::async_trait;
use cloubit_playback::{
    Collaborators, EngineEvent, EngineEventSink, EngineHandle, EngineRequest, Lyric,
    MemoryStore, Notifier, PlaybackEngine, PlaybackError, PlaybackSession, PlayerNotification,
    ResolvedUrl, Result, Scrobbler, SessionConfig, SessionEvent, Snapshot, SnapshotPatch,
    StateStore, Track, TrackId, TrackUrlResolver,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TRACK_LENGTH: Duration = Duration::from_secs(180);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cloubit_playback=debug")
        .with_test_writer()
        .try_init();
}

pub fn track(id: u64) -> Track {
    Track::new(id, format!("Track {}", id)).with_artists(["Test Artist"])
}

// ===== Engine =====

/// Observable state of one fake handle
#[derive(Debug)]
pub struct HandleState {
    pub request: EngineRequest,
    pub playing: bool,
    pub position: Duration,
    pub volume: f32,
    pub muted: bool,
    pub unloaded: bool,
    pub fades: Vec<(f32, f32)>,
}

#[derive(Default)]
struct EngineLog {
    live: usize,
    max_live: usize,
    handles: Vec<Arc<Mutex<HandleState>>>,
    sinks: Vec<EngineEventSink>,
    failing_urls: HashSet<String>,
    emit_before_failing: bool,
}

/// Engine that plays nothing and counts live handles
#[derive(Default)]
pub struct FakeEngine {
    log: Arc<Mutex<EngineLog>>,
    async_fades: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fades report `FadeComplete` instead of finishing immediately
    pub fn with_async_fades() -> Self {
        Self {
            async_fades: true,
            ..Self::default()
        }
    }

    pub fn fail_url(&self, url: &str) {
        self.log.lock().unwrap().failing_urls.insert(url.to_string());
    }

    /// Failing loads report `Played` and `Ended` on their sink first
    pub fn emit_before_failing(&self) {
        self.log.lock().unwrap().emit_before_failing = true;
    }

    pub fn live_handles(&self) -> usize {
        self.log.lock().unwrap().live
    }

    pub fn max_live_handles(&self) -> usize {
        self.log.lock().unwrap().max_live
    }

    pub fn loads(&self) -> usize {
        self.log.lock().unwrap().handles.len()
    }

    /// Most recently loaded handle
    pub fn current(&self) -> Arc<Mutex<HandleState>> {
        Arc::clone(self.log.lock().unwrap().handles.last().expect("no handle loaded"))
    }

    /// Event sink of the most recently loaded handle
    pub fn current_sink(&self) -> EngineEventSink {
        self.log.lock().unwrap().sinks.last().expect("no handle loaded").clone()
    }

    /// Report that the current handle reached the end of its source
    pub fn finish_current(&self) {
        let handle = self.current();
        handle.lock().unwrap().playing = false;
        self.current_sink().emit(EngineEvent::Ended);
    }

    pub fn set_position(&self, position: Duration) {
        self.current().lock().unwrap().position = position;
    }
}

impl PlaybackEngine for FakeEngine {
    fn load(
        &self,
        request: EngineRequest,
        events: EngineEventSink,
    ) -> Result<Box<dyn EngineHandle>> {
        let mut log = self.log.lock().unwrap();
        if log.failing_urls.contains(&request.source_url) {
            if log.emit_before_failing {
                events.emit(EngineEvent::Played);
                events.emit(EngineEvent::Ended);
            }
            return Err(PlaybackError::engine("unsupported source"));
        }

        let state = Arc::new(Mutex::new(HandleState {
            playing: request.autoplay,
            position: request.start_at.unwrap_or_default(),
            volume: request.volume,
            muted: request.muted,
            unloaded: false,
            fades: Vec::new(),
            request: request.clone(),
        }));

        if request.autoplay {
            events.emit(EngineEvent::Played);
        }

        log.live += 1;
        log.max_live = log.max_live.max(log.live);
        log.handles.push(Arc::clone(&state));
        log.sinks.push(events.clone());

        Ok(Box::new(FakeHandle {
            state,
            log: Arc::clone(&self.log),
            events,
            async_fades: self.async_fades,
        }))
    }
}

struct FakeHandle {
    state: Arc<Mutex<HandleState>>,
    log: Arc<Mutex<EngineLog>>,
    events: EngineEventSink,
    async_fades: bool,
}

impl EngineHandle for FakeHandle {
    fn play(&mut self) {
        self.state.lock().unwrap().playing = true;
        self.events.emit(EngineEvent::Played);
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().playing = false;
        self.events.emit(EngineEvent::Paused);
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.playing = false;
        state.position = Duration::ZERO;
    }

    fn unload(&mut self) {
        let mut state = self.state.lock().unwrap();
        if !state.unloaded {
            state.unloaded = true;
            self.log.lock().unwrap().live -= 1;
        }
    }

    fn seek(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn set_seek(&mut self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn duration(&self) -> Duration {
        TRACK_LENGTH
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn fade(&mut self, from: f32, to: f32, _duration: Duration) -> bool {
        let mut state = self.state.lock().unwrap();
        state.fades.push((from, to));
        state.volume = to;
        self.async_fades
    }
}

// ===== Resolver =====

/// Resolver with per-track dead/failing ids and lyrics
///
/// Every call yields once before answering so concurrent switches interleave.
#[derive(Default)]
pub struct ScriptedResolver {
    dead: Mutex<HashSet<TrackId>>,
    failing: Mutex<HashSet<TrackId>>,
    lyrics: Mutex<HashMap<TrackId, Lyric>>,
    calls: Mutex<Vec<TrackId>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `resolve` returns no URL for this id
    pub fn kill(&self, id: u64) {
        self.dead.lock().unwrap().insert(TrackId(id));
    }

    /// `resolve` returns an error for this id
    pub fn fail(&self, id: u64) {
        self.failing.lock().unwrap().insert(TrackId(id));
    }

    pub fn set_lyric(&self, id: u64, lyric: Lyric) {
        self.lyrics.lock().unwrap().insert(TrackId(id), lyric);
    }

    pub fn calls(&self) -> Vec<TrackId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn url_for(id: u64) -> String {
        format!("https://cdn.test/{}.mp3", id)
    }
}

#[async_trait]
impl TrackUrlResolver for ScriptedResolver {
    async fn resolve(&self, id: TrackId) -> Result<Option<ResolvedUrl>> {
        self.calls.lock().unwrap().push(id);
        tokio::task::yield_now().await;

        if self.failing.lock().unwrap().contains(&id) {
            return Err(PlaybackError::resolver("503 from song/url"));
        }
        if self.dead.lock().unwrap().contains(&id) {
            return Ok(None);
        }
        Ok(Some(ResolvedUrl::new(Self::url_for(id.get()))))
    }

    async fn fetch_lyric(&self, id: TrackId) -> Result<Option<Lyric>> {
        Ok(self.lyrics.lock().unwrap().get(&id).cloned())
    }
}

// ===== Store =====

/// In-memory store that counts writes
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    saves: Mutex<usize>,
}

impl CountingStore {
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl StateStore for CountingStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        self.inner.load()
    }

    fn save(&self, patch: SnapshotPatch) -> Result<()> {
        *self.saves.lock().unwrap() += 1;
        self.inner.save(patch)
    }
}

// ===== Notifier / scrobbler =====

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<PlayerNotification>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<PlayerNotification> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|n| n.name()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn broadcast(&self, notification: PlayerNotification) -> Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScrobbler {
    reports: Mutex<Vec<(TrackId, i32, Duration)>>,
}

impl RecordingScrobbler {
    pub fn reports(&self) -> Vec<(TrackId, i32, Duration)> {
        self.reports.lock().unwrap().clone()
    }
}

impl Scrobbler for RecordingScrobbler {
    fn scrobble(&self, id: TrackId, source_tag: i32, listened: Duration) -> Result<()> {
        self.reports.lock().unwrap().push((id, source_tag, listened));
        Ok(())
    }
}

// ===== Harness =====

pub struct Harness {
    pub session: PlaybackSession,
    pub engine: Arc<FakeEngine>,
    pub resolver: Arc<ScriptedResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub scrobbler: Arc<RecordingScrobbler>,
}

pub struct HarnessBuilder {
    config: SessionConfig,
    engine: FakeEngine,
    resolver: ScriptedResolver,
    store: Arc<dyn StateStore>,
}

impl HarnessBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, engine: FakeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn resolver(mut self, resolver: ScriptedResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn build(self) -> Harness {
        init_tracing();

        let engine = Arc::new(self.engine);
        let resolver = Arc::new(self.resolver);
        let notifier = Arc::new(RecordingNotifier::default());
        let scrobbler = Arc::new(RecordingScrobbler::default());

        let collaborators = Collaborators::new(resolver.clone(), engine.clone())
            .with_store(self.store)
            .with_notifier(notifier.clone())
            .with_scrobbler(scrobbler.clone());

        let session = PlaybackSession::new(self.config, collaborators).unwrap();

        Harness {
            session,
            engine,
            resolver,
            notifier,
            scrobbler,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            config: SessionConfig::default(),
            engine: FakeEngine::new(),
            resolver: ScriptedResolver::new(),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// Session with tracks `ids` queued
    pub fn with_queue(ids: &[u64]) -> Self {
        let harness = Self::new();
        harness.enqueue(ids);
        harness
    }

    pub fn enqueue(&self, ids: &[u64]) {
        for &id in ids {
            self.session.add_to_queue(track(id));
        }
    }

    pub fn current_id(&self) -> u64 {
        self.session.current_track().id.get()
    }

    pub fn queue_ids(&self) -> Vec<u64> {
        self.session
            .queue()
            .entries()
            .iter()
            .map(|t| t.id.get())
            .collect()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.session.drain_events()
    }
}
