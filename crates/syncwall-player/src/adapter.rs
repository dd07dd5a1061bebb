//! Playback adapter: one player slot bound to one manifest URL.
//!
//! The adapter owns the engine session for its slot and runs the state machine
//!
//! ```text
//! Uninitialized -> Loading -> Ready
//!                     \-> Error
//! (any) -> Destroyed
//! ```
//!
//! `Ready` is entered at most once per session. Re-attaching to a new URL tears
//! the old session down completely (engine destroyed, levels cleared, ready
//! latch reset) before the new engine is created, and bumps the session
//! generation so late events from the old engine are ignored.

use crate::engine::{
    EngineEvent, EngineFactory, EventSink, LevelSelector, PlaybackEngine, QualityLevel,
    SessionEvent,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle state of a [`PlaybackAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    Uninitialized,
    Loading,
    Ready,
    Error,
    Destroyed,
}

impl AdapterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterState::Uninitialized => "uninitialized",
            AdapterState::Loading => "loading",
            AdapterState::Ready => "ready",
            AdapterState::Error => "error",
            AdapterState::Destroyed => "destroyed",
        }
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view used to render a quality selection menu.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSnapshot {
    pub slot: usize,
    pub url: Option<String>,
    pub state: AdapterState,
    pub quality_levels: Vec<QualityLevel>,
    pub level_selector: LevelSelector,
    pub position: f64,
}

type ReadyCallback = Box<dyn FnMut(usize) + Send>;

/// Uniform control surface over one engine session.
pub struct PlaybackAdapter<F: EngineFactory> {
    slot: usize,
    factory: F,
    events: mpsc::UnboundedSender<SessionEvent>,
    generation: u64,
    state: AdapterState,
    url: Option<String>,
    engine: Option<F::Engine>,
    quality_levels: Vec<QualityLevel>,
    level_selector: LevelSelector,
    on_ready: Option<ReadyCallback>,
}

impl<F: EngineFactory> PlaybackAdapter<F> {
    /// Create an unbound adapter for `slot`. Engine events for every session
    /// this adapter opens are delivered to `events`.
    pub fn new(slot: usize, factory: F, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            slot,
            factory,
            events,
            generation: 0,
            state: AdapterState::Uninitialized,
            url: None,
            engine: None,
            quality_levels: Vec::new(),
            level_selector: LevelSelector::Auto,
            on_ready: None,
        }
    }

    /// Register the single-fire ready callback. It receives the adapter slot.
    pub fn set_ready_callback<C>(&mut self, callback: C)
    where
        C: FnMut(usize) + Send + 'static,
    {
        self.on_ready = Some(Box::new(callback));
    }

    /// Bind to `url`, replacing any existing session.
    pub fn attach(&mut self, url: &str) {
        self.teardown();

        self.generation += 1;
        let sink = EventSink::new(self.slot, self.generation, self.events.clone());
        let mut engine = self.factory.create(url);
        engine.load(url, sink);

        debug!(slot = self.slot, generation = self.generation, url, "Session loading");
        self.engine = Some(engine);
        self.url = Some(url.to_string());
        self.state = AdapterState::Loading;
    }

    /// Release the session for good (player unmounted).
    pub fn detach(&mut self) {
        self.teardown();
        self.generation += 1;
        self.url = None;
        self.state = AdapterState::Destroyed;
    }

    fn teardown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
            debug!(slot = self.slot, generation = self.generation, "Session destroyed");
        }
        self.quality_levels.clear();
        self.level_selector = LevelSelector::Auto;
        self.state = AdapterState::Uninitialized;
    }

    /// Apply an engine event. Returns `true` exactly when this event moved the
    /// adapter into `Ready`.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        if event.slot != self.slot || event.generation != self.generation {
            debug!(
                slot = self.slot,
                generation = event.generation,
                current = self.generation,
                "Dropping event from stale session"
            );
            return false;
        }

        match event.event {
            EngineEvent::ManifestParsed { levels } => {
                // levels follow every parse, only the ready transition is latched
                if matches!(self.state, AdapterState::Loading | AdapterState::Ready) {
                    self.quality_levels = levels;
                }
                self.mark_ready()
            }
            EngineEvent::MetadataLoaded => self.mark_ready(),
            EngineEvent::Error(err) => {
                if self.state == AdapterState::Loading {
                    warn!(slot = self.slot, url = ?self.url, "Playback failed: {}", err);
                    self.state = AdapterState::Error;
                } else {
                    warn!(slot = self.slot, url = ?self.url, "Playback error: {}", err);
                }
                false
            }
        }
    }

    fn mark_ready(&mut self) -> bool {
        if self.state != AdapterState::Loading {
            return false;
        }
        self.state = AdapterState::Ready;
        info!(
            slot = self.slot,
            levels = self.quality_levels.len(),
            "Player ready"
        );
        if let Some(callback) = self.on_ready.as_mut() {
            callback(self.slot);
        }
        true
    }

    pub fn play(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.play();
        }
    }

    pub fn pause(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
        }
    }

    /// Current position in seconds, `0.0` without a session.
    pub fn position(&self) -> f64 {
        self.engine.as_ref().map(|e| e.position()).unwrap_or(0.0)
    }

    /// Seek the session. Non-finite or negative targets are ignored.
    pub fn seek_to(&mut self, seconds: f64) {
        if !seconds.is_finite() || seconds < 0.0 {
            debug!(slot = self.slot, seconds, "Ignoring invalid seek target");
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.seek(seconds);
        }
    }

    /// Choose a quality level. An index outside the last known levels is a
    /// no-op.
    pub fn select_level(&mut self, selector: LevelSelector) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if let LevelSelector::Index(index) = selector {
            if index >= self.quality_levels.len() {
                debug!(
                    slot = self.slot,
                    index,
                    available = self.quality_levels.len(),
                    "Ignoring out of range level"
                );
                return;
            }
        }
        engine.set_level(selector);
        self.level_selector = selector;
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            slot: self.slot,
            url: self.url.clone(),
            state: self.state,
            quality_levels: self.quality_levels.clone(),
            level_selector: self.level_selector,
            position: self.position(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == AdapterState::Ready
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn quality_levels(&self) -> &[QualityLevel] {
        &self.quality_levels
    }

    pub fn level_selector(&self) -> LevelSelector {
        self.level_selector
    }
}

impl<F: EngineFactory> Drop for PlaybackAdapter<F> {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
    }
}

/// Parse operator input as a seek target. Anything that is not a finite,
/// non-negative number yields `None`.
pub fn parse_seek_target(input: &str) -> Option<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        log: Vec<String>,
        position: f64,
    }

    struct FakeEngine {
        calls: Arc<Mutex<Calls>>,
    }

    impl PlaybackEngine for FakeEngine {
        fn load(&mut self, url: &str, _sink: EventSink) {
            self.calls.lock().log.push(format!("load {}", url));
        }
        fn play(&mut self) {
            self.calls.lock().log.push("play".into());
        }
        fn pause(&mut self) {
            self.calls.lock().log.push("pause".into());
        }
        fn position(&self) -> f64 {
            self.calls.lock().position
        }
        fn seek(&mut self, seconds: f64) {
            let mut calls = self.calls.lock();
            calls.position = seconds;
            calls.log.push(format!("seek {}", seconds));
        }
        fn set_level(&mut self, selector: LevelSelector) {
            self.calls.lock().log.push(format!("level {}", selector));
        }
        fn destroy(&mut self) {
            self.calls.lock().log.push("destroy".into());
        }
    }

    type Factory = Box<dyn Fn(&str) -> FakeEngine + Send>;

    fn adapter() -> (
        PlaybackAdapter<Factory>,
        Arc<Mutex<Calls>>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let shared = calls.clone();
        let factory: Factory = Box::new(move |_url: &str| FakeEngine {
            calls: shared.clone(),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        (PlaybackAdapter::new(0, factory, tx), calls, rx)
    }

    fn event(adapter: &PlaybackAdapter<Factory>, event: EngineEvent) -> SessionEvent {
        SessionEvent {
            slot: adapter.slot(),
            generation: adapter.generation(),
            event,
        }
    }

    fn levels(n: usize) -> Vec<QualityLevel> {
        (0..n)
            .map(|i| QualityLevel::new(Some(360 * (i as u32 + 1)), Some(1_000_000)))
            .collect()
    }

    #[test]
    fn test_attach_enters_loading() {
        let (mut adapter, calls, _rx) = adapter();
        assert_eq!(adapter.state(), AdapterState::Uninitialized);

        adapter.attach("http://host/hls/stream1/index.m3u8");
        assert_eq!(adapter.state(), AdapterState::Loading);
        assert_eq!(calls.lock().log, vec!["load http://host/hls/stream1/index.m3u8"]);
    }

    #[test]
    fn test_ready_fires_once() {
        let (mut adapter, _calls, _rx) = adapter();
        let fired = Arc::new(Mutex::new(0));
        let counter = fired.clone();
        adapter.set_ready_callback(move |_| *counter.lock() += 1);
        adapter.attach("u");

        let first = event(&adapter, EngineEvent::ManifestParsed { levels: levels(2) });
        let second = event(&adapter, EngineEvent::ManifestParsed { levels: levels(3) });
        assert!(adapter.handle_event(first));
        assert!(!adapter.handle_event(second));

        assert_eq!(*fired.lock(), 1);
        assert!(adapter.is_ready());
        assert_eq!(adapter.quality_levels().len(), 3);
    }

    #[test]
    fn test_reparse_updates_selectable_levels() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.attach("u");

        let first = event(&adapter, EngineEvent::ManifestParsed { levels: levels(2) });
        assert!(adapter.handle_event(first));
        adapter.select_level(LevelSelector::Index(2));
        assert_eq!(adapter.level_selector(), LevelSelector::Auto);

        let second = event(&adapter, EngineEvent::ManifestParsed { levels: levels(3) });
        assert!(!adapter.handle_event(second));
        adapter.select_level(LevelSelector::Index(2));

        assert_eq!(adapter.level_selector(), LevelSelector::Index(2));
        assert_eq!(calls.lock().log.last().unwrap(), "level 2");
        assert_eq!(adapter.state(), AdapterState::Ready);
    }

    #[test]
    fn test_metadata_loaded_counts_as_ready() {
        let (mut adapter, _calls, _rx) = adapter();
        adapter.attach("http://host/video.mp4");

        let ev = event(&adapter, EngineEvent::MetadataLoaded);
        assert!(adapter.handle_event(ev));
        assert!(adapter.quality_levels().is_empty());
    }

    #[test]
    fn test_error_while_loading_is_terminal() {
        let (mut adapter, _calls, _rx) = adapter();
        adapter.attach("u");

        let err = event(&adapter, EngineEvent::Error(PlayerError::decode("garbage")));
        assert!(!adapter.handle_event(err));
        assert_eq!(adapter.state(), AdapterState::Error);

        let late = event(&adapter, EngineEvent::ManifestParsed { levels: levels(1) });
        assert!(!adapter.handle_event(late));
        assert_eq!(adapter.state(), AdapterState::Error);
    }

    #[test]
    fn test_stale_session_events_dropped() {
        let (mut adapter, _calls, _rx) = adapter();
        adapter.attach("first");
        let stale = event(&adapter, EngineEvent::ManifestParsed { levels: levels(2) });

        adapter.attach("second");
        assert!(!adapter.handle_event(stale));
        assert_eq!(adapter.state(), AdapterState::Loading);
        assert!(adapter.quality_levels().is_empty());
    }

    #[test]
    fn test_reattach_resets_session() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.attach("first");
        let ev = event(&adapter, EngineEvent::ManifestParsed { levels: levels(3) });
        adapter.handle_event(ev);
        adapter.select_level(LevelSelector::Index(2));

        adapter.attach("second");
        assert_eq!(adapter.state(), AdapterState::Loading);
        assert!(adapter.quality_levels().is_empty());
        assert_eq!(adapter.level_selector(), LevelSelector::Auto);

        let log = calls.lock().log.clone();
        let destroy = log.iter().position(|c| c == "destroy").unwrap();
        let load = log.iter().position(|c| c == "load second").unwrap();
        assert!(destroy < load);
    }

    #[test]
    fn test_detach_destroys() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.attach("u");
        adapter.detach();

        assert_eq!(adapter.state(), AdapterState::Destroyed);
        assert!(adapter.url().is_none());
        assert_eq!(calls.lock().log.last().unwrap(), "destroy");
        assert_eq!(adapter.position(), 0.0);
    }

    #[test]
    fn test_controls_without_session_are_noops() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.play();
        adapter.pause();
        adapter.seek_to(10.0);
        adapter.select_level(LevelSelector::Auto);

        assert_eq!(adapter.position(), 0.0);
        assert!(calls.lock().log.is_empty());
    }

    #[test]
    fn test_invalid_seek_ignored() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.attach("u");
        adapter.seek_to(12.0);

        adapter.seek_to(f64::NAN);
        adapter.seek_to(f64::INFINITY);
        adapter.seek_to(-1.0);

        assert_eq!(adapter.position(), 12.0);
        let seeks = calls.lock().log.iter().filter(|c| c.starts_with("seek")).count();
        assert_eq!(seeks, 1);
    }

    #[test]
    fn test_select_level_bounds() {
        let (mut adapter, calls, _rx) = adapter();
        adapter.attach("u");
        let ev = event(&adapter, EngineEvent::ManifestParsed { levels: levels(2) });
        adapter.handle_event(ev);

        adapter.select_level(LevelSelector::Index(1));
        assert_eq!(adapter.level_selector(), LevelSelector::Index(1));

        adapter.select_level(LevelSelector::Index(2));
        assert_eq!(adapter.level_selector(), LevelSelector::Index(1));

        adapter.select_level(LevelSelector::Auto);
        assert_eq!(adapter.level_selector(), LevelSelector::Auto);

        let level_calls: Vec<_> = calls
            .lock()
            .log
            .iter()
            .filter(|c| c.starts_with("level"))
            .cloned()
            .collect();
        assert_eq!(level_calls, vec!["level 1", "level auto"]);
    }

    #[test]
    fn test_snapshot() {
        let (mut adapter, _calls, _rx) = adapter();
        adapter.attach("u");
        let ev = event(&adapter, EngineEvent::ManifestParsed { levels: levels(2) });
        adapter.handle_event(ev);

        let snapshot = adapter.snapshot();
        assert_eq!(snapshot.state, AdapterState::Ready);
        assert_eq!(snapshot.quality_levels.len(), 2);
        assert_eq!(snapshot.level_selector, LevelSelector::Auto);
        assert_eq!(snapshot.url.as_deref(), Some("u"));
    }

    #[test]
    fn test_parse_seek_target() {
        assert_eq!(parse_seek_target("12.5"), Some(12.5));
        assert_eq!(parse_seek_target(" 3 "), Some(3.0));
        assert_eq!(parse_seek_target("x"), None);
        assert_eq!(parse_seek_target("NaN"), None);
        assert_eq!(parse_seek_target("inf"), None);
        assert_eq!(parse_seek_target("-4"), None);
    }
}
