//! Playback engine capability contract.
//!
//! An engine is the decoding/adaptive-streaming client a [`PlaybackAdapter`]
//! drives. Engines report asynchronous progress (manifest parsed, metadata
//! loaded, errors) by pushing [`SessionEvent`]s into an [`EventSink`]; they are
//! never polled for it.
//!
//! [`PlaybackAdapter`]: crate::PlaybackAdapter

use crate::error::PlayerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

/// One encoded variant of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityLevel {
    /// Frame height in pixels, when the manifest advertises a resolution.
    pub height: Option<u32>,
    /// Peak bitrate in bits per second, when advertised.
    pub bitrate: Option<u64>,
}

impl QualityLevel {
    pub fn new(height: Option<u32>, bitrate: Option<u64>) -> Self {
        Self { height, bitrate }
    }

    /// Human readable label for selection menus ("720p", "2.5 Mbps", "source").
    pub fn label(&self) -> String {
        match (self.height, self.bitrate) {
            (Some(h), _) => format!("{}p", h),
            (None, Some(b)) => format!("{:.1} Mbps", b as f64 / 1_000_000.0),
            (None, None) => "source".to_string(),
        }
    }
}

/// Which quality level playback should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelSelector {
    /// Let the engine's adaptive logic decide.
    #[default]
    Auto,
    /// Pin playback to the level at this index.
    Index(usize),
}

impl fmt::Display for LevelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelSelector::Auto => write!(f, "auto"),
            LevelSelector::Index(i) => write!(f, "{}", i),
        }
    }
}

impl FromStr for LevelSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") || s == "-1" {
            return Ok(LevelSelector::Auto);
        }
        s.parse::<usize>()
            .map(LevelSelector::Index)
            .map_err(|_| format!("Invalid level selector: {}", s))
    }
}

/// Progress reported by an engine for the session it was loaded with.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The manifest was parsed and the available quality levels are known.
    ManifestParsed { levels: Vec<QualityLevel> },
    /// Direct playback loaded enough metadata to start; no level introspection.
    MetadataLoaded,
    /// Transport or parse failure.
    Error(PlayerError),
}

/// An [`EngineEvent`] tagged with the adapter slot and session generation that
/// produced it.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub slot: usize,
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sender half handed to an engine when it is loaded.
///
/// Every event is stamped with the generation of the session the sink was
/// created for, so events emitted by a torn-down session can be recognised and
/// dropped by the adapter.
#[derive(Debug, Clone)]
pub struct EventSink {
    slot: usize,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(slot: usize, generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            slot,
            generation,
            tx,
        }
    }

    /// Push an event. Returns `false` if nobody is listening any more.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SessionEvent {
                slot: self.slot,
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Imperative control surface of a decoding session.
///
/// `load` is called exactly once per engine instance; after `destroy` the
/// instance is discarded. Positions are in seconds.
pub trait PlaybackEngine: Send {
    /// Bind to `url` and start loading. Progress is reported through `sink`.
    fn load(&mut self, url: &str, sink: EventSink);

    fn play(&mut self);

    fn pause(&mut self);

    /// Current playback position in seconds.
    fn position(&self) -> f64;

    fn seek(&mut self, seconds: f64);

    fn set_level(&mut self, selector: LevelSelector);

    /// Stop all network activity and release the session.
    fn destroy(&mut self);
}

/// Creates a fresh engine for each session an adapter opens.
pub trait EngineFactory: Send {
    type Engine: PlaybackEngine;

    fn create(&self, url: &str) -> Self::Engine;
}

impl<F, E> EngineFactory for F
where
    F: Fn(&str) -> E + Send,
    E: PlaybackEngine,
{
    type Engine = E;

    fn create(&self, url: &str) -> E {
        self(url)
    }
}
