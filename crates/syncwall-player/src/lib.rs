//! Syncwall-Player: playback adapters and synchronized multi-player control.
//!
//! This crate models the player side of a syncwall dashboard:
//!
//! - **Engines**: the [`PlaybackEngine`] capability trait, implemented by the
//!   [`HeadlessHlsEngine`] for terminal hosts
//! - **Adapters**: [`PlaybackAdapter`] wraps one engine session per player slot
//!   with a latched ready transition
//! - **Synchronization**: [`SyncController`] holds the adapters, waits for the
//!   readiness barrier and aligns every player to one reference position
//!
//! All adapter and controller state is mutated from one task. Engines report
//! progress through a shared channel of [`SessionEvent`]s which that task feeds
//! into [`SyncController::dispatch`].
//!
//! # Examples
//!
//! ```no_run
//! use syncwall_player::{
//!     EngineStrategy, HeadlessConfig, HeadlessHlsEngine, PlaybackAdapter, SyncController,
//! };
//! use tokio::sync::mpsc;
//!
//! # async fn run() {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let client = reqwest::Client::new();
//! let mut controller = SyncController::new();
//!
//! for (slot, url) in ["http://localhost:8080/hls/stream1/index.m3u8"].iter().enumerate() {
//!     let client = client.clone();
//!     let factory = move |url: &str| {
//!         HeadlessHlsEngine::new(client.clone(), EngineStrategy::detect(url), HeadlessConfig::default())
//!     };
//!     let mut adapter = PlaybackAdapter::new(slot, factory, tx.clone());
//!     adapter.attach(url);
//!     controller.register(adapter);
//! }
//!
//! controller.arm();
//! while let Some(event) = rx.recv().await {
//!     if let Some(alignment) = controller.dispatch(event) {
//!         println!("aligned at {:.2}s", alignment.reference_position);
//!     }
//! }
//! # }
//! ```

pub mod adapter;
pub mod engine;
pub mod error;
pub mod headless;
pub mod sync;

pub use adapter::{parse_seek_target, AdapterState, PlaybackAdapter, PlaybackSnapshot};
pub use engine::{
    EngineEvent, EngineFactory, EventSink, LevelSelector, PlaybackEngine, QualityLevel,
    SessionEvent,
};
pub use error::{PlayerError, Result};
pub use headless::{EngineStrategy, HeadlessConfig, HeadlessHlsEngine, PlaybackClock};
pub use sync::{Alignment, SyncController, SyncState, SyncTarget};
