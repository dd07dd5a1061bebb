//! Headless HLS engine.
//!
//! Implements [`PlaybackEngine`] without a rendering surface: the manifest is
//! fetched and parsed to learn the quality levels, live media playlists are
//! refreshed to follow the rolling window, and position is tracked by a
//! wall-clock [`PlaybackClock`]. This is what the terminal dashboard uses to
//! drive the synchronization protocol against a running server.
//!
//! Engines spawn their loader on the current Tokio runtime, so `load` must be
//! called from within one.

use crate::engine::{EngineEvent, EventSink, LevelSelector, PlaybackEngine, QualityLevel};
use crate::error::{PlayerError, Result};
use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Segments a live player stays behind the newest one on first load.
const LIVE_EDGE_SEGMENTS: f64 = 3.0;

/// How a URL is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStrategy {
    /// Full adaptive client: parses the manifest and exposes quality levels.
    Adaptive,
    /// Direct URL playback: readiness means "metadata loaded", no levels.
    Direct,
}

impl EngineStrategy {
    /// Pick a strategy from the URL: HLS manifests get the adaptive client.
    pub fn detect(url: &str) -> Self {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        if path.to_ascii_lowercase().ends_with(".m3u8") {
            EngineStrategy::Adaptive
        } else {
            EngineStrategy::Direct
        }
    }
}

impl FromStr for EngineStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adaptive" | "hls" => Ok(EngineStrategy::Adaptive),
            "direct" | "native" => Ok(EngineStrategy::Direct),
            other => Err(format!("Unknown playback strategy: {}", other)),
        }
    }
}

/// Headless engine settings.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Timeout for each manifest/playlist request.
    pub request_timeout: Duration,
    /// Lower bound on the live playlist refresh interval.
    pub min_refresh: Duration,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            min_refresh: Duration::from_secs(1),
        }
    }
}

/// Wall-clock playback position.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    base: f64,
    started_at: Option<Instant>,
    positioned: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f64 {
        match self.started_at {
            Some(started) => self.base + started.elapsed().as_secs_f64(),
            None => self.base,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn play(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        self.base = self.position();
        self.started_at = None;
    }

    pub fn seek(&mut self, seconds: f64) {
        self.base = seconds;
        self.positioned = true;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Set the start position unless playback or a seek already placed it.
    fn place(&mut self, seconds: f64) {
        if !self.positioned && self.started_at.is_none() {
            self.base = seconds;
            self.positioned = true;
        }
    }
}

#[derive(Debug, Clone)]
struct Variant {
    uri: Url,
    level: QualityLevel,
}

#[derive(Debug, Default)]
struct Shared {
    clock: PlaybackClock,
    variants: Vec<Variant>,
    selector: LevelSelector,
}

impl Shared {
    fn media_url(&self, fallback: &Url) -> Url {
        let index = match self.selector {
            LevelSelector::Auto => 0,
            LevelSelector::Index(i) => i,
        };
        self.variants
            .get(index)
            .or_else(|| self.variants.first())
            .map(|v| v.uri.clone())
            .unwrap_or_else(|| fallback.clone())
    }
}

/// [`PlaybackEngine`] backed by `reqwest` and `m3u8-rs`.
pub struct HeadlessHlsEngine {
    client: reqwest::Client,
    strategy: EngineStrategy,
    config: HeadlessConfig,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl HeadlessHlsEngine {
    pub fn new(client: reqwest::Client, strategy: EngineStrategy, config: HeadlessConfig) -> Self {
        Self {
            client,
            strategy,
            config,
            shared: Arc::new(Mutex::new(Shared::default())),
            task: None,
        }
    }

    pub fn strategy(&self) -> EngineStrategy {
        self.strategy
    }
}

impl PlaybackEngine for HeadlessHlsEngine {
    fn load(&mut self, url: &str, sink: EventSink) {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                sink.emit(EngineEvent::Error(PlayerError::transport(format!(
                    "Invalid URL {}: {}",
                    url, e
                ))));
                return;
            }
        };

        let loader = Loader {
            client: self.client.clone(),
            config: self.config.clone(),
            shared: self.shared.clone(),
            sink,
        };
        let task = match self.strategy {
            EngineStrategy::Adaptive => tokio::spawn(loader.run_adaptive(url)),
            EngineStrategy::Direct => tokio::spawn(loader.run_direct(url)),
        };
        self.task = Some(task);
    }

    fn play(&mut self) {
        self.shared.lock().clock.play();
    }

    fn pause(&mut self) {
        self.shared.lock().clock.pause();
    }

    fn position(&self) -> f64 {
        self.shared.lock().clock.position()
    }

    fn seek(&mut self, seconds: f64) {
        self.shared.lock().clock.seek(seconds);
    }

    fn set_level(&mut self, selector: LevelSelector) {
        self.shared.lock().selector = selector;
    }

    fn destroy(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let mut shared = self.shared.lock();
        shared.clock.pause();
        shared.variants.clear();
    }
}

impl Drop for HeadlessHlsEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Loader {
    client: reqwest::Client,
    config: HeadlessConfig,
    shared: Arc<Mutex<Shared>>,
    sink: EventSink,
}

impl Loader {
    async fn run_direct(self, url: Url) {
        let result = self
            .client
            .get(url.clone())
            .timeout(self.config.request_timeout)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                self.sink.emit(EngineEvent::MetadataLoaded);
            }
            Ok(resp) => {
                self.sink.emit(EngineEvent::Error(PlayerError::transport(format!(
                    "Failed to fetch {}: HTTP {}",
                    url,
                    resp.status()
                ))));
            }
            Err(e) => {
                self.sink.emit(EngineEvent::Error(e.into()));
            }
        }
    }

    async fn run_adaptive(self, url: Url) {
        let playlist = match self.fetch(&url).await {
            Ok(playlist) => playlist,
            Err(e) => {
                self.sink.emit(EngineEvent::Error(e));
                return;
            }
        };

        let (levels, media) = match playlist {
            Playlist::MasterPlaylist(master) => {
                let variants = variants_from_master(&master, &url);
                if variants.is_empty() {
                    self.sink.emit(EngineEvent::Error(PlayerError::decode(format!(
                        "Master playlist {} has no playable variants",
                        url
                    ))));
                    return;
                }
                let levels: Vec<QualityLevel> = variants.iter().map(|v| v.level).collect();
                let media_url = {
                    let mut shared = self.shared.lock();
                    shared.variants = variants;
                    shared.media_url(&url)
                };

                // the live window comes from the variant, not the master
                match self.fetch(&media_url).await {
                    Ok(Playlist::MediaPlaylist(media)) => (levels, media),
                    Ok(Playlist::MasterPlaylist(_)) => {
                        self.sink.emit(EngineEvent::Error(PlayerError::decode(format!(
                            "Variant {} is not a media playlist",
                            media_url
                        ))));
                        return;
                    }
                    Err(e) => {
                        self.sink.emit(EngineEvent::Error(e));
                        return;
                    }
                }
            }
            Playlist::MediaPlaylist(media) => (vec![QualityLevel::default()], media),
        };

        self.shared.lock().clock.place(live_start_position(&media));
        self.sink.emit(EngineEvent::ManifestParsed { levels });
        if media.end_list {
            return;
        }
        self.follow_live(&url, refresh_interval(&media, self.config.min_refresh))
            .await;
    }

    /// Refresh the selected media playlist until it ends or the task is
    /// aborted.
    async fn follow_live(&self, manifest_url: &Url, mut delay: Duration) {
        loop {
            tokio::time::sleep(delay).await;
            let media_url = self.shared.lock().media_url(manifest_url);
            match self.fetch(&media_url).await {
                Ok(Playlist::MediaPlaylist(media)) => {
                    self.shared.lock().clock.place(live_start_position(&media));
                    if media.end_list {
                        debug!(url = %media_url, "Playlist ended");
                        return;
                    }
                    delay = refresh_interval(&media, self.config.min_refresh);
                }
                Ok(Playlist::MasterPlaylist(_)) => {
                    warn!(url = %media_url, "Expected media playlist, got master playlist");
                    return;
                }
                Err(e) => {
                    warn!(url = %media_url, "Playlist refresh failed: {}", e);
                }
            }
        }
    }

    async fn fetch(&self, url: &Url) -> Result<Playlist> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(PlayerError::transport(format!(
                "Failed to fetch playlist {}: HTTP {}",
                url,
                resp.status()
            )));
        }
        let bytes = resp.bytes().await?;
        parse_playlist(&bytes)
    }
}

/// Parse an M3U8 document.
pub fn parse_playlist(bytes: &[u8]) -> Result<Playlist> {
    m3u8_rs::parse_playlist_res(bytes)
        .map_err(|e| PlayerError::decode(format!("Failed to parse playlist: {}", e)))
}

fn level_of(variant: &m3u8_rs::VariantStream) -> QualityLevel {
    QualityLevel {
        height: variant.resolution.as_ref().map(|r| r.height as u32),
        bitrate: Some(variant.bandwidth),
    }
}

fn variants_from_master(master: &MasterPlaylist, base: &Url) -> Vec<Variant> {
    master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .filter_map(|v| match base.join(&v.uri) {
            Ok(uri) => Some(Variant {
                uri,
                level: level_of(v),
            }),
            Err(e) => {
                warn!(uri = %v.uri, "Skipping variant with bad URI: {}", e);
                None
            }
        })
        .collect()
}

/// Where a live player starts: a few segments behind the newest one, measured
/// from the start of the stream.
pub fn live_start_position(media: &MediaPlaylist) -> f64 {
    let target = media.target_duration as f64;
    let window_start = media.media_sequence as f64 * target;
    let window_len: f64 = media.segments.iter().map(|s| s.duration as f64).sum();
    if media.end_list {
        return window_start;
    }
    window_start + (window_len - LIVE_EDGE_SEGMENTS * target).max(0.0)
}

fn refresh_interval(media: &MediaPlaylist, min: Duration) -> Duration {
    Duration::from_secs_f64(media.target_duration as f64 / 2.0).max(min)
}
