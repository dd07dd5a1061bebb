//! Headless dashboard.
//!
//! Terminal counterpart of the browser wall: fetches the stream list from a
//! running server, opens one playback adapter per stream, and runs the
//! synchronization controller. Engine events, operator commands (stdin) and a
//! periodic status line are all handled on a single task, so adapter and
//! controller state is never touched concurrently.

use crate::config::{PlaybackStrategy, PlayerConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use syncwall_player::{
    parse_seek_target, Alignment, EngineFactory, EngineStrategy, HeadlessConfig,
    HeadlessHlsEngine, LevelSelector, PlaybackAdapter, SessionEvent, SyncController,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

/// One entry of the server's `/streams` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    streams: Vec<StreamEntry>,
}

/// Fetch the stream listing from `server` (e.g. `http://localhost:8080`).
pub async fn fetch_streams(client: &reqwest::Client, server: &str) -> Result<Vec<StreamEntry>> {
    let url = format!("{}/streams", server.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?
        .error_for_status()
        .with_context(|| format!("Stream listing failed: {}", url))?;

    let body: StreamsResponse = response
        .json()
        .await
        .context("Invalid stream listing")?;
    Ok(body.streams)
}

/// Builds headless engines for the dashboard's adapters.
#[derive(Clone)]
pub struct HeadlessFactory {
    client: reqwest::Client,
    strategy: PlaybackStrategy,
    config: HeadlessConfig,
}

impl HeadlessFactory {
    pub fn new(client: reqwest::Client, player: &PlayerConfig) -> Self {
        Self {
            client,
            strategy: player.strategy,
            config: HeadlessConfig {
                request_timeout: Duration::from_secs(player.manifest_timeout_secs),
                ..Default::default()
            },
        }
    }
}

impl EngineFactory for HeadlessFactory {
    type Engine = HeadlessHlsEngine;

    fn create(&self, url: &str) -> HeadlessHlsEngine {
        let strategy = match self.strategy {
            PlaybackStrategy::Auto => EngineStrategy::detect(url),
            PlaybackStrategy::Adaptive => EngineStrategy::Adaptive,
            PlaybackStrategy::Direct => EngineStrategy::Direct,
        };
        HeadlessHlsEngine::new(self.client.clone(), strategy, self.config.clone())
    }
}

/// Operator command read from stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Arm,
    Play,
    Pause,
    Seek(f64),
    /// 1-based stream number and level.
    Level(usize, LevelSelector),
    Status,
    Quit,
}

/// Parse one input line. Unknown commands and malformed arguments yield
/// `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()?.to_ascii_lowercase().as_str() {
        "arm" | "sync" => Command::Arm,
        "play" => Command::Play,
        "pause" => Command::Pause,
        "seek" => Command::Seek(parse_seek_target(parts.next()?)?),
        "level" => {
            let stream = parts.next()?.parse::<usize>().ok()?;
            let selector = parts.next()?.parse::<LevelSelector>().ok()?;
            Command::Level(stream, selector)
        }
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

/// Adapters for every listed stream plus the controller that aligns them.
pub struct Dashboard<F: EngineFactory + Clone = HeadlessFactory> {
    controller: SyncController<PlaybackAdapter<F>>,
    ids: Vec<String>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<F: EngineFactory + Clone> Dashboard<F> {
    /// Create one adapter per stream, in listing order, and start loading.
    /// Stream 1 is the time reference.
    pub fn new(streams: &[StreamEntry], factory: F) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let mut controller = SyncController::new();
        let mut ids = Vec::with_capacity(streams.len());

        for (slot, stream) in streams.iter().enumerate() {
            let mut adapter = PlaybackAdapter::new(slot, factory.clone(), tx.clone());
            adapter.attach(&stream.url);
            controller.register(adapter);
            ids.push(stream.id.clone());
        }

        Self {
            controller,
            ids,
            events,
        }
    }

    pub fn controller(&self) -> &SyncController<PlaybackAdapter<F>> {
        &self.controller
    }

    /// Feed one engine event through the adapters and the barrier.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if let Some(alignment) = self.controller.dispatch(event) {
            log_alignment(&alignment);
        }
    }

    /// Apply an operator command. Returns `false` when the dashboard should
    /// exit.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Arm => match self.controller.arm() {
                Some(alignment) => log_alignment(&alignment),
                None => {
                    let state = self.controller.state();
                    tracing::info!(
                        "Sync armed ({}/{} ready)",
                        state.ready_count,
                        state.required_count
                    );
                }
            },
            Command::Play => self.controller.targets_mut().for_each(|a| a.play()),
            Command::Pause => self.controller.targets_mut().for_each(|a| a.pause()),
            Command::Seek(seconds) => self
                .controller
                .targets_mut()
                .for_each(|a| a.seek_to(seconds)),
            Command::Level(stream, selector) => {
                match stream
                    .checked_sub(1)
                    .and_then(|slot| self.controller.target_mut(slot))
                {
                    Some(adapter) => adapter.select_level(selector),
                    None => tracing::warn!("No stream number {}", stream),
                }
            }
            Command::Status => self.log_status(),
            Command::Quit => return false,
        }
        true
    }

    pub fn log_status(&self) {
        let state = self.controller.state();
        tracing::info!(
            ready = state.ready_count,
            required = state.required_count,
            armed = state.armed,
            "Sync status"
        );
        for (id, adapter) in self.ids.iter().zip(self.controller.targets()) {
            let snapshot = adapter.snapshot();
            let levels: Vec<String> = snapshot.quality_levels.iter().map(|l| l.label()).collect();
            tracing::info!(
                stream = %id,
                state = %snapshot.state,
                position = %format!("{:.3}", snapshot.position),
                level = %snapshot.level_selector,
                levels = ?levels,
                "Player"
            );
        }
    }

    /// Run until `quit` or Ctrl+C, reading commands from stdin.
    pub async fn run(self, arm: bool, status_every: Duration) -> Result<()> {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };
        self.run_until(BufReader::new(tokio::io::stdin()), arm, status_every, ctrl_c)
            .await
    }

    /// Run until `quit` arrives on `input` or `shutdown` completes. Adapters
    /// are detached on the way out.
    pub async fn run_until<R, S>(
        mut self,
        input: R,
        arm: bool,
        status_every: Duration,
        shutdown: S,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        S: Future<Output = ()>,
    {
        if arm {
            self.apply(Command::Arm);
        }

        let mut input = Some(input.lines());
        let mut status = tokio::time::interval(status_every);
        status.tick().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                line = next_line(&mut input) => match line {
                    Some(line) => match parse_command(&line) {
                        Some(command) => {
                            if !self.apply(command) {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => tracing::warn!("Ignoring command: {}", line.trim()),
                    },
                    None => {
                        tracing::debug!("Command input closed");
                        input = None;
                    }
                },
                _ = status.tick() => self.log_status(),
            }
        }

        for adapter in self.controller.targets_mut() {
            adapter.detach();
        }
        Ok(())
    }
}

fn log_alignment(alignment: &Alignment) {
    tracing::info!(
        "Synchronized {} streams at {:.3}s",
        alignment.targets,
        alignment.reference_position
    );
}

async fn next_line<R: AsyncBufRead + Unpin>(lines: &mut Option<Lines<R>>) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

/// Connect to `server` and run the dashboard until the operator quits.
pub async fn run_dashboard(player: &PlayerConfig, server: &str, arm: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let streams = fetch_streams(&client, server).await?;
    if streams.is_empty() {
        anyhow::bail!("Server at {} lists no streams", server);
    }
    tracing::info!("Watching {} streams from {}", streams.len(), server);

    let dashboard = Dashboard::new(&streams, HeadlessFactory::new(client, player));
    dashboard.run(arm, Duration::from_secs(5)).await
}
