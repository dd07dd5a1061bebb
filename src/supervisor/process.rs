//! Transcode process supervisor.
//!
//! Owns one external engine process per stream, keyed by stream index. The
//! supervisor only does lifecycle bookkeeping: it launches, observes exits,
//! and signals stops. Nothing here blocks on a child, and an engine that
//! exits is logged and left down (no restart).

use super::dirs::{ensure_directory, FilesystemError};
use super::invocation::TranscodeInvocation;
use super::launcher::{FfmpegLauncher, ProcessLauncher};
use crate::config::TranscodeConfig;
use crate::registry::{StreamIdentity, StreamRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// Supervisor errors.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The index is not part of the registry.
    #[error("Unknown stream index: {0}")]
    UnknownStream(u32),

    /// The stream's output directory could not be created.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Lifecycle of one engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "code", rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    /// Interrupt sent, exit not yet observed.
    Stopping,
    /// Exit code, `None` when killed by a signal or never launched.
    Exited(Option<i32>),
}

impl ProcessState {
    pub fn is_alive(&self) -> bool {
        !matches!(self, ProcessState::Exited(_))
    }
}

/// Snapshot of one tracked process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub index: u32,
    pub name: String,
    pub pid: Option<u32>,
    #[serde(flatten)]
    pub state: ProcessState,
}

/// Outcome of [`TranscodeSupervisor::start_all`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// Streams with a process entry (including ones whose launch failed).
    pub started: Vec<u32>,
    /// Streams skipped because their directory could not be prepared.
    pub failed: Vec<(u32, String)>,
}

struct TranscodeProcess {
    identity: StreamIdentity,
    pid: Option<u32>,
    exit: watch::Receiver<ProcessState>,
    stop_tx: Option<oneshot::Sender<()>>,
    stop_requested: bool,
}

impl TranscodeProcess {
    fn state(&self) -> ProcessState {
        match *self.exit.borrow() {
            ProcessState::Exited(code) => ProcessState::Exited(code),
            _ if self.stop_requested => ProcessState::Stopping,
            state => state,
        }
    }

    /// Ask the observer to interrupt the child. Only a running process that
    /// has not been asked before is signalled.
    fn request_stop(&mut self) -> bool {
        if self.state() != ProcessState::Running {
            return false;
        }
        let Some(stop_tx) = self.stop_tx.take() else {
            return false;
        };
        if stop_tx.send(()).is_err() {
            // observer already finished
            return false;
        }
        self.stop_requested = true;
        true
    }
}

/// Starts and tracks one transcoding process per registered stream.
pub struct TranscodeSupervisor {
    registry: Arc<StreamRegistry>,
    config: TranscodeConfig,
    launcher: Arc<dyn ProcessLauncher>,
    processes: Mutex<BTreeMap<u32, TranscodeProcess>>,
}

impl TranscodeSupervisor {
    /// Create a supervisor that launches the configured engine binary.
    pub fn new(registry: Arc<StreamRegistry>, config: TranscodeConfig) -> Self {
        Self::with_launcher(registry, config, Arc::new(FfmpegLauncher))
    }

    /// Create a supervisor with a custom launcher.
    pub fn with_launcher(
        registry: Arc<StreamRegistry>,
        config: TranscodeConfig,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            registry,
            config,
            launcher,
            processes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.config.stop_grace_secs)
    }

    /// Prepare the output root and start every registered stream.
    ///
    /// Never fails as a whole: a stream whose directory cannot be created is
    /// reported and skipped, and a missing engine binary only shows up as an
    /// exited process. Must be called from within a Tokio runtime.
    pub fn start_all(&self) -> StartReport {
        let mut report = StartReport::default();

        if let Err(e) = ensure_directory(self.registry.output_root()) {
            warn!("Output root unavailable: {}", e);
        }

        let indices: Vec<u32> = self.registry.iter().map(|s| s.index).collect();
        for index in indices {
            match self.start(index) {
                Ok(_) => report.started.push(index),
                Err(e) => {
                    warn!(index, "Failed to start stream: {}", e);
                    report.failed.push((index, e.to_string()));
                }
            }
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "Transcoders launched"
        );
        report
    }

    /// Start the engine for one stream and return its state.
    ///
    /// Returns immediately without waiting for output. A stream that is
    /// already running (or stopping) is left alone; an exited stream is
    /// launched again.
    pub fn start(&self, index: u32) -> Result<ProcessState, SupervisorError> {
        let identity = self
            .registry
            .get(index)
            .cloned()
            .ok_or(SupervisorError::UnknownStream(index))?;

        let mut processes = self.processes.lock();
        if let Some(existing) = processes.get(&index) {
            let state = existing.state();
            if state.is_alive() {
                debug!(stream = %identity.name, "Transcoder already running");
                return Ok(state);
            }
        }

        ensure_directory(&identity.output_dir)?;

        let invocation = TranscodeInvocation::for_stream(&self.config, &identity);
        info!(
            stream = %identity.name,
            output = ?identity.manifest_path,
            "Starting transcoder"
        );
        debug!(stream = %identity.name, "Engine args: {:?}", invocation.display_args());

        let (exit_tx, exit_rx) = watch::channel(ProcessState::Running);
        let process = match self.launcher.launch(&identity, &invocation) {
            Ok(child) => {
                let pid = child.id();
                let (stop_tx, stop_rx) = oneshot::channel();
                tokio::spawn(observe(
                    identity.name.clone(),
                    child,
                    stop_rx,
                    exit_tx,
                    self.stop_grace(),
                ));
                TranscodeProcess {
                    identity,
                    pid,
                    exit: exit_rx,
                    stop_tx: Some(stop_tx),
                    stop_requested: false,
                }
            }
            Err(e) => {
                warn!(
                    stream = %identity.name,
                    "Transcoder exited: failed to launch {:?}: {}",
                    invocation.program, e
                );
                exit_tx.send_replace(ProcessState::Exited(None));
                TranscodeProcess {
                    identity,
                    pid: None,
                    exit: exit_rx,
                    stop_tx: None,
                    stop_requested: false,
                }
            }
        };

        let state = process.state();
        processes.insert(index, process);
        Ok(state)
    }

    /// Interrupt one stream. Returns whether a signal was sent.
    pub fn stop(&self, index: u32) -> bool {
        let mut processes = self.processes.lock();
        match processes.get_mut(&index) {
            Some(process) => {
                let signalled = process.request_stop();
                if signalled {
                    info!(stream = %process.identity.name, "Stopping transcoder");
                }
                signalled
            }
            None => false,
        }
    }

    /// Interrupt every running stream without waiting for exits. Processes that
    /// already exited or were already signalled are skipped. Returns the number
    /// of processes signalled.
    pub fn stop_all(&self) -> usize {
        let mut processes = self.processes.lock();
        let mut signalled = 0;
        for process in processes.values_mut() {
            if process.request_stop() {
                info!(stream = %process.identity.name, "Stopping transcoder");
                signalled += 1;
            }
        }
        signalled
    }

    /// Wait until every tracked process has exited. Returns `false` on timeout.
    pub async fn wait_all(&self, timeout: Duration) -> bool {
        let receivers: Vec<watch::Receiver<ProcessState>> = self
            .processes
            .lock()
            .values()
            .map(|p| p.exit.clone())
            .collect();

        let all_exited = async move {
            for mut rx in receivers {
                let _ = rx
                    .wait_for(|state| matches!(state, ProcessState::Exited(_)))
                    .await;
            }
        };
        tokio::time::timeout(timeout, all_exited).await.is_ok()
    }

    /// Stop everything and give the processes their grace period to exit.
    pub async fn shutdown(&self) {
        let signalled = self.stop_all();
        if signalled == 0 {
            return;
        }
        let limit = self.stop_grace() + Duration::from_secs(1);
        if !self.wait_all(limit).await {
            warn!("Transcoders still running after {:?}", limit);
        }
    }

    pub fn state(&self, index: u32) -> Option<ProcessState> {
        self.processes.lock().get(&index).map(|p| p.state())
    }

    pub fn status(&self) -> Vec<ProcessStatus> {
        self.processes
            .lock()
            .iter()
            .map(|(index, p)| ProcessStatus {
                index: *index,
                name: p.identity.name.clone(),
                pid: p.pid,
                state: p.state(),
            })
            .collect()
    }

    /// Number of processes not yet observed to exit.
    pub fn running_count(&self) -> usize {
        self.processes
            .lock()
            .values()
            .filter(|p| p.state().is_alive())
            .count()
    }
}

/// Wait for the child to exit, interrupting it when asked and escalating to a
/// kill after `grace`. Records the exit code in `exit`.
async fn observe(
    name: String,
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    exit: watch::Sender<ProcessState>,
    grace: Duration,
) {
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_stderr(name.clone(), stderr));
    }

    let status = tokio::select! {
        status = child.wait() => status,
        _ = stop_rx => {
            interrupt(&mut child, &name);
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(stream = %name, "No exit {:?} after interrupt, killing", grace);
                    if let Err(e) = child.kill().await {
                        warn!(stream = %name, "Failed to kill transcoder: {}", e);
                    }
                    child.wait().await
                }
            }
        }
    };

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(stream = %name, "Failed to wait for transcoder: {}", e);
            None
        }
    };

    if code == Some(0) {
        info!(stream = %name, code = 0, "Transcoder exited");
    } else {
        warn!(stream = %name, code = ?code, "Transcoder exited");
    }
    exit.send_replace(ProcessState::Exited(code));
}

#[cfg(unix)]
fn interrupt(child: &mut Child, name: &str) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        warn!(stream = %name, pid, "Failed to interrupt transcoder: {}", e);
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child, name: &str) {
    if let Err(e) = child.start_kill() {
        warn!(stream = %name, "Failed to stop transcoder: {}", e);
    }
}

async fn forward_stderr(name: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream = %name, "{}", line);
    }
}
