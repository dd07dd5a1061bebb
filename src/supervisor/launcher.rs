//! Process launching.

use super::invocation::TranscodeInvocation;
use crate::registry::StreamIdentity;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Spawns the external engine for a stream.
pub trait ProcessLauncher: Send + Sync {
    fn launch(
        &self,
        stream: &StreamIdentity,
        invocation: &TranscodeInvocation,
    ) -> std::io::Result<Child>;
}

/// Launches the configured engine binary as a child process.
///
/// stdin and stdout are closed; stderr is piped so the supervisor can forward
/// the engine's log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLauncher;

impl ProcessLauncher for FfmpegLauncher {
    fn launch(
        &self,
        stream: &StreamIdentity,
        invocation: &TranscodeInvocation,
    ) -> std::io::Result<Child> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }

        tracing::trace!(stream = %stream.name, "Spawning {:?}", invocation.program);

        command.spawn()
    }
}
