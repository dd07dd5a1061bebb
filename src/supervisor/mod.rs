//! Transcoding supervisor.
//!
//! Turns the stream registry into running engine processes:
//!
//! - Output directory preparation ([`ensure_directory`])
//! - Engine command construction ([`TranscodeInvocation`])
//! - Process launch seam ([`ProcessLauncher`], [`FfmpegLauncher`])
//! - Lifecycle tracking and stop signalling ([`TranscodeSupervisor`])
//!
//! # Output layout
//!
//! ```text
//! <output_root>/
//!   stream1/index.m3u8
//!   stream1/index0.ts ... (rolling window, stale segments deleted)
//!   stream2/...
//! ```
//!
//! The layout is regenerated on every run and is safe to delete between runs.

mod dirs;
mod invocation;
mod launcher;
mod process;

pub use dirs::{ensure_directory, FilesystemError};
pub use invocation::{SourceLocator, TranscodeInvocation, PLAYLIST_SIZE, SEGMENT_SECONDS};
pub use launcher::{FfmpegLauncher, ProcessLauncher};
pub use process::{
    ProcessState, ProcessStatus, StartReport, SupervisorError, TranscodeSupervisor,
};
