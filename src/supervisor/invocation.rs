//! Transcoding engine command line.
//!
//! Every stream is produced by the same template: read the source at native
//! rate (looping forever when it is a file), pass video through, re-encode
//! audio, and write a rolling HLS playlist. The playlist keeps the last
//! [`PLAYLIST_SIZE`] segments of [`SEGMENT_SECONDS`] each and the engine deletes
//! anything that falls out of the window, which caps disk usage per stream no
//! matter how long it runs.

use crate::config::TranscodeConfig;
use crate::registry::StreamIdentity;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Target segment duration in seconds.
pub const SEGMENT_SECONDS: u32 = 5;

/// Segments kept in the rolling playlist.
pub const PLAYLIST_SIZE: u32 = 10;

/// Where the engine reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// A finite file, looped indefinitely.
    File(PathBuf),
    /// A live network stream (rtsp, rtmp, http, srt, ...).
    Network(String),
}

impl SourceLocator {
    /// Classify a configured source string. Anything with a URL scheme is a
    /// network stream; `file://` URLs are unwrapped to their path.
    pub fn parse(source: &str) -> Self {
        let source = source.trim();
        if let Some(path) = source.strip_prefix("file://") {
            return SourceLocator::File(PathBuf::from(path));
        }
        match source.split_once("://") {
            Some((scheme, _))
                if !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') =>
            {
                SourceLocator::Network(source.to_string())
            }
            _ => SourceLocator::File(PathBuf::from(source)),
        }
    }

    pub fn is_rtsp(&self) -> bool {
        match self {
            SourceLocator::Network(url) => {
                let lower = url.to_ascii_lowercase();
                lower.starts_with("rtsp://") || lower.starts_with("rtsps://")
            }
            SourceLocator::File(_) => false,
        }
    }
}

/// A fully built engine command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl TranscodeInvocation {
    /// Build the command for one stream.
    pub fn for_stream(config: &TranscodeConfig, stream: &StreamIdentity) -> Self {
        let source = SourceLocator::parse(&config.source);
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];

        match &source {
            SourceLocator::File(path) => {
                args.extend(["-stream_loop".into(), "-1".into()]);
                // pace a file like a live feed
                args.push("-re".into());
                args.extend(["-i".into(), path.as_os_str().to_owned()]);
            }
            SourceLocator::Network(url) => {
                if source.is_rtsp() {
                    args.extend(["-rtsp_transport".into(), config.rtsp_transport.as_str().into()]);
                }
                args.extend(["-i".into(), url.as_str().into()]);
            }
        }

        args.extend([
            "-c:v".into(),
            config.video_codec.as_str().into(),
            "-c:a".into(),
            config.audio_codec.as_str().into(),
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            SEGMENT_SECONDS.to_string().into(),
            "-hls_list_size".into(),
            PLAYLIST_SIZE.to_string().into(),
            "-hls_flags".into(),
            "delete_segments".into(),
            stream.manifest_path.as_os_str().to_owned(),
        ]);

        Self {
            program: config.ffmpeg_path.clone(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as lossy strings, for logging.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}
