use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub streams: StreamsConfig,

    #[serde(default)]
    pub transcode: TranscodeConfig,

    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Built dashboard bundle, served with an index.html fallback
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamsConfig {
    /// Number of logical streams to transcode
    #[serde(default = "default_stream_count")]
    pub count: u32,

    /// Directory holding one subdirectory per stream
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// URL path the output root is served under
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,

    /// Stream names are `{name_prefix}{index}`
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_stream_count() -> u32 {
    2
}
fn default_output_root() -> PathBuf {
    PathBuf::from("public/hls")
}
fn default_url_prefix() -> String {
    "/hls".to_string()
}
fn default_name_prefix() -> String {
    "stream".to_string()
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            count: default_stream_count(),
            output_root: default_output_root(),
            url_prefix: default_url_prefix(),
            name_prefix: default_name_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscodeConfig {
    /// Engine binary, looked up on PATH when not absolute
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Source file path or network stream URL
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Transport for rtsp:// sources (tcp or udp)
    #[serde(default = "default_rtsp_transport")]
    pub rtsp_transport: String,

    /// Seconds to wait after the interrupt before force-killing
    #[serde(default = "default_stop_grace")]
    pub stop_grace_secs: u64,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}
fn default_source() -> String {
    "demoVideo.mp4".to_string()
}
fn default_video_codec() -> String {
    "copy".to_string()
}
fn default_audio_codec() -> String {
    "aac".to_string()
}
fn default_rtsp_transport() -> String {
    "tcp".to_string()
}
fn default_stop_grace() -> u64 {
    5
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            source: default_source(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            rtsp_transport: default_rtsp_transport(),
            stop_grace_secs: default_stop_grace(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStrategy {
    /// Adaptive client for .m3u8 URLs, direct playback otherwise
    #[default]
    Auto,
    Adaptive,
    Direct,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub strategy: PlaybackStrategy,

    #[serde(default = "default_manifest_timeout")]
    pub manifest_timeout_secs: u64,
}

fn default_manifest_timeout() -> u64 {
    10
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            strategy: PlaybackStrategy::default(),
            manifest_timeout_secs: default_manifest_timeout(),
        }
    }
}
