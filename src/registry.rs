//! Stream registry.
//!
//! The fixed set of stream identities derived from the configured stream
//! count. Both the transcode supervisor and the HTTP listing read from it, so
//! every directory the supervisor writes is exactly what `/streams` advertises.

use crate::config::StreamsConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Playlist file name inside each stream directory.
pub const MANIFEST_FILE: &str = "index.m3u8";

/// Identity of one logical stream. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamIdentity {
    /// 1-based stream index.
    pub index: u32,
    /// Directory and URL component, e.g. `stream1`.
    pub name: String,
    /// Directory the transcoder writes into.
    pub output_dir: PathBuf,
    /// Playlist path inside `output_dir`.
    pub manifest_path: PathBuf,
    /// Server-relative playlist URL, e.g. `/hls/stream1/index.m3u8`.
    pub public_url: String,
}

impl StreamIdentity {
    /// Absolute playlist URL for a request that arrived at `base`
    /// (`http://host:port`).
    pub fn url_for(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.public_url)
    }
}

/// All stream identities, in index order.
#[derive(Debug, Clone)]
pub struct StreamRegistry {
    output_root: PathBuf,
    url_prefix: String,
    streams: Vec<StreamIdentity>,
}

impl StreamRegistry {
    /// Build identities `1..=count` named `stream{index}`.
    pub fn new(count: u32, output_root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self::with_name_prefix(count, output_root, url_prefix, "stream")
    }

    pub fn with_name_prefix(
        count: u32,
        output_root: impl Into<PathBuf>,
        url_prefix: &str,
        name_prefix: &str,
    ) -> Self {
        let output_root = output_root.into();
        let url_prefix = url_prefix.trim_end_matches('/').to_string();

        let streams = (1..=count)
            .map(|index| {
                let name = format!("{}{}", name_prefix, index);
                let output_dir = output_root.join(&name);
                StreamIdentity {
                    index,
                    manifest_path: output_dir.join(MANIFEST_FILE),
                    public_url: format!("{}/{}/{}", url_prefix, name, MANIFEST_FILE),
                    output_dir,
                    name,
                }
            })
            .collect();

        Self {
            output_root,
            url_prefix,
            streams,
        }
    }

    pub fn from_config(config: &StreamsConfig) -> Self {
        Self::with_name_prefix(
            config.count,
            &config.output_root,
            &config.url_prefix,
            &config.name_prefix,
        )
    }

    pub fn get(&self, index: u32) -> Option<&StreamIdentity> {
        // indices are dense and 1-based
        index
            .checked_sub(1)
            .and_then(|i| self.streams.get(i as usize))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamIdentity> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }
}
