//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which lays out a stream registry under a temporary
//! output root and builds the [`AppContext`] the router serves. The
//! [`with_server`](TestHarness::with_server) constructor starts Axum on a
//! random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use syncwall::config::Config;
use syncwall::server::{create_router, AppContext};
use syncwall::supervisor::TranscodeSupervisor;
use tempfile::TempDir;

/// Playlist written into stream directories by tests that fake transcoder output.
pub const LIVE_PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:5
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:5.0,
index0.ts
#EXTINF:5.0,
index1.ts
";

/// Test harness owning a temporary output root.
pub struct TestHarness {
    pub ctx: AppContext,
    pub temp: TempDir,
}

impl TestHarness {
    /// Harness with `count` streams and no supervisor.
    pub fn new(count: u32) -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let config = Self::config_for(temp.path(), count);
        let ctx = AppContext::new(config, None);
        Self { ctx, temp }
    }

    /// Harness whose context reports on `supervisor`.
    pub fn with_supervisor(temp: TempDir, config: Config, supervisor: Arc<TranscodeSupervisor>) -> Self {
        let ctx = AppContext::new(config, Some(supervisor));
        Self { ctx, temp }
    }

    /// Default config pointed at `root/hls`, bound to loopback.
    pub fn config_for(root: &Path, count: u32) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.streams.count = count;
        config.streams.output_root = root.join("hls");
        config
    }

    pub fn output_root(&self) -> PathBuf {
        self.ctx.registry.output_root().to_path_buf()
    }

    /// Write `contents` to `<output_root>/<stream>/<file>`.
    pub fn write_output(&self, stream: &str, file: &str, contents: &str) -> PathBuf {
        let dir = self.output_root().join(stream);
        std::fs::create_dir_all(&dir).expect("failed to create stream dir");
        let path = dir.join(file);
        std::fs::write(&path, contents).expect("failed to write output file");
        path
    }

    /// Start an Axum server on a random port and return the bound address.
    pub async fn serve(&self) -> SocketAddr {
        let app = create_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }

    /// Harness with `count` streams, served on a random port.
    pub async fn with_server(count: u32) -> (Self, SocketAddr) {
        let harness = Self::new(count);
        let addr = harness.serve().await;
        (harness, addr)
    }
}
