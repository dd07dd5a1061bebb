mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./syncwall.toml",
        "~/.config/syncwall/config.toml",
        "/etc/syncwall/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let prefix = &config.streams.url_prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        anyhow::bail!(
            "Stream url_prefix must look like \"/hls\", got {:?}",
            prefix
        );
    }

    let name = &config.streams.name_prefix;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        anyhow::bail!(
            "Stream name_prefix must be non-empty and contain only [A-Za-z0-9_-], got {:?}",
            name
        );
    }

    if config.transcode.ffmpeg_path.as_os_str().is_empty() {
        anyhow::bail!("Transcode ffmpeg_path cannot be empty");
    }

    if config.transcode.source.trim().is_empty() {
        anyhow::bail!("Transcode source cannot be empty");
    }

    // A missing source file is not fatal: the server still runs, streams
    // just never produce segments
    if !config.transcode.source.contains("://") && !Path::new(&config.transcode.source).exists()
    {
        tracing::warn!("Source file does not exist: {}", config.transcode.source);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.streams.count, 2);
        assert_eq!(config.streams.url_prefix, "/hls");
        assert_eq!(config.transcode.video_codec, "copy");
        assert_eq!(config.transcode.audio_codec, "aac");
        assert_eq!(config.player.strategy, PlaybackStrategy::Auto);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[streams]
count = 6
output_root = "/var/lib/syncwall/hls"

[transcode]
source = "rtsp://camera.local/live"

[player]
strategy = "direct"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.streams.count, 6);
        assert_eq!(config.streams.url_prefix, "/hls");
        assert_eq!(config.transcode.source, "rtsp://camera.local/live");
        assert_eq!(config.transcode.ffmpeg_path, Path::new("ffmpeg"));
        assert_eq!(config.player.strategy, PlaybackStrategy::Direct);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_reject_port_zero() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_reject_bad_url_prefix() {
        for prefix in ["hls", "/", "/hls/", ""] {
            let mut config = Config::default();
            config.streams.url_prefix = prefix.to_string();
            assert!(validate_config(&config).is_err(), "accepted {:?}", prefix);
        }
    }

    #[test]
    fn test_reject_unsafe_name_prefix() {
        let mut config = Config::default();
        config.streams.name_prefix = "../up".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_source_file_is_not_fatal() {
        let mut config = Config::default();
        config.transcode.source = "/definitely/not/here.mp4".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_error_has_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[streams]\ncount = \"many\"").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
