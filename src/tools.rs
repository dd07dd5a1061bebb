//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name or configured path of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the version output, if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Check whether the transcoding engine can be run.
///
/// `program` may be a bare name looked up on PATH or an explicit path.
pub fn check_engine(program: &Path) -> ToolInfo {
    let name = program.display().to_string();
    let result = Command::new(program).arg("-version").output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            let path = which::which(program).ok();

            ToolInfo {
                name,
                available: true,
                version,
                path,
            }
        }
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_engine_not_found() {
        let info = check_engine(Path::new("nonexistent_engine_12345"));
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
        assert_eq!(info.name, "nonexistent_engine_12345");
    }
}
