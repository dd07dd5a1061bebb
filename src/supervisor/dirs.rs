//! Output directory management.

use std::path::{Path, PathBuf};

/// A stream output directory could not be created.
#[derive(Debug, thiserror::Error)]
#[error("Failed to create directory {path:?}: {source}")]
pub struct FilesystemError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Create `path` and any missing ancestors. Succeeds without side effects if
/// the directory already exists.
pub fn ensure_directory(path: &Path) -> Result<(), FilesystemError> {
    if path.is_dir() {
        return Ok(());
    }

    match std::fs::create_dir_all(path) {
        Ok(()) => {
            tracing::debug!("Created directory {:?}", path);
            Ok(())
        }
        // lost a race with another creator
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(source) => Err(FilesystemError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
