//! Path validation for CLI inputs.

use std::path::{Path, PathBuf};

/// Error types for path validation.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    /// Path cannot be canonicalized (doesn't exist or permission denied)
    #[error("cannot canonicalize path: {0}")]
    CannotCanonicalize(String),

    /// Path exists but is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

/// Canonicalize a path, resolving symlinks, `..`, and `.` components.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, PathValidationError> {
    std::fs::canonicalize(path)
        .map_err(|_| PathValidationError::CannotCanonicalize(path.to_string_lossy().to_string()))
}

/// Canonicalize a repository root and require it to be a directory.
pub fn validate_root_dir(path: &Path) -> Result<PathBuf, PathValidationError> {
    let canonical = canonicalize_path(path)?;
    if !canonical.is_dir() {
        return Err(PathValidationError::NotADirectory(
            canonical.to_string_lossy().to_string(),
        ));
    }
    Ok(canonical)
}
