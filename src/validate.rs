//! The validation gate: a shallow structural check run before an artifact
//! is trusted as a PDF.
//!
//! Only the `%PDF` signature is checked. This is not a parse; it exists to
//! reject obvious garbage (empty uploads, renamed text files) before any
//! object-store write or rasterisation work happens. Deeper corruption is
//! caught later by the rasteriser and surfaces as a FAILED task.

use crate::error::CompressError;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// The canonical PDF file signature.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// True when `bytes` is non-empty and starts with `%PDF`.
pub fn validate_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// True when the file at `path` exists, is non-empty and starts with `%PDF`.
pub fn validate(path: &Path) -> bool {
    check_file(path).is_ok()
}

/// Like [`validate`] but reports why the file was rejected.
pub fn check_file(path: &Path) -> Result<(), CompressError> {
    let mut file = std::fs::File::open(path).map_err(|_| CompressError::FileNotFound {
        path: path.to_path_buf(),
    })?;

    let len = file
        .metadata()
        .map_err(|_| CompressError::FileNotFound {
            path: path.to_path_buf(),
        })?
        .len();
    if len == 0 {
        return Err(CompressError::EmptyFile {
            path: path.to_path_buf(),
        });
    }

    let mut magic = [0u8; 4];
    let n = file.read(&mut magic).unwrap_or(0);
    if !validate_bytes(&magic[..n]) {
        return Err(CompressError::NotAPdf {
            magic: magic[..n].to_vec(),
        });
    }

    debug!("Validated PDF: {}", path.display());
    Ok(())
}

/// Check uploaded bytes, reporting why they were rejected.
pub fn check_bytes(bytes: &[u8]) -> Result<(), CompressError> {
    if bytes.is_empty() {
        return Err(CompressError::EmptyUpload);
    }
    if !validate_bytes(bytes) {
        return Err(CompressError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Uploads must carry a non-empty name ending in `.pdf`.
pub fn check_filename(name: &str) -> Result<(), CompressError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || !trimmed.to_ascii_lowercase().ends_with(".pdf") {
        return Err(CompressError::InvalidFilename {
            name: name.to_string(),
        });
    }
    Ok(())
}
