//! Locating and binding the PDFium shared library.
//!
//! Resolution order:
//!
//! 1. `pdfium_lib_path` from [`crate::ServiceConfig`],
//! 2. the `PDFIUM_LIB_PATH` environment variable,
//! 3. the platform's system library search path.
//!
//! An explicit path (1 or 2) that does not exist is an error rather than a
//! silent fallback, so a typo in deployment config is reported at the first
//! task instead of binding some other copy of the library.

use crate::error::CompressError;
use pdfium_render::prelude::Pdfium;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit libpdfium file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Where to find libpdfium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// A specific library file.
    Path(PathBuf),
    /// Whatever the dynamic loader finds on the system search path.
    System,
}

/// Binds PDFium on demand.
///
/// Binding is done per rasterisation call on the blocking thread that does
/// the work, so no `Pdfium` handle ever crosses threads.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    lib_path: Option<PathBuf>,
}

impl PdfiumEngine {
    pub fn new(lib_path: Option<PathBuf>) -> Self {
        Self { lib_path }
    }

    /// Decide which library to bind, without loading it.
    pub fn source(&self) -> LibrarySource {
        let from_env = std::env::var(PDFIUM_LIB_PATH_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        resolve(self.lib_path.as_deref(), from_env)
    }

    /// Load libpdfium and return a ready handle.
    pub fn bind(&self) -> Result<Pdfium, CompressError> {
        match self.source() {
            LibrarySource::Path(path) => {
                if !path.exists() {
                    return Err(CompressError::EngineUnavailable(format!(
                        "library not found at '{}'",
                        path.display()
                    )));
                }
                debug!("Binding pdfium from {}", path.display());
                Pdfium::bind_to_library(&path)
                    .map(Pdfium::new)
                    .map_err(|e| {
                        CompressError::EngineUnavailable(format!("'{}': {}", path.display(), e))
                    })
            }
            LibrarySource::System => {
                debug!("Binding system pdfium");
                Pdfium::bind_to_system_library()
                    .map(Pdfium::new)
                    .map_err(|e| CompressError::EngineUnavailable(e.to_string()))
            }
        }
    }
}

fn resolve(configured: Option<&Path>, from_env: Option<PathBuf>) -> LibrarySource {
    configured
        .map(Path::to_path_buf)
        .or(from_env)
        .map(LibrarySource::Path)
        .unwrap_or(LibrarySource::System)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_path_wins_over_env() {
        let src = resolve(
            Some(Path::new("/opt/pdfium/libpdfium.so")),
            Some(PathBuf::from("/env/libpdfium.so")),
        );
        assert_eq!(src, LibrarySource::Path("/opt/pdfium/libpdfium.so".into()));
    }

    #[test]
    fn env_used_when_not_configured() {
        let src = resolve(None, Some(PathBuf::from("/env/libpdfium.so")));
        assert_eq!(src, LibrarySource::Path("/env/libpdfium.so".into()));
    }

    #[test]
    fn falls_back_to_system() {
        assert_eq!(resolve(None, None), LibrarySource::System);
    }

    #[test]
    fn missing_explicit_library_is_engine_error() {
        let engine = PdfiumEngine::new(Some("/definitely/not/libpdfium.so".into()));
        let err = engine.bind().map(|_| ()).unwrap_err();
        assert_eq!(err.code(), "engine_unavailable");
        assert!(err.to_string().contains("/definitely/not/libpdfium.so"));
    }
}
