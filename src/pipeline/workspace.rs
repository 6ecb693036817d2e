//! Per-task scratch directory.
//!
//! Each task run gets its own directory under the configured workspace root,
//! named `pdfcompress-{session}-{task}-XXXXXX`. It holds the downloaded
//! source, one JPEG per page and the assembled output.
//!
//! The worker calls [`TempWorkspace::cleanup`] on every exit path; a failure
//! there is logged and swallowed so it never replaces the task's real
//! outcome. If the worker future is dropped instead (timeout, panic) the
//! inner [`tempfile::TempDir`] removes the directory on drop.

use crate::error::CompressError;
use crate::session::{sanitize_filename, workspace_prefix, SessionId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

/// A scratch directory owned by one task execution.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl TempWorkspace {
    /// Create a fresh workspace under `root`, creating `root` if necessary.
    pub fn create(root: &Path, session: &SessionId, task_id: &Uuid) -> Result<Self, CompressError> {
        std::fs::create_dir_all(root).map_err(CompressError::Workspace)?;
        let dir = tempfile::Builder::new()
            .prefix(&workspace_prefix(session, task_id))
            .tempdir_in(root)
            .map_err(CompressError::Workspace)?;
        let path = dir.path().to_path_buf();
        debug!("Workspace created: {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the downloaded source is written: `input_{filename}`.
    pub fn input_path(&self, filename: &str) -> PathBuf {
        self.path.join(format!("input_{}", sanitize_filename(filename)))
    }

    /// Where page `page_num` (1-indexed) is written: `page_{n}.jpg`.
    pub fn page_path(&self, page_num: usize) -> PathBuf {
        self.path.join(format!("page_{page_num}.jpg"))
    }

    /// Where the assembled result is written: `compressed_{filename}`.
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.path
            .join(format!("compressed_{}", sanitize_filename(filename)))
    }

    /// Remove the directory now. Failures are logged, never returned.
    pub fn cleanup(mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Workspace removed: {}", path.display()),
                Err(e) => warn!("Failed to remove workspace {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::parse("sess").unwrap()
    }

    #[test]
    fn workspace_is_named_after_session_and_task() {
        let root = tempfile::tempdir().unwrap();
        let task = Uuid::new_v4();
        let ws = TempWorkspace::create(root.path(), &session(), &task).unwrap();
        let name = ws.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("pdfcompress-sess-{}-", task.simple())), "{name}");
        assert!(ws.path().is_dir());
    }

    #[test]
    fn cleanup_removes_directory_with_contents() {
        let root = tempfile::tempdir().unwrap();
        let ws = TempWorkspace::create(root.path(), &session(), &Uuid::new_v4()).unwrap();
        std::fs::write(ws.page_path(1), b"jpeg").unwrap();
        let path = ws.path().to_path_buf();
        ws.cleanup();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let ws = TempWorkspace::create(root.path(), &session(), &Uuid::new_v4()).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_of_vanished_directory_does_not_panic() {
        let root = tempfile::tempdir().unwrap();
        let ws = TempWorkspace::create(root.path(), &session(), &Uuid::new_v4()).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        ws.cleanup();
    }

    #[test]
    fn artifact_names() {
        let root = tempfile::tempdir().unwrap();
        let ws = TempWorkspace::create(root.path(), &session(), &Uuid::new_v4()).unwrap();
        assert!(ws.input_path("a b.pdf").ends_with("input_a_b.pdf"));
        assert!(ws.page_path(3).ends_with("page_3.jpg"));
        assert!(ws.output_path("a.pdf").ends_with("compressed_a.pdf"));
    }
}
