//! Error types for the edgequake-pdfcompress library.
//!
//! Every fallible operation returns [`CompressError`]. Variants fall into the
//! five families callers actually branch on, exposed through
//! [`CompressError::kind`]:
//!
//! * **Validation** — the upload is not something we will accept (empty,
//!   not `%PDF`, bad filename or session id). Raised synchronously at
//!   submission, before any task exists.
//! * **Storage** — the object store refused a write or a read.
//! * **Pipeline** — rasterisation, re-encoding or reassembly failed inside a
//!   worker. Only observable through the task's FAILED state.
//! * **NotReady** — a result was requested before its task succeeded.
//! * **Service** — queue pressure, configuration and internal faults.
//!
//! Background failures travel as text (the task record keeps
//! `to_string()`), so every variant also carries a stable machine-readable
//! [`CompressError::code`] that is stored next to the message.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-pdfcompress library.
#[derive(Debug, Error)]
pub enum CompressError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The local artifact does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The artifact exists but has zero bytes.
    #[error("File is empty: '{path}'")]
    EmptyFile { path: PathBuf },

    /// Uploaded bytes were empty.
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// Leading bytes are not the `%PDF` signature.
    #[error("File is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// Filename missing or without a `.pdf` extension.
    #[error("Invalid filename '{name}': please upload a .pdf file")]
    InvalidFilename { name: String },

    /// Caller-supplied session id is not usable as a key prefix.
    #[error("Invalid session id '{0}'")]
    InvalidSession(String),

    /// The upload request itself is malformed (missing file part, bad multipart body).
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Unknown compression tier name.
    #[error("Unknown compression tier '{0}' (expected strong, medium or weak)")]
    UnknownTier(String),

    // ── Storage errors ────────────────────────────────────────────────────
    /// Writing an object to the store failed.
    #[error("Upload of '{key}' failed: {reason}")]
    UploadFailed { key: String, reason: String },

    /// Reading an object from the store failed or produced an empty file.
    #[error("Download of '{key}' failed: {reason}")]
    DownloadFailed { key: String, reason: String },

    /// Bucket could not be checked or created.
    #[error("Bucket '{bucket}' unavailable: {reason}")]
    BucketUnavailable { bucket: String, reason: String },

    /// Object key is malformed (empty component, `..`, absolute path).
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// PDFium could not be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or `pdfium_lib_path` in the config."
    )]
    EngineUnavailable(String),

    /// The source PDF could not be opened by the rasteriser.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Rendering a page failed.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The document rasterised to zero pages.
    #[error("Document has no pages; nothing to compress")]
    EmptyDocument,

    /// JPEG re-encoding failed for a page.
    #[error("Re-encoding failed for page {page}: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// Reassembling the JPEG pages into a PDF failed.
    #[error("Reassembly failed: {0}")]
    AssemblyFailed(String),

    /// The downloaded source had zero bytes when sizes were computed.
    #[error("Source document is empty; compression ratio is undefined")]
    EmptySource,

    /// Workspace allocation or a workspace file operation failed.
    #[error("Workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// The task exceeded its time budget.
    #[error("Task timed out after {secs}s")]
    Timeout { secs: u64 },

    // ── Result retrieval ──────────────────────────────────────────────────
    /// A result was requested before the task succeeded.
    #[error("Task {task_id} is not finished or did not succeed (state: {state})")]
    NotReady { task_id: String, state: String },

    /// The task's result belongs to a different session.
    #[error("Task {task_id} does not belong to this session")]
    SessionMismatch { task_id: String },

    /// Download request did not name a task.
    #[error("Missing task id")]
    MissingTaskId,

    // ── Service errors ────────────────────────────────────────────────────
    /// The task queue is at capacity.
    #[error("Task queue is full ({capacity} pending); try again later")]
    QueueFull { capacity: usize },

    /// Builder or file configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error family, used for HTTP mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Storage,
    Pipeline,
    NotReady,
    Forbidden,
    Unavailable,
    Internal,
}

impl CompressError {
    /// The family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use CompressError::*;
        match self {
            FileNotFound { .. }
            | EmptyFile { .. }
            | EmptyUpload
            | NotAPdf { .. }
            | InvalidFilename { .. }
            | InvalidSession(_)
            | InvalidUpload(_)
            | UnknownTier(_)
            | MissingTaskId => ErrorKind::Validation,
            UploadFailed { .. }
            | DownloadFailed { .. }
            | BucketUnavailable { .. }
            | InvalidKey(_) => ErrorKind::Storage,
            EngineUnavailable(_)
            | CorruptPdf { .. }
            | RasterisationFailed { .. }
            | EmptyDocument
            | EncodeFailed { .. }
            | AssemblyFailed(_)
            | EmptySource
            | Workspace(_)
            | Timeout { .. } => ErrorKind::Pipeline,
            NotReady { .. } => ErrorKind::NotReady,
            SessionMismatch { .. } => ErrorKind::Forbidden,
            QueueFull { .. } => ErrorKind::Unavailable,
            InvalidConfig(_) | Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable snake_case code stored with FAILED tasks and returned by the API.
    pub fn code(&self) -> &'static str {
        use CompressError::*;
        match self {
            FileNotFound { .. } => "file_not_found",
            EmptyFile { .. } | EmptyUpload => "empty_file",
            NotAPdf { .. } => "not_a_pdf",
            InvalidFilename { .. } => "invalid_filename",
            InvalidSession(_) => "invalid_session",
            InvalidUpload(_) => "invalid_upload",
            UnknownTier(_) => "unknown_tier",
            MissingTaskId => "missing_task_id",
            UploadFailed { .. } => "upload_failed",
            DownloadFailed { .. } => "download_failed",
            BucketUnavailable { .. } => "bucket_unavailable",
            InvalidKey(_) => "invalid_key",
            EngineUnavailable(_) => "engine_unavailable",
            CorruptPdf { .. } => "corrupt_pdf",
            RasterisationFailed { .. } => "rasterisation_failed",
            EmptyDocument => "empty_document",
            EncodeFailed { .. } => "encode_failed",
            AssemblyFailed(_) => "assembly_failed",
            EmptySource => "empty_source",
            Workspace(_) => "workspace_error",
            Timeout { .. } => "timeout",
            NotReady { .. } => "not_ready",
            SessionMismatch { .. } => "session_mismatch",
            QueueFull { .. } => "queue_full",
            InvalidConfig(_) => "invalid_config",
            Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = CompressError::NotAPdf {
            magic: b"not ".to_vec(),
        };
        assert!(e.to_string().contains("not a valid PDF"));
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert_eq!(e.code(), "not_a_pdf");
    }

    #[test]
    fn storage_errors_carry_key() {
        let e = CompressError::UploadFailed {
            key: "s1/abc_doc.pdf".into(),
            reason: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("s1/abc_doc.pdf"), "got: {msg}");
        assert!(msg.contains("disk full"));
        assert_eq!(e.kind(), ErrorKind::Storage);
    }

    #[test]
    fn not_ready_maps_to_its_own_kind() {
        let e = CompressError::NotReady {
            task_id: "t-1".into(),
            state: "RUNNING".into(),
        };
        assert_eq!(e.kind(), ErrorKind::NotReady);
        assert!(e.to_string().contains("RUNNING"));
    }

    #[test]
    fn timeout_display() {
        let e = CompressError::Timeout { secs: 300 };
        assert!(e.to_string().contains("300s"));
        assert_eq!(e.code(), "timeout");
        assert_eq!(e.kind(), ErrorKind::Pipeline);
    }

    #[test]
    fn empty_variants_share_code() {
        assert_eq!(CompressError::EmptyUpload.code(), "empty_file");
        assert_eq!(
            CompressError::EmptyFile {
                path: PathBuf::from("/tmp/x.pdf")
            }
            .code(),
            "empty_file"
        );
    }
}
