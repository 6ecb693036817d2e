//! # edgequake-pdfcompress
//!
//! Asynchronous PDF recompression: upload a PDF, poll a task, download a
//! smaller PDF.
//!
//! ## Why rasterise?
//!
//! Scanned and image-heavy PDFs are mostly pixels. Rendering every page at a
//! modest DPI and re-encoding it as JPEG trades text selectability for a
//! large, predictable size reduction, independent of how the source was
//! produced.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate   %PDF signature, non-empty, .pdf name
//!  ├─ 2. Store      original under {session}/{uuid}_{name}
//!  ├─ 3. Queue      PENDING task on a bounded queue
//!  ├─ 4. Render     pdfium at the tier DPI (spawn_blocking)      30%
//!  ├─ 5. Encode     RGB8 → JPEG at the tier quality, in order
//!  ├─ 6. Assemble   one DCTDecode image per page (lopdf)         70%
//!  └─ 7. Publish    result under {session}/{uuid}_compressed_{name}
//! ```
//!
//! ## Tiers
//!
//! | Tier | DPI | JPEG quality |
//! |------|-----|--------------|
//! | `strong` | 72 | 30 |
//! | `medium` (default) | 100 | 50 |
//! | `weak` | 150 | 80 |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfcompress::{CompressionService, CompressionTier, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = CompressionService::start(ServiceConfig::default()).await?;
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let sub = service
//!         .submit_upload(None, "scan.pdf", &bytes, CompressionTier::Strong)
//!         .await?;
//!     println!("task {} in session {}", sub.task_id, sub.session_id);
//!     println!("{:?}", service.status(&sub.task_id.to_string()).state);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfcompress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfcompress = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod task;
pub mod tier;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{CompressError, ErrorKind};
pub use pipeline::assemble::page_count;
pub use pipeline::{
    CompressionWorker, LopdfAssembler, PageAssembler, PageImage, PdfiumRasterizer, Rasterizer,
    TempWorkspace,
};
pub use progress::{NoopProgress, ProgressSink};
pub use service::{CompressionService, ResultFile, Submission};
pub use session::{derive_key, KeyVariant, SessionId};
pub use store::{FilesystemStore, MemoryStore, ObjectStore, StoreGateway};
pub use task::{TaskId, TaskRecord, TaskRegistry, TaskResult, TaskSpec, TaskState, TaskStatus};
pub use tier::{CompressionTier, TierInfo};
pub use validate::validate;
