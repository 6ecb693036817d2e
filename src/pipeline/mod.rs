//! Pipeline stages for PDF recompression.
//!
//! Each submodule implements exactly one transformation step; [`worker`]
//! strings them together for one task.
//!
//! ## Data Flow
//!
//! ```text
//! store ──▶ render ──▶ encode ──▶ assemble ──▶ store
//! (get)    (pdfium)   (JPEG q)    (lopdf)     (put)
//! ```
//!
//! 1. [`workspace`] — per-task scratch directory, removed on every exit path
//! 2. [`render`]    — rasterise every page at the tier DPI; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`encode`]    — flatten to RGB8 and JPEG-encode at the tier quality,
//!    several pages at once, order preserved
//! 4. [`assemble`]  — embed the JPEGs as `DCTDecode` images, one per page,
//!    keeping the physical page size
//! 5. [`worker`]    — the task state machine: download, the stages above,
//!    upload, size accounting, cleanup
//!
//! [`engine`] resolves and binds libpdfium for [`render`].

pub mod assemble;
pub mod encode;
pub mod engine;
pub mod render;
pub mod worker;
pub mod workspace;

pub use assemble::{LopdfAssembler, PageAssembler};
pub use render::{PageImage, PdfiumRasterizer, Rasterizer};
pub use worker::CompressionWorker;
pub use workspace::TempWorkspace;
