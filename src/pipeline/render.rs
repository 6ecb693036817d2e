//! PDF rasterisation: every page of a document → `DynamicImage` at a DPI.
//!
//! ## Why spawn_blocking?
//!
//! PDFium is a C++ library with internal global state; rendering is
//! CPU-bound and blocking. [`render_pages`] moves the whole call onto
//! tokio's blocking pool so worker tasks never stall the runtime.
//!
//! ## Why a trait?
//!
//! [`Rasterizer`] is the seam between the pipeline and the engine. The
//! service uses [`PdfiumRasterizer`]; tests plug in fakes that need no
//! native library.

use crate::error::CompressError;
use crate::pipeline::engine::PdfiumEngine;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// PDF user-space units per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// One rendered page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index in the source document.
    pub index: usize,
    pub image: DynamicImage,
    /// Resolution the page was rendered at.
    pub dpi: u32,
}

/// Turns a PDF file into one image per page, in page order.
///
/// Implementations are called from a blocking thread and may block freely.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError>;
}

/// Rasterise `pdf_path` on the blocking pool.
pub async fn render_pages(
    rasterizer: Arc<dyn Rasterizer>,
    pdf_path: &Path,
    dpi: u32,
) -> Result<Vec<PageImage>, CompressError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path, dpi))
        .await
        .map_err(|e| CompressError::Internal(format!("Render task panicked: {}", e)))?
}

/// [`Rasterizer`] backed by PDFium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    engine: PdfiumEngine,
}

impl PdfiumRasterizer {
    pub fn new(engine: PdfiumEngine) -> Self {
        Self { engine }
    }

    /// Rasterizer using the library at `lib_path`, or the default lookup.
    pub fn with_library(lib_path: Option<PathBuf>) -> Self {
        Self::new(PdfiumEngine::new(lib_path))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError> {
        let pdfium = self.engine.bind()?;

        let document =
            pdfium
                .load_pdf_from_file(pdf_path, None)
                .map_err(|e| CompressError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} dpi", total_pages, dpi);

        let render_config =
            PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);

        let mut results = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page = pages
                .get(idx as u16)
                .map_err(|e| CompressError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                CompressError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            results.push(PageImage {
                index: idx,
                image,
                dpi,
            });
        }

        Ok(results)
    }
}
