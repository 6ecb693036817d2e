//! Reassembly: ordered page JPEGs → one PDF.
//!
//! Each JPEG is embedded unchanged as a `DCTDecode` image XObject (no
//! re-encoding, no Flate on top) and painted over the whole page. The page's
//! MediaBox is `pixels * 72 / dpi` points in each direction, so the output
//! keeps the physical size of the source pages.

use crate::error::CompressError;
use crate::pipeline::encode::EncodedPage;
use crate::pipeline::render::POINTS_PER_INCH;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

/// Builds a PDF out of already-encoded page images.
pub trait PageAssembler: Send + Sync {
    /// Write `pages`, in order, to a new PDF at `dest`.
    fn assemble(&self, pages: &[EncodedPage], dest: &Path) -> Result<(), CompressError>;
}

/// [`PageAssembler`] writing image-only PDFs with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfAssembler;

/// Page size in points for a `width_px` × `height_px` image rendered at `dpi`.
pub fn page_size_points(width_px: u32, height_px: u32, dpi: u32) -> (f32, f32) {
    let dpi = dpi.max(1) as f32;
    (
        width_px as f32 * POINTS_PER_INCH / dpi,
        height_px as f32 * POINTS_PER_INCH / dpi,
    )
}

impl PageAssembler for LopdfAssembler {
    fn assemble(&self, pages: &[EncodedPage], dest: &Path) -> Result<(), CompressError> {
        if pages.is_empty() {
            return Err(CompressError::EmptyDocument);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            let jpeg = std::fs::read(&page.path).map_err(|e| {
                CompressError::AssemblyFailed(format!("reading {}: {}", page.path.display(), e))
            })?;

            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width as i64,
                    "Height" => page.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false);
            let image_id = doc.add_object(image);

            let (w, h) = page_size_points(page.width, page.height, page.dpi);
            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                    ),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_bytes = content
                .encode()
                .map_err(|e| CompressError::AssemblyFailed(format!("page {}: {}", i + 1, e)))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            });
            kids.push(page_id.into());
            debug!("Placed page {} ({:.1}×{:.1} pt)", i + 1, w, h);
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let file = File::create(dest).map_err(|e| {
            CompressError::AssemblyFailed(format!("creating {}: {}", dest.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        doc.save_to(&mut writer)
            .map_err(|e| CompressError::AssemblyFailed(e.to_string()))?;
        Ok(())
    }
}

/// Number of pages in a PDF held in memory.
pub fn page_count(bytes: &[u8]) -> Result<usize, CompressError> {
    Document::load_mem(bytes)
        .map(|doc| doc.get_pages().len())
        .map_err(|e| CompressError::CorruptPdf {
            path: "<memory>".into(),
            detail: e.to_string(),
        })
}
