//! Page re-encoding: `DynamicImage` → baseline JPEG on disk.
//!
//! This is where the size reduction happens. Pages are flattened to RGB8
//! (alpha and 16-bit channels are dropped) and written at the tier's JPEG
//! quality. Files are named `page_{n}.jpg` with `n` 1-indexed.
//!
//! [`encode_pages`] runs up to `concurrency` pages at once on the blocking
//! pool. It uses `futures::stream::buffered`, which yields results in input
//! order, so the returned pages are always in page order.

use crate::error::CompressError;
use crate::pipeline::render::PageImage;
use crate::pipeline::workspace::TempWorkspace;
use crate::progress::ProgressSink;
use futures::stream::{self, StreamExt, TryStreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A page written to disk as JPEG.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

/// JPEG-encode one image at `quality` (1..=100) into memory.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    Ok(buffer)
}

/// Encode `page` and write it to `dest`.
pub fn write_page(page: &PageImage, quality: u8, dest: &Path) -> Result<EncodedPage, CompressError> {
    let page_num = page.index + 1;
    let data = encode_jpeg(&page.image, quality).map_err(|e| CompressError::EncodeFailed {
        page: page_num,
        detail: e.to_string(),
    })?;
    std::fs::write(dest, &data).map_err(|e| CompressError::EncodeFailed {
        page: page_num,
        detail: format!("writing {}: {}", dest.display(), e),
    })?;
    debug!(
        "Encoded page {} → {} ({} bytes, q={})",
        page_num,
        dest.display(),
        data.len(),
        quality
    );
    Ok(EncodedPage {
        path: dest.to_path_buf(),
        width: page.image.width(),
        height: page.image.height(),
        dpi: page.dpi,
    })
}

/// Encode all pages into `workspace`, preserving page order.
pub async fn encode_pages(
    pages: Vec<PageImage>,
    quality: u8,
    workspace: &TempWorkspace,
    concurrency: usize,
    progress: &dyn ProgressSink,
) -> Result<Vec<EncodedPage>, CompressError> {
    let total = pages.len();
    stream::iter(pages.into_iter().map(|page| {
        let dest = workspace.page_path(page.index + 1);
        async move {
            let page_num = page.index + 1;
            let encoded = tokio::task::spawn_blocking(move || write_page(&page, quality, &dest))
                .await
                .map_err(|e| CompressError::Internal(format!("Encode task panicked: {}", e)))??;
            progress.on_page_encoded(page_num, total);
            Ok::<_, CompressError>(encoded)
        }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use image::{GenericImageView, Rgba, RgbaImage};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn noisy_page(index: usize, w: u32, h: u32) -> PageImage {
        let img = RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 128])
        });
        PageImage {
            index,
            image: DynamicImage::ImageRgba8(img),
            dpi: 100,
        }
    }

    #[derive(Default)]
    struct Seen(Mutex<Vec<usize>>);

    impl ProgressSink for Seen {
        fn on_page_encoded(&self, page_num: usize, _total_pages: usize) {
            self.0.lock().unwrap().push(page_num);
        }
    }

    #[test]
    fn encode_jpeg_produces_decodable_rgb() {
        let data = encode_jpeg(&noisy_page(0, 32, 16).image, 50).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8], "JPEG SOI marker");
        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let page = noisy_page(0, 128, 128);
        let low = encode_jpeg(&page.image, 30).unwrap();
        let high = encode_jpeg(&page.image, 80).unwrap();
        assert!(low.len() < high.len(), "{} vs {}", low.len(), high.len());
    }

    #[tokio::test]
    async fn encode_pages_keeps_page_order() {
        let root = tempfile::tempdir().unwrap();
        let ws = TempWorkspace::create(
            root.path(),
            &SessionId::parse("s").unwrap(),
            &Uuid::new_v4(),
        )
        .unwrap();
        let pages: Vec<PageImage> = (0..6).map(|i| noisy_page(i, 20 + i as u32, 10)).collect();
        let seen = Seen::default();

        let encoded = encode_pages(pages, 50, &ws, 4, &seen).await.unwrap();

        assert_eq!(encoded.len(), 6);
        for (i, page) in encoded.iter().enumerate() {
            assert!(page.path.ends_with(format!("page_{}.jpg", i + 1)));
            assert_eq!(page.width, 20 + i as u32);
            assert!(page.path.is_file());
        }
        let mut nums = seen.0.lock().unwrap().clone();
        nums.sort_unstable();
        assert_eq!(nums, vec![1, 2, 3, 4, 5, 6]);
    }
}
