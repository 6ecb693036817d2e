//! Shared fixtures for the integration tests: lopdf-built PDFs, fake
//! rasterisers and a service harness backed by the in-memory store.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_pdfcompress::{
    page_count, CompressError, CompressionService, LopdfAssembler, MemoryStore, ObjectStore,
    PageImage, Rasterizer, ServiceConfig, ServiceConfigBuilder, TaskState, TaskStatus,
};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Fixture page size in points.
pub const PAGE_W_PT: u32 = 200;
pub const PAGE_H_PT: u32 = 260;

// ── Fixture PDFs ─────────────────────────────────────────────────────────────

/// A PDF with `pages` pages, each carrying roughly `padding` bytes of
/// uncompressed vector drawing so the source is comfortably larger than its
/// rasterised version.
pub fn fixture_pdf(pages: usize, padding: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    let stroke = "10 10 m 190 250 l S\n";
    for _ in 0..pages {
        let body = stroke.repeat(padding / stroke.len() + 1);
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), body.into_bytes()).with_compression(false));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (PAGE_W_PT as i64).into(), (PAGE_H_PT as i64).into()],
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("fixture PDF serialises");
    buf
}

/// Three padded pages; the canonical "valid upload".
pub fn three_page_pdf() -> Vec<u8> {
    fixture_pdf(3, 120_000)
}

// ── Fake rasterisers ─────────────────────────────────────────────────────────

/// Reads the page count with lopdf and draws a simple pattern per page.
pub struct FakeRasterizer;

pub fn page_image(dpi: u32, index: usize) -> DynamicImage {
    let w = PAGE_W_PT * dpi / 72;
    let h = PAGE_H_PT * dpi / 72;
    let img = RgbImage::from_fn(w, h, |x, y| {
        if (x / 16 + y / 16 + index as u32) % 5 == 0 {
            Rgb([40, 40, 40])
        } else {
            Rgb([250, 250, 250])
        }
    });
    DynamicImage::ImageRgb8(img)
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError> {
        let bytes = std::fs::read(pdf_path).map_err(|e| CompressError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let pages = page_count(&bytes)?;
        Ok((0..pages)
            .map(|index| PageImage {
                index,
                image: page_image(dpi, index),
                dpi,
            })
            .collect())
    }
}

/// Blocks every call until the test releases it, then behaves like
/// [`FakeRasterizer`].
pub struct GatedRasterizer {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedRasterizer {
    pub fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                gate: Mutex::new(rx),
            }),
            tx,
        )
    }
}

impl Rasterizer for GatedRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError> {
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| CompressError::Internal("gate closed".into()))?;
        FakeRasterizer.rasterize(pdf_path, dpi)
    }
}

/// Sleeps before rasterising.
pub struct SlowRasterizer(pub Duration);

impl Rasterizer for SlowRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError> {
        std::thread::sleep(self.0);
        FakeRasterizer.rasterize(pdf_path, dpi)
    }
}

/// Panics on the first call only.
pub struct PanicOnceRasterizer {
    fired: Mutex<bool>,
}

impl PanicOnceRasterizer {
    pub fn new() -> Self {
        Self {
            fired: Mutex::new(false),
        }
    }
}

impl Rasterizer for PanicOnceRasterizer {
    fn rasterize(&self, pdf_path: &Path, dpi: u32) -> Result<Vec<PageImage>, CompressError> {
        let first = {
            let mut fired = self.fired.lock().unwrap();
            !std::mem::replace(&mut *fired, true)
        };
        if first {
            panic!("rasteriser exploded");
        }
        FakeRasterizer.rasterize(pdf_path, dpi)
    }
}

// ── Stores ───────────────────────────────────────────────────────────────────

/// Memory store that refuses to write compressed results.
pub struct RejectResultsStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl ObjectStore for RejectResultsStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, CompressError> {
        self.inner.bucket_exists(bucket).await
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), CompressError> {
        self.inner.make_bucket(bucket).await
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<(), CompressError> {
        if key.contains("_compressed_") {
            return Err(CompressError::UploadFailed {
                key: key.to_string(),
                reason: "store is read-only for results".into(),
            });
        }
        self.inner.put_object(bucket, key, data).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, CompressError> {
        self.inner.get_object(bucket, key).await
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, CompressError> {
        self.inner.object_exists(bucket, key).await
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), CompressError> {
        self.inner.remove_object(bucket, key).await
    }
}

// ── Service harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub service: Arc<CompressionService>,
    pub backend: Arc<MemoryStore>,
    pub workspace: TempDir,
}

impl Harness {
    pub fn bucket(&self) -> &str {
        &self.service.config().bucket
    }

    /// Entries under the workspace root that are task workspaces.
    pub fn task_workspaces(&self) -> Vec<String> {
        std::fs::read_dir(self.workspace.path())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| n.starts_with("pdfcompress-"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Route library logs to the test output; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub async fn harness(rasterizer: Arc<dyn Rasterizer>) -> Harness {
    harness_with(rasterizer, |b| b).await
}

pub async fn harness_with(
    rasterizer: Arc<dyn Rasterizer>,
    tweak: impl FnOnce(ServiceConfigBuilder) -> ServiceConfigBuilder,
) -> Harness {
    build_harness(rasterizer, tweak, |mem| -> Arc<dyn ObjectStore> { mem }).await
}

/// Harness whose store accepts uploads but rejects every result write.
pub async fn harness_rejecting_results(rasterizer: Arc<dyn Rasterizer>) -> Harness {
    build_harness(rasterizer, |b| b, |inner| -> Arc<dyn ObjectStore> {
        Arc::new(RejectResultsStore { inner })
    })
    .await
}

async fn build_harness(
    rasterizer: Arc<dyn Rasterizer>,
    tweak: impl FnOnce(ServiceConfigBuilder) -> ServiceConfigBuilder,
    wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn ObjectStore>,
) -> Harness {
    init_tracing();

    let workspace = tempfile::tempdir().unwrap();
    let config = tweak(
        ServiceConfig::builder()
            .bucket("test-bucket")
            .workspace_root(workspace.path())
            .worker_count(2),
    )
    .build()
    .unwrap();

    let backend = Arc::new(MemoryStore::new());
    let service = CompressionService::with_components(
        config,
        wrap(backend.clone()),
        rasterizer,
        Arc::new(LopdfAssembler),
    )
    .await;

    Harness {
        service: Arc::new(service),
        backend,
        workspace,
    }
}

/// Poll until the task is terminal or `timeout` elapses.
pub async fn wait_for_terminal(service: &CompressionService, task_id: &str) -> TaskStatus {
    wait_for(service, task_id, |s| s.state.is_terminal()).await
}

/// Poll until `pred` holds.
pub async fn wait_for(
    service: &CompressionService,
    task_id: &str,
    pred: impl Fn(&TaskStatus) -> bool,
) -> TaskStatus {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let status = service.status(task_id);
        if pred(&status) {
            return status;
        }
        assert!(
            Instant::now() < deadline,
            "task {task_id} stuck in {:?}",
            status.state
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub async fn wait_until_running(service: &CompressionService, task_id: &str) -> TaskStatus {
    wait_for(service, task_id, |s| s.state == TaskState::Running).await
}
