//! Compression service facade.
//!
//! [`CompressionService`] wires the store gateway, task registry and worker
//! pool together once at startup and is the only entry point the HTTP layer
//! and the CLI use. It owns every shared component explicitly; nothing is
//! global.

use crate::config::ServiceConfig;
use crate::error::CompressError;
use crate::pipeline::{CompressionWorker, LopdfAssembler, PageAssembler, PdfiumRasterizer, Rasterizer};
use crate::session::{derive_key, sanitize_filename, KeyVariant, SessionId};
use crate::store::{FilesystemStore, ObjectStore, StoreGateway};
use crate::task::{PoolOptions, TaskId, TaskRecord, TaskRegistry, TaskSpec, TaskState, TaskStatus, WorkerPool};
use crate::tier::{self, CompressionTier, TierInfo};
use crate::validate;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Returned when an upload was accepted.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub task_id: TaskId,
    pub session_id: SessionId,
}

/// A compressed document ready to hand back to the client.
#[derive(Debug, Clone)]
pub struct ResultFile {
    pub bytes: Bytes,
    /// `compressed_{filename}`.
    pub download_name: String,
    pub size: u64,
}

/// Upload, status and download operations over the task pipeline.
pub struct CompressionService {
    config: ServiceConfig,
    store: StoreGateway,
    registry: Arc<TaskRegistry>,
    pool: WorkerPool,
}

impl CompressionService {
    /// Start with the filesystem store and PDFium rasteriser from `config`.
    pub async fn start(config: ServiceConfig) -> Result<Self, CompressError> {
        let backend = Arc::new(FilesystemStore::new(&config.storage_root).await?);
        let rasterizer = Arc::new(PdfiumRasterizer::with_library(
            config.pdfium_lib_path.clone(),
        ));
        info!("Object store at {}", config.storage_root.display());
        Ok(Self::with_components(config, backend, rasterizer, Arc::new(LopdfAssembler)).await)
    }

    /// Start with explicit collaborators.
    pub async fn with_components(
        config: ServiceConfig,
        backend: Arc<dyn ObjectStore>,
        rasterizer: Arc<dyn Rasterizer>,
        assembler: Arc<dyn PageAssembler>,
    ) -> Self {
        let store = StoreGateway::connect(backend, config.bucket.clone()).await;
        let registry = Arc::new(TaskRegistry::new());
        let worker = Arc::new(CompressionWorker::new(
            store.clone(),
            rasterizer,
            assembler,
            config.workspace_root.clone(),
            config.render_concurrency,
        ));
        let pool = WorkerPool::start(
            worker,
            Arc::clone(&registry),
            PoolOptions {
                worker_count: config.worker_count,
                queue_capacity: config.queue_capacity,
                task_timeout: config.task_timeout(),
            },
        );
        Self {
            config,
            store,
            registry,
            pool,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreGateway {
        &self.store
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Validate an upload, store it and queue a compression task.
    ///
    /// Validation failures are returned before any task or object exists.
    pub async fn submit_upload(
        &self,
        session: Option<&str>,
        filename: &str,
        bytes: &[u8],
        tier: CompressionTier,
    ) -> Result<Submission, CompressError> {
        validate::check_filename(filename)?;
        validate::check_bytes(bytes)?;
        let session_id = SessionId::parse_or_generate(session)?;
        let filename = sanitize_filename(filename);
        let source_key = derive_key(&session_id, KeyVariant::Original, &filename);

        self.stage_and_put(bytes, &source_key).await?;

        let spec = TaskSpec {
            task_id: TaskId::new(),
            session_id: session_id.clone(),
            original_filename: filename,
            source_key: source_key.clone(),
            tier,
        };
        let task_id = match self.pool.submit(spec) {
            Ok(id) => id,
            Err(e) => {
                if let Err(del) = self.store.delete(&source_key).await {
                    warn!("Failed to remove orphaned upload {}: {}", source_key, del);
                }
                return Err(e);
            }
        };

        info!(
            "Task {} submitted: session={}, key={}, tier={}",
            task_id, session_id, source_key, tier
        );
        Ok(Submission {
            task_id,
            session_id,
        })
    }

    async fn stage_and_put(&self, bytes: &[u8], key: &str) -> Result<(), CompressError> {
        let staging = self.staging_file("upload-")?;
        tokio::fs::write(staging.path(), bytes)
            .await
            .map_err(|e| CompressError::UploadFailed {
                key: key.to_string(),
                reason: format!("staging failed: {e}"),
            })?;
        self.store.put(staging.path(), key).await
    }

    fn staging_file(&self, prefix: &str) -> Result<tempfile::NamedTempFile, CompressError> {
        std::fs::create_dir_all(&self.config.workspace_root).map_err(CompressError::Workspace)?;
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".pdf")
            .tempfile_in(&self.config.workspace_root)
            .map_err(CompressError::Workspace)
    }

    /// Status for a raw task id. Unknown or malformed ids report PENDING.
    pub fn status(&self, raw_task_id: &str) -> TaskStatus {
        match TaskId::parse(raw_task_id) {
            Some(id) => self.registry.status(&id),
            None => TaskStatus::unknown(raw_task_id),
        }
    }

    /// The task record, when the id is known.
    pub fn lookup(&self, raw_task_id: &str) -> Option<TaskRecord> {
        TaskId::parse(raw_task_id).and_then(|id| self.registry.lookup(&id))
    }

    /// Fetch the compressed document of a SUCCEEDED task owned by `session`.
    pub async fn fetch_result(
        &self,
        session: &str,
        filename: &str,
        task_id: Option<&str>,
    ) -> Result<ResultFile, CompressError> {
        let raw_id = task_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(CompressError::MissingTaskId)?;
        let session = SessionId::parse(session)?;

        let record = self.lookup(raw_id).ok_or_else(|| CompressError::NotReady {
            task_id: raw_id.to_string(),
            state: TaskState::Pending.to_string(),
        })?;
        let result = match (&record.state, &record.result) {
            (TaskState::Succeeded, Some(result)) => result,
            (state, _) => {
                return Err(CompressError::NotReady {
                    task_id: raw_id.to_string(),
                    state: state.to_string(),
                })
            }
        };

        if record.spec.session_id != session || !session.owns_key(&result.compressed_key) {
            return Err(CompressError::SessionMismatch {
                task_id: raw_id.to_string(),
            });
        }

        let staging = self.staging_file("download-")?;
        self.store.get(&result.compressed_key, staging.path()).await?;
        let data = tokio::fs::read(staging.path())
            .await
            .map_err(|e| CompressError::DownloadFailed {
                key: result.compressed_key.clone(),
                reason: e.to_string(),
            })?;
        drop(staging);

        info!(
            "Task {}: serving {} ({} bytes)",
            raw_id,
            result.compressed_key,
            data.len()
        );
        Ok(ResultFile {
            size: data.len() as u64,
            bytes: Bytes::from(data),
            download_name: format!("compressed_{}", sanitize_filename(filename)),
        })
    }

    /// The static tier catalog.
    pub fn tiers(&self) -> Vec<TierInfo> {
        tier::catalog()
    }

    /// Drop terminal task records older than the configured retention.
    pub fn purge_expired(&self) -> usize {
        self.registry.purge_expired(self.config.result_ttl())
    }

    /// Stop the worker pool after queued tasks finish.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }
}
