//! The compression state machine for one task.
//!
//! ```text
//! workspace ─▶ download ─▶ (30) rasterise ─▶ encode JPEG ─▶ (70) assemble
//!                                                                  │
//!                           cleanup ◀─ result ◀─ sizes ◀─ upload ◀─┘
//! ```
//!
//! Every step returns `Result` and the first error ends the run. The
//! workspace is removed whatever happened; a failing cleanup is logged and
//! never replaces the run's own outcome.

use crate::error::CompressError;
use crate::pipeline::assemble::PageAssembler;
use crate::pipeline::encode::{encode_pages, EncodedPage};
use crate::pipeline::render::{render_pages, Rasterizer};
use crate::pipeline::workspace::TempWorkspace;
use crate::progress::{ProgressSink, CHECKPOINT_COMPRESSING, CHECKPOINT_CONVERTING};
use crate::session::{derive_key, KeyVariant};
use crate::store::StoreGateway;
use crate::task::{TaskResult, TaskSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs compression tasks against a store, a rasteriser and an assembler.
pub struct CompressionWorker {
    store: StoreGateway,
    rasterizer: Arc<dyn Rasterizer>,
    assembler: Arc<dyn PageAssembler>,
    workspace_root: PathBuf,
    render_concurrency: usize,
}

impl CompressionWorker {
    pub fn new(
        store: StoreGateway,
        rasterizer: Arc<dyn Rasterizer>,
        assembler: Arc<dyn PageAssembler>,
        workspace_root: impl Into<PathBuf>,
        render_concurrency: usize,
    ) -> Self {
        Self {
            store,
            rasterizer,
            assembler,
            workspace_root: workspace_root.into(),
            render_concurrency: render_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &StoreGateway {
        &self.store
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute `spec` end to end.
    pub async fn run(
        &self,
        spec: &TaskSpec,
        progress: &dyn ProgressSink,
    ) -> Result<TaskResult, CompressError> {
        let workspace =
            TempWorkspace::create(&self.workspace_root, &spec.session_id, spec.task_id.as_uuid())?;
        let outcome = self.execute(spec, &workspace, progress).await;
        workspace.cleanup();
        outcome
    }

    async fn execute(
        &self,
        spec: &TaskSpec,
        workspace: &TempWorkspace,
        progress: &dyn ProgressSink,
    ) -> Result<TaskResult, CompressError> {
        let tier = spec.tier;
        info!(
            "Task {}: compressing '{}' ({}, {} dpi, q={})",
            spec.task_id,
            spec.original_filename,
            tier,
            tier.dpi(),
            tier.quality()
        );

        // Download
        let input = workspace.input_path(&spec.original_filename);
        self.store.get(&spec.source_key, &input).await?;

        // Rasterise
        let (pct, step) = CHECKPOINT_CONVERTING;
        progress.on_checkpoint(pct, step);
        let pages = render_pages(Arc::clone(&self.rasterizer), &input, tier.dpi()).await?;
        if pages.is_empty() {
            return Err(CompressError::EmptyDocument);
        }
        progress.on_pages_rendered(pages.len());
        debug!("Task {}: {} page(s) rendered", spec.task_id, pages.len());

        // Re-encode
        let encoded = encode_pages(
            pages,
            tier.quality(),
            workspace,
            self.render_concurrency,
            progress,
        )
        .await?;

        // Reassemble
        let (pct, step) = CHECKPOINT_COMPRESSING;
        progress.on_checkpoint(pct, step);
        let output = workspace.output_path(&spec.original_filename);
        self.assemble(encoded, &output).await?;

        // Publish
        let compressed_key = derive_key(
            &spec.session_id,
            KeyVariant::Compressed,
            &spec.original_filename,
        );
        self.store.put(&output, &compressed_key).await?;

        // Sizes
        let original_size = file_size(&input).await?;
        let compressed_size = file_size(&output).await?;
        let compression_ratio = compression_ratio(original_size, compressed_size)?;

        info!(
            "Task {}: {} → {} bytes ({:.1}% smaller)",
            spec.task_id, original_size, compressed_size, compression_ratio
        );

        Ok(TaskResult {
            compressed_key,
            original_size,
            compressed_size,
            compression_ratio,
        })
    }

    async fn assemble(&self, pages: Vec<EncodedPage>, dest: &Path) -> Result<(), CompressError> {
        let assembler = Arc::clone(&self.assembler);
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || assembler.assemble(&pages, &dest))
            .await
            .map_err(|e| CompressError::Internal(format!("Assembly task panicked: {}", e)))?
    }
}

async fn file_size(path: &Path) -> Result<u64, CompressError> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(CompressError::Workspace)
}

/// Percentage saved: `(original - compressed) / original * 100`.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> Result<f64, CompressError> {
    if original_size == 0 {
        return Err(CompressError::EmptySource);
    }
    let original = original_size as f64;
    Ok((original - compressed_size as f64) / original * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_for_smaller_output() {
        assert_eq!(compression_ratio(1000, 250).unwrap(), 75.0);
        assert_eq!(compression_ratio(1000, 1000).unwrap(), 0.0);
    }

    #[test]
    fn ratio_may_be_negative_when_output_grows() {
        assert_eq!(compression_ratio(100, 150).unwrap(), -50.0);
    }

    #[test]
    fn ratio_of_empty_source_is_an_error() {
        assert_eq!(compression_ratio(0, 10).unwrap_err().code(), "empty_source");
    }
}
