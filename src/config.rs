//! Service configuration.
//!
//! All runtime knobs live in [`ServiceConfig`]. It can be assembled in code
//! through [`ServiceConfigBuilder`], or loaded with [`ServiceConfig::load`]
//! which layers, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`$PDFCOMPRESS_CONFIG`, else `config/pdfcompress.toml` if
//!    present),
//! 3. `PDFCOMPRESS__*` environment variables, e.g. `PDFCOMPRESS__PORT=8080`.
//!
//! The binary applies CLI flags on top of the loaded value.

use crate::error::CompressError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "config/pdfcompress.toml";

/// Configuration for the compression service.
///
/// # Example
/// ```rust
/// use edgequake_pdfcompress::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .port(8080)
///     .worker_count(2)
///     .task_timeout_secs(120)
///     .build()
///     .unwrap();
/// assert_eq!(config.worker_count, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interface the HTTP server binds to. Default: `0.0.0.0`.
    pub host: String,

    /// HTTP port. Default: 5000.
    pub port: u16,

    /// Object-store bucket holding originals and results. Default: `pdf-compressor`.
    pub bucket: String,

    /// Root directory of the filesystem object store. Default: `./data/objects`.
    pub storage_root: PathBuf,

    /// Directory under which per-task workspaces are created.
    /// Default: the system temp dir.
    pub workspace_root: PathBuf,

    /// Number of background workers pulling from the task queue. Default: 2.
    ///
    /// Each worker runs one task at a time, and one task can keep several
    /// cores busy while it encodes pages, so keep this below the core count.
    pub worker_count: usize,

    /// Maximum number of queued (not yet running) tasks. Default: 64.
    ///
    /// Submissions beyond this fail fast with `queue_full` instead of
    /// building an unbounded backlog.
    pub queue_capacity: usize,

    /// Pages re-encoded concurrently within one task. Default: 4.
    pub render_concurrency: usize,

    /// Wall-clock budget for one task before it is marked FAILED. Default: 300.
    pub task_timeout_secs: u64,

    /// How long terminal task records are kept for polling. Default: 24.
    pub result_ttl_hours: u64,

    /// Largest accepted upload, in MiB. Default: 50.
    pub max_upload_mb: usize,

    /// Explicit path to libpdfium. When `None`, `PDFIUM_LIB_PATH` and then
    /// the system library are tried.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            bucket: "pdf-compressor".to_string(),
            storage_root: PathBuf::from("./data/objects"),
            workspace_root: std::env::temp_dir(),
            worker_count: 2,
            queue_capacity: 64,
            render_concurrency: 4,
            task_timeout_secs: 300,
            result_ttl_hours: 24,
            max_upload_mb: 50,
            pdfium_lib_path: None,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder starting from the defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, CompressError> {
        let file = std::env::var("PDFCOMPRESS_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self::load_from(file.as_deref())
    }

    /// Load from an explicit file (required when given) plus the environment.
    pub fn load_from(file: Option<&Path>) -> Result<Self, CompressError> {
        let defaults = config::Config::try_from(&ServiceConfig::default())
            .map_err(|e| CompressError::InvalidConfig(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("PDFCOMPRESS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: ServiceConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CompressError::InvalidConfig(e.to_string()))?;

        ServiceConfigBuilder { config: loaded }.build()
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_hours * 3600)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n.max(1);
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n.max(1);
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.render_concurrency = n.max(1);
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    pub fn result_ttl_hours(mut self, hours: u64) -> Self {
        self.config.result_ttl_hours = hours;
        self
    }

    pub fn max_upload_mb(mut self, mb: usize) -> Self {
        self.config.max_upload_mb = mb;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, CompressError> {
        let c = &self.config;
        if c.bucket.is_empty() || c.bucket.contains(['/', '\\']) {
            return Err(CompressError::InvalidConfig(format!(
                "bucket must be a single non-empty path segment, got '{}'",
                c.bucket
            )));
        }
        if c.worker_count == 0 {
            return Err(CompressError::InvalidConfig("worker_count must be ≥ 1".into()));
        }
        if c.queue_capacity == 0 {
            return Err(CompressError::InvalidConfig("queue_capacity must be ≥ 1".into()));
        }
        if c.render_concurrency == 0 {
            return Err(CompressError::InvalidConfig(
                "render_concurrency must be ≥ 1".into(),
            ));
        }
        if c.task_timeout_secs == 0 {
            return Err(CompressError::InvalidConfig(
                "task_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_upload_mb == 0 {
            return Err(CompressError::InvalidConfig("max_upload_mb must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let c = ServiceConfig::builder().build().unwrap();
        assert_eq!(c.port, 5000);
        assert_eq!(c.bucket, "pdf-compressor");
        assert_eq!(c.task_timeout(), Duration::from_secs(300));
        assert_eq!(c.max_upload_bytes(), 50 * 1024 * 1024);
    }

    #[test]
    fn builder_clamps_counts() {
        let c = ServiceConfig::builder()
            .worker_count(0)
            .render_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.worker_count, 1);
        assert_eq!(c.render_concurrency, 1);
    }

    #[test]
    fn builder_rejects_bad_bucket_and_timeout() {
        assert!(ServiceConfig::builder().bucket("a/b").build().is_err());
        assert!(ServiceConfig::builder().bucket("").build().is_err());
        assert!(ServiceConfig::builder().task_timeout_secs(0).build().is_err());
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "port = 9100\nworker_count = 3\nbucket = \"docs\"").unwrap();

        let c = ServiceConfig::load_from(Some(f.path())).unwrap();
        assert_eq!(c.port, 9100);
        assert_eq!(c.worker_count, 3);
        assert_eq!(c.bucket, "docs");
        assert_eq!(c.queue_capacity, 64, "untouched fields keep defaults");
    }

    #[test]
    fn load_from_missing_explicit_file_fails() {
        let err = ServiceConfig::load_from(Some(Path::new("/no/such/pdfcompress.toml")));
        assert!(matches!(err, Err(CompressError::InvalidConfig(_))));
    }

    #[test]
    fn load_from_validates() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "task_timeout_secs = 0").unwrap();
        assert!(ServiceConfig::load_from(Some(f.path())).is_err());
    }
}
