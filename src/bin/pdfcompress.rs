//! CLI binary for edgequake-pdfcompress.
//!
//! `serve` runs the HTTP service; `compress` runs the same pipeline once on
//! a local file with a terminal progress bar; `tiers` prints the catalog.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdfcompress::session::{derive_key, sanitize_filename, KeyVariant};
use edgequake_pdfcompress::{
    page_count, server, tier, CompressionService, CompressionTier, CompressionWorker,
    LopdfAssembler, MemoryStore, NoopProgress, PdfiumRasterizer, ProgressSink, ServiceConfig,
    SessionId, StoreGateway, TaskId, TaskSpec,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Spinner until the page count is known, then a page bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressSink for CliProgress {
    fn on_checkpoint(&self, progress: u8, step: &str) {
        self.bar.set_prefix(capitalise(step));
        self.bar.set_message(format!("{progress}%"));
    }

    fn on_pages_rendered(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Encoding");
    }

    fn on_page_encoded(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on port 8080 with 4 workers
  pdfcompress serve --port 8080 --workers 4

  # Compress one file locally
  pdfcompress compress scan.pdf --mode strong -o scan.small.pdf

  # List the tiers
  pdfcompress tiers

TIERS:
  strong   72 dpi, JPEG q30   smallest files, visibly softer
  medium  100 dpi, JPEG q50   default
  weak    150 dpi, JPEG q80   closest to the original

ENVIRONMENT VARIABLES:
  PDFCOMPRESS_CONFIG      TOML config file (default: config/pdfcompress.toml)
  PDFCOMPRESS__<FIELD>    Override any config field, e.g. PDFCOMPRESS__PORT=8080
  PDFIUM_LIB_PATH         Path to libpdfium when it is not on the loader path
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Recompress PDFs by rasterising pages and re-encoding them as JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "pdfcompress",
    version,
    about = "Recompress PDFs at a fixed quality tier: HTTP service or one-shot CLI",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFCOMPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFCOMPRESS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and worker pool.
    Serve(ServeArgs),
    /// Compress one local PDF.
    Compress(CompressArgs),
    /// Print the compression tiers.
    Tiers {
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// TOML config file (overrides PDFCOMPRESS_CONFIG).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Number of background workers.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Root directory of the object store.
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompressArgs {
    /// PDF to compress.
    input: PathBuf,

    /// Output path. Default: compressed_<input name> next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compression tier: strong, medium or weak.
    #[arg(short, long, default_value = "medium")]
    mode: CompressionTier,

    /// Pages encoded concurrently.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // While a progress bar is on screen only errors are logged.
    let show_progress = match &cli.command {
        Command::Compress(args) => !cli.quiet && !args.no_progress,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Compress(args) => compress(args, show_progress, cli.quiet).await,
        Command::Tiers { json } => print_tiers(json),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let loaded = match &args.config {
        Some(path) => ServiceConfig::load_from(Some(path.as_path())),
        None => ServiceConfig::load(),
    };
    let loaded = loaded.context("Failed to load configuration")?;

    let mut builder = ServiceConfig::builder()
        .host(args.host.unwrap_or(loaded.host))
        .port(args.port.unwrap_or(loaded.port))
        .bucket(loaded.bucket)
        .storage_root(args.storage_root.unwrap_or(loaded.storage_root))
        .workspace_root(loaded.workspace_root)
        .worker_count(args.workers.unwrap_or(loaded.worker_count))
        .queue_capacity(loaded.queue_capacity)
        .render_concurrency(loaded.render_concurrency)
        .task_timeout_secs(loaded.task_timeout_secs)
        .result_ttl_hours(loaded.result_ttl_hours)
        .max_upload_mb(loaded.max_upload_mb);
    if let Some(lib) = args.pdfium_lib.or(loaded.pdfium_lib_path) {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().context("Invalid configuration")?;

    let service = Arc::new(
        CompressionService::start(config)
            .await
            .context("Failed to start compression service")?,
    );

    server::serve(Arc::clone(&service), async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown requested");
    })
    .await
    .context("HTTP server failed")?;

    match Arc::try_unwrap(service) {
        Ok(service) => service.shutdown().await,
        Err(_) => {
            tracing::warn!("Service still shared at shutdown; queued tasks were not drained")
        }
    }
    Ok(())
}

async fn compress(args: CompressArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let started = Instant::now();
    let filename = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, &filename));

    // The local run goes through the same store → worker → store path as the
    // service, with an in-memory bucket.
    let store = StoreGateway::connect(Arc::new(MemoryStore::new()), "local").await;
    let session = SessionId::generate();
    let filename = sanitize_filename(&filename);
    let source_key = derive_key(&session, KeyVariant::Original, &filename);
    store
        .put(&args.input, &source_key)
        .await
        .with_context(|| format!("Cannot read {}", args.input.display()))?;

    let workspace_root = std::env::temp_dir();
    let worker = CompressionWorker::new(
        store.clone(),
        Arc::new(PdfiumRasterizer::with_library(args.pdfium_lib.clone())),
        Arc::new(LopdfAssembler),
        workspace_root,
        args.concurrency,
    );
    let spec = TaskSpec {
        task_id: TaskId::new(),
        session_id: session,
        original_filename: filename,
        source_key,
        tier: args.mode,
    };

    let outcome = if show_progress {
        let progress = CliProgress::new();
        let outcome = worker.run(&spec, &progress).await;
        progress.bar.finish_and_clear();
        outcome
    } else {
        worker.run(&spec, &NoopProgress).await
    };
    let result = outcome.context("Compression failed")?;

    store
        .get(&result.compressed_key, &output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        let pages = std::fs::read(&output)
            .ok()
            .and_then(|b| page_count(&b).ok())
            .unwrap_or(0);
        eprintln!(
            "{}  {} pages  {} → {}  ({:.1}% smaller, {})  {}ms",
            green("✔"),
            pages,
            human_bytes(result.original_size),
            human_bytes(result.compressed_size),
            result.compression_ratio,
            args.mode,
            started.elapsed().as_millis(),
        );
        eprintln!("   {}", bold(&output.display().to_string()));
    }
    Ok(())
}

fn default_output(input: &Path, filename: &str) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("compressed_{filename}"))
}

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

fn print_tiers(json: bool) -> Result<()> {
    let catalog = tier::catalog();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&catalog).context("Failed to serialise tiers")?
        );
        return Ok(());
    }
    for info in catalog {
        println!(
            "{} {:<7} {:>3} dpi  q{:<3} {}",
            cyan("◆"),
            bold(info.name.name()),
            info.dpi,
            info.quality,
            dim(info.description),
        );
    }
    Ok(())
}
