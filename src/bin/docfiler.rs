//! CLI binary for docfiler.
//!
//! A thin shim over the library crate that maps CLI flags to `FilerConfig`
//! and prints results. Suggestion acquisition needs a caller-supplied VLM
//! provider, so the binary covers the two offline halves of the pipeline:
//! rendering sample pages (`analyze`) and executing a reviewed filing
//! decision (`file`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docfiler::{
    FileOperation, FilerConfig, FilingOrchestrator, FilingProgressCallback, FilingRequest,
    FilingSuggestion, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the batch, a log line per
/// document. Works correctly when documents complete out-of-order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl FilingProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.set_prefix("Processing");
    }

    fn on_document_start(&self, _index: usize, _total: usize, path: &Path) {
        if let Some(name) = path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
    }

    fn on_document_complete(&self, _index: usize, _total: usize, path: &Path) {
        self.bar
            .println(format!("  {} {}", green("✓"), path.display()));
        self.bar.inc(1);
    }

    fn on_document_error(&self, _index: usize, _total: usize, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), path.display(), red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} documents processed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents processed  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render sample pages (first/middle/last) and report dimensions
  docfiler analyze scan0001.pdf

  # Dump the rendered pages as PNGs for inspection
  docfiler analyze scan0001.pdf --dump-dir ./pages

  # Batch analysis with a progress bar
  docfiler analyze inbox/*.pdf

  # Move a document under the archive tree (creates directories)
  docfiler file scan0001.pdf --name "20240110 Electricity Bill.pdf" \
      --dest "Finances/Bills" --base /archive --mode move

  # Rename in place
  docfiler file scan0001.pdf --name "20240110 Bill.pdf" --mode rename

ENVIRONMENT VARIABLES:
  IMAGE_DPI             Rendering DPI for PDF pages (default 300)
  MAX_IMAGE_DIMENSION   Max rendered width/height in pixels (default 2048)
  PDF_PAGES_TO_EXTRACT  Max pages sampled per document (default 3)
  DEFAULT_DEST_BASE     Base directory for --mode move
  PDFIUM_LIB_PATH       Path to an existing libpdfium shared library

PDF RENDERING:
  Native rasterisation uses pdfium (set PDFIUM_LIB_PATH or install the
  system library). Without pdfium, scanned PDFs still work through the
  embedded-image fallback; born-digital vector PDFs do not.
"#;

/// Analyze scanned documents and file them under safe, descriptive names.
#[derive(Parser, Debug)]
#[command(
    name = "docfiler",
    version,
    about = "Analyze scanned documents and file them under safe, descriptive names",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render sample pages from one or more documents.
    Analyze {
        /// PDF or image files to analyze.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the rendered pages as PNG files into this directory.
        #[arg(long)]
        dump_dir: Option<PathBuf>,

        /// Rendering DPI (72–600).
        #[arg(long, env = "IMAGE_DPI")]
        dpi: Option<u32>,

        /// Maximum rendered width/height in pixels.
        #[arg(long, env = "MAX_IMAGE_DIMENSION")]
        max_dimension: Option<u32>,

        /// Maximum pages sampled per document.
        #[arg(long, env = "PDF_PAGES_TO_EXTRACT")]
        max_pages: Option<usize>,

        /// Documents rendered concurrently.
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Execute a reviewed filing decision for one document.
    File {
        /// The document to file.
        source: PathBuf,

        /// Target filename (extension included).
        #[arg(long)]
        name: String,

        /// Destination directory, relative to the base (move mode only).
        #[arg(long, default_value = "")]
        dest: String,

        /// Base directory under which destinations resolve.
        #[arg(long, env = "DEFAULT_DEST_BASE")]
        base: Option<PathBuf>,

        /// Operation: move, rename, or skip.
        #[arg(long, default_value = "move")]
        mode: String,

        /// Print the FilingResult as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        match cli.command {
            Command::Analyze { .. } => "error",
            Command::File { .. } => "info",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Analyze {
            inputs,
            dump_dir,
            dpi,
            max_dimension,
            max_pages,
            concurrency,
        } => {
            analyze(
                &inputs,
                dump_dir.as_deref(),
                dpi,
                max_dimension,
                max_pages,
                concurrency,
                cli.quiet,
            )
            .await
        }
        Command::File {
            source,
            name,
            dest,
            base,
            mode,
            json,
        } => file_one(&source, &name, &dest, base, &mode, json).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn analyze(
    inputs: &[PathBuf],
    dump_dir: Option<&Path>,
    dpi: Option<u32>,
    max_dimension: Option<u32>,
    max_pages: Option<usize>,
    concurrency: usize,
    quiet: bool,
) -> Result<()> {
    let mut builder = FilerConfig::builder().concurrency(concurrency);
    if let Some(dpi) = dpi {
        builder = builder.target_dpi(dpi);
    }
    if let Some(px) = max_dimension {
        builder = builder.max_dimension(px);
    }
    if let Some(n) = max_pages {
        builder = builder.max_pages(n);
    }
    let config = builder.build().context("Invalid configuration")?;

    let mut orchestrator = FilingOrchestrator::new(config);
    if !quiet && inputs.len() > 1 {
        let cb = CliProgressCallback::new();
        orchestrator = orchestrator.with_progress(cb as ProgressCallback);
    }

    if let Some(dir) = dump_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;
    }

    let results = orchestrator.analyze_batch(inputs).await;

    let mut failures = 0usize;
    for (path, result) in inputs.iter().zip(results) {
        match result {
            Ok(pages) => {
                if !quiet {
                    for page in &pages {
                        println!(
                            "{}  page {:>2}  {:>4}x{:<4}  {:>7}  {:?}",
                            path.display(),
                            page.index,
                            page.width,
                            page.height,
                            dim(&format!("{} B", page.png.len())),
                            page.strategy,
                        );
                    }
                }
                if let Some(dir) = dump_dir {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "page".to_string());
                    for page in &pages {
                        let out = dir.join(format!("{stem}-p{}.png", page.index));
                        tokio::fs::write(&out, &page.png)
                            .await
                            .with_context(|| format!("Failed to write {}", out.display()))?;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", red("✗"), path.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} documents failed", inputs.len());
    }
    Ok(())
}

async fn file_one(
    source: &Path,
    name: &str,
    dest: &str,
    base: Option<PathBuf>,
    mode: &str,
    json: bool,
) -> Result<()> {
    let operation = match mode.to_lowercase().as_str() {
        "move" => FileOperation::Move,
        "rename" => FileOperation::Rename,
        "skip" | "skipped" => FileOperation::Skipped,
        other => anyhow::bail!("Unknown mode '{other}': expected move, rename, or skip"),
    };

    let mut builder = FilerConfig::builder();
    if let Some(base) = base {
        builder = builder.base_dir(base);
    }
    let config = builder.build().context("Invalid configuration")?;
    let orchestrator = FilingOrchestrator::new(config);

    let suggestion = FilingSuggestion {
        filename: name.to_string(),
        destination: dest.to_string(),
        confidence: 1.0, // user-reviewed input
        reasoning: "manual filing via CLI".to_string(),
    };

    let results = orchestrator
        .file_batch(&[FilingRequest {
            source: source.to_path_buf(),
            suggestion,
            operation,
        }])
        .await;
    let result = results
        .into_iter()
        .next()
        .context("filing produced no result")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else if result.is_success() {
        println!(
            "{} {} -> {}",
            green("✔"),
            result.source.display(),
            bold(&result.target.display().to_string())
        );
    }

    if !result.is_success() {
        anyhow::bail!("filing failed for {}", source.display());
    }
    Ok(())
}
