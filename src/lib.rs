//! # docfiler
//!
//! Analyze scanned documents with a Vision Language Model (VLM) and file
//! them — rename or move — under a reviewed, collision-safe name.
//!
//! ## Why this crate?
//!
//! A scanner inbox fills up with `scan0001.pdf` files nobody can find again.
//! Content-based classification (keyword rules, OCR + regex) breaks on
//! letterheads, handwriting, and layout. Instead this crate rasterises a few
//! sample pages and lets a VLM read the document as a human would, then turns
//! the model's suggestion into a safe filesystem change: sanitised names,
//! traversal-proof destinations, and numeric disambiguation instead of
//! overwrites.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scan0001.pdf
//!  │
//!  ├─ 1. Input    classify as PDF or raster image
//!  ├─ 2. Select   sample first/middle/last pages (bounds API cost)
//!  ├─ 3. Render   pdfium rasterisation, embedded-image fallback
//!  ├─ 4. Encode   downscale to max dimension, canonical PNG
//!  ├─ 5. Suggest  VLM proposes filename + destination (user reviews)
//!  └─ 6. File     rename / move with per-directory collision safety
//! ```
//!
//! Steps 1–4 run without any network access; step 5 goes through the
//! [`SuggestionProvider`] trait the caller implements; step 6 only runs
//! after explicit confirmation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docfiler::{FileOperation, FilerConfig, FilingOrchestrator, FilingSuggestion};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FilerConfig::builder().base_dir("/archive").build()?;
//!     let orchestrator = FilingOrchestrator::new(config);
//!
//!     // Render sample pages for the VLM (and for on-screen preview).
//!     let pages = orchestrator.analyze("scan0001.pdf").await?;
//!     println!("rendered {} pages", pages.len());
//!
//!     // Suggestion normally comes from a SuggestionProvider; shown inline here.
//!     let suggestion = FilingSuggestion::parse(
//!         r#"{"filename": "20240110 Electricity Bill.pdf",
//!             "destination": "Finances/Bills",
//!             "confidence": 0.92,
//!             "reasoning": "utility invoice dated 2024-01-10"}"#,
//!     )?;
//!
//!     // After the user approves:
//!     let result = orchestrator
//!         .confirm_and_file("scan0001.pdf", &suggestion, FileOperation::Move)
//!         .await?;
//!     println!("filed to {}", result.target.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docfiler` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docfiler = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod filing;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod resolver;
pub mod suggestion;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FilerConfig, FilerConfigBuilder};
pub use error::{FilerError, PageError};
pub use filing::{FilingOrchestrator, FilingRequest};
pub use output::{FileOperation, FilingOutcome, FilingResult, RenderStrategyKind, RenderedPage};
pub use pipeline::input::{DocumentKind, SourceDocument};
pub use pipeline::select::PageSelection;
pub use progress::{FilingProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{SharedSuggestionProvider, SuggestionProvider};
pub use suggestion::FilingSuggestion;
