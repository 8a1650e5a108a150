//! Pipeline stages for turning a document into VLM-ready page images.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a new rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ select ──▶ render ──▶ encode
//! (path)   (1st/mid/   (strategy  (resize +
//!           last)       chain)     PNG)
//! ```
//!
//! 1. [`input`]  — classify the source file as PDF or raster image
//! 2. [`select`] — sample first/middle/last page indices to bound API cost
//! 3. [`render`] — walk the rendering-strategy chain; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 4. [`encode`] — bound dimensions and encode each page to canonical PNG

pub mod encode;
pub mod input;
pub mod render;
pub mod select;
