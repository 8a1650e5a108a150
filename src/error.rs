//! Error types for the docfiler library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`FilerError`] — **Fatal for one document**: rendering or filing of that
//!   document cannot proceed (unsupported format, traversal attempt, source
//!   vanished). Returned as `Err(FilerError)` from the per-document calls.
//!
//! * [`PageError`] — **Non-fatal**: a single PDF page failed under both
//!   rendering strategies while other pages are fine. Such pages are dropped
//!   from the render output rather than failing the whole document.
//!
//! Batch processing never propagates one document's `FilerError` into
//! another document's pipeline; the orchestrator collects one outcome per
//! input and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// All per-document errors returned by the docfiler library.
///
/// Page-level failures use [`PageError`] and are logged, not propagated,
/// unless every selected page fails.
#[derive(Debug, Error)]
pub enum FilerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The file kind could not be determined or the file could not be decoded.
    #[error(
        "Unsupported document format: '{}'\nSupported: pdf, png, jpg, jpeg, tiff, tif, bmp.",
        path.display()
    )]
    UnsupportedFormat { path: PathBuf },

    /// The PDF parsed but contains zero pages.
    #[error("Document has no pages: '{}'", path.display())]
    EmptyDocument { path: PathBuf },

    /// Source file was not found at the given path.
    #[error(
        "Source file not found: '{}'\nCheck the path exists and is readable.",
        path.display()
    )]
    SourceNotFound { path: PathBuf },

    /// Process does not have the required permission on a path.
    #[error("Permission denied for '{}': {detail}", path.display())]
    PermissionDenied { path: PathBuf, detail: String },

    // ── Filing errors ─────────────────────────────────────────────────────
    /// The suggested filename was empty after sanitisation.
    #[error("Invalid suggested filename {suggested:?}: nothing usable remains after removing path separators")]
    InvalidName { suggested: String },

    /// The suggested destination tries to escape the base directory.
    #[error("Suggested destination {suggested:?} resolves outside the filing base directory")]
    PathTraversal { suggested: String },

    /// Collision disambiguation gave up after the configured attempt limit.
    #[error(
        "Could not find a free name for '{filename}' in '{}' after {attempts} attempts",
        dir.display()
    )]
    DestinationConflict {
        dir: PathBuf,
        filename: String,
        attempts: u32,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// Every selected page failed under both strategies; no image produced.
    #[error("All {total} selected pages failed to render.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library. The embedded-image fallback still
    /// runs, so this is surfaced only when the fallback also fails.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FilerError {
    /// Map a filesystem error on `path` to the matching taxonomy variant.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FilerError::SourceNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => FilerError::PermissionDenied {
                path: path.to_path_buf(),
                detail: err.to_string(),
            },
            _ => FilerError::Internal(format!("{}: {}", path.display(), err)),
        }
    }
}

/// A non-fatal error for a single PDF page.
///
/// Recorded when a page fails under a rendering strategy. The render call
/// continues unless ALL selected pages fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Native rasterisation failed for this page.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The fallback found no embedded raster image on this page.
    #[error("Page {page}: no embedded image could be extracted: {detail}")]
    ExtractionFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_conflict_display() {
        let e = FilerError::DestinationConflict {
            dir: PathBuf::from("/archive/Finances"),
            filename: "bill.pdf".into(),
            attempts: 1000,
        };
        let msg = e.to_string();
        assert!(msg.contains("bill.pdf"), "got: {msg}");
        assert!(msg.contains("1000"), "got: {msg}");
    }

    #[test]
    fn path_traversal_display_names_the_input() {
        let e = FilerError::PathTraversal {
            suggested: "../../etc".into(),
        };
        assert!(e.to_string().contains("../../etc"));
    }

    #[test]
    fn io_not_found_maps_to_source_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e = FilerError::from_io(std::path::Path::new("/in/a.pdf"), io);
        assert!(matches!(e, FilerError::SourceNotFound { .. }));
    }

    #[test]
    fn io_permission_denied_keeps_detail() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES");
        let e = FilerError::from_io(std::path::Path::new("/in/a.pdf"), io);
        match e {
            FilerError::PermissionDenied { detail, .. } => assert!(detail.contains("EACCES")),
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn page_error_display() {
        let e = PageError::RenderFailed {
            page: 4,
            detail: "corrupt stream".into(),
        };
        assert!(e.to_string().contains("Page 4"));
        assert!(e.to_string().contains("corrupt stream"));
    }
}
