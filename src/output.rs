//! Output types surfaced to callers: rendered pages and filing results.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which rendering strategy produced a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStrategyKind {
    /// Native page rasterisation via pdfium (or direct image decode).
    Primary,
    /// Embedded raster images extracted from the PDF without re-rendering.
    Fallback,
}

/// One normalized page image, held in memory for the duration of a single
/// analysis call and never persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    /// 0-based page index; always 0 for single-image documents.
    pub index: usize,
    /// Width after normalization, in pixels.
    pub width: u32,
    /// Height after normalization, in pixels.
    pub height: u32,
    /// Encoded PNG bytes.
    pub png: Vec<u8>,
    /// The strategy that produced this page.
    pub strategy: RenderStrategyKind,
}

impl RenderedPage {
    /// The PNG bytes as standard base64, ready for a VLM request body.
    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        STANDARD.encode(&self.png)
    }
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png", &format!("<{} bytes>", self.png.len()))
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// The filesystem operation a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    /// In-place rename; target keeps the source's parent directory.
    Rename,
    /// Relocate under the base directory, creating intermediate directories.
    Move,
    /// Explicit no-op; the document was reviewed and left where it is.
    Skipped,
}

/// Whether a filing operation succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum FilingOutcome {
    Success,
    /// Human-readable reason, suitable for direct display.
    Failure(String),
}

/// Record of one executed (or skipped) filing operation.
///
/// Created once per operation, immutable after creation, surfaced to the
/// presentation layer for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingResult {
    /// Where the file was before the operation.
    pub source: PathBuf,
    /// The resolved absolute target path (equals `source` for skips).
    pub target: PathBuf,
    /// The operation that was performed.
    pub operation: FileOperation,
    /// Success, or a displayable failure reason.
    pub outcome: FilingOutcome,
}

impl FilingResult {
    pub fn is_success(&self) -> bool {
        self.outcome == FilingOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_page_base64_round_trips() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let page = RenderedPage {
            index: 0,
            width: 2,
            height: 2,
            png: vec![0x89, b'P', b'N', b'G'],
            strategy: RenderStrategyKind::Primary,
        };
        let decoded = STANDARD.decode(page.to_base64()).unwrap();
        assert_eq!(decoded, page.png);
    }

    #[test]
    fn debug_does_not_dump_image_bytes() {
        let page = RenderedPage {
            index: 1,
            width: 100,
            height: 50,
            png: vec![0; 4096],
            strategy: RenderStrategyKind::Fallback,
        };
        let dbg = format!("{page:?}");
        assert!(dbg.contains("<4096 bytes>"));
        assert!(!dbg.contains("0, 0, 0"));
    }

    #[test]
    fn filing_result_serialises_to_json() {
        let r = FilingResult {
            source: PathBuf::from("/in/a.pdf"),
            target: PathBuf::from("/out/bills/a.pdf"),
            operation: FileOperation::Move,
            outcome: FilingOutcome::Success,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"move\""));
        assert!(json.contains("\"success\""));

        let back: FilingResult = serde_json::from_str(&json).unwrap();
        assert!(back.is_success());
        assert_eq!(back.operation, FileOperation::Move);
    }

    #[test]
    fn failure_outcome_carries_reason() {
        let r = FilingResult {
            source: PathBuf::from("/in/a.pdf"),
            target: PathBuf::from("/in/a.pdf"),
            operation: FileOperation::Rename,
            outcome: FilingOutcome::Failure("source vanished".into()),
        };
        assert!(!r.is_success());
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("source vanished"));
    }
}
