//! Input resolution: classify a user-supplied path as a renderable document.
//!
//! ## Why check magic bytes?
//!
//! Extensions lie. A scanned `invoice.pdf` that is really a JPEG would crash
//! the PDF rasteriser; checking the `%PDF` magic before handing the file to a
//! rendering strategy turns that crash into a meaningful
//! `UnsupportedFormat` error. The detected kind is fixed at open time and
//! never changes over the document's lifetime.

use crate::error::FilerError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a source file contains, decided once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A PDF document; pages are rasterised individually.
    Pdf,
    /// A single raster image (png/jpg/jpeg/tiff/tif/bmp).
    Image,
}

/// A read-only view over an existing filesystem entry.
///
/// Not mutated by the rendering pipeline; the resolver relocates the
/// underlying file only after analysis completes.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: PathBuf,
    kind: DocumentKind,
    byte_size: u64,
}

/// Raster extensions accepted as `DocumentKind::Image`.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

impl SourceDocument {
    /// Open `path`, validate existence and readability, and detect its kind.
    ///
    /// # Errors
    /// - [`FilerError::SourceNotFound`] when the file does not exist
    /// - [`FilerError::PermissionDenied`] when it cannot be opened for reading
    /// - [`FilerError::UnsupportedFormat`] when neither the extension nor the
    ///   content identifies a supported format
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FilerError> {
        let path = path.as_ref().to_path_buf();

        let metadata = std::fs::metadata(&path).map_err(|e| FilerError::from_io(&path, e))?;
        if !metadata.is_file() {
            return Err(FilerError::UnsupportedFormat { path });
        }

        let kind = detect_kind(&path)?;
        debug!("Opened {} as {:?} ({} bytes)", path.display(), kind, metadata.len());

        Ok(Self {
            path,
            kind,
            byte_size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

/// Detect the document kind from extension, confirmed by magic bytes for PDFs.
fn detect_kind(path: &Path) -> Result<DocumentKind, FilerError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => {
            // Verify PDF magic bytes so the rasteriser never sees a mislabelled file
            use std::io::Read;
            let mut f = std::fs::File::open(path).map_err(|e| FilerError::from_io(path, e))?;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic == b"%PDF" {
                Ok(DocumentKind::Pdf)
            } else {
                Err(FilerError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        }
        Some(e) if IMAGE_EXTENSIONS.contains(&e) => Ok(DocumentKind::Image),
        _ => Err(FilerError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_nonexistent_is_source_not_found() {
        let err = SourceDocument::open("/definitely/not/a/real/file.pdf").unwrap_err();
        assert!(matches!(err, FilerError::SourceNotFound { .. }));
    }

    #[test]
    fn pdf_magic_bytes_are_verified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"not a pdf at all")
            .unwrap();

        let err = SourceDocument::open(&path).unwrap_err();
        assert!(matches!(err, FilerError::UnsupportedFormat { .. }));
    }

    #[test]
    fn valid_pdf_header_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.7\n%rest of file")
            .unwrap();

        let doc = SourceDocument::open(&path).unwrap();
        assert_eq!(doc.kind(), DocumentKind::Pdf);
        assert!(doc.byte_size() > 0);
    }

    #[test]
    fn image_extensions_are_detected_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["scan.png", "photo.JPG", "page.TIFF"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"bytes").unwrap();
            let doc = SourceDocument::open(&path).unwrap();
            assert_eq!(doc.kind(), DocumentKind::Image, "for {name}");
        }
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let err = SourceDocument::open(&path).unwrap_err();
        assert!(matches!(err, FilerError::UnsupportedFormat { .. }));
    }
}
