//! Configuration types for the filing pipeline.
//!
//! All behaviour is controlled through [`FilerConfig`], built via its
//! [`FilerConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across worker tasks, log them, and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A ten-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::FilerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for document analysis and filing.
///
/// Built via [`FilerConfig::builder()`] or [`FilerConfig::default()`];
/// [`FilerConfig::from_env()`] overlays environment variables on the
/// defaults for CLI use.
///
/// # Example
/// ```rust
/// use docfiler::FilerConfig;
///
/// let config = FilerConfig::builder()
///     .target_dpi(300)
///     .max_dimension(2048)
///     .base_dir("/archive")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilerConfig {
    /// Rendering DPI used when rasterising PDF pages. Range: 72–600. Default: 300.
    ///
    /// 300 DPI keeps small print in scanned letters and bills legible to a
    /// VLM. The pixel cap below bounds memory regardless of this value, so
    /// raising DPI never makes an A0 poster allocate gigabytes.
    pub target_dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2048.
    ///
    /// Every emitted page is downscaled (aspect preserved) so that its larger
    /// dimension equals at most this value. 2048 matches the input sweet spot
    /// of current vision models while keeping upload sizes small.
    pub max_dimension: u32,

    /// Maximum number of pages sampled from a multi-page document. Default: 3.
    ///
    /// Three pages (first, middle, last) are enough for a VLM to classify a
    /// document and date it, at a third of the API cost of a full render.
    pub max_pages: usize,

    /// Base directory under which all suggested destinations resolve.
    ///
    /// Every move lands inside this tree; suggestions that try to escape it
    /// are rejected as path traversal. `None` means the source file's own
    /// parent directory is used as the base.
    pub base_dir: Option<PathBuf>,

    /// Upper bound on ` (N)` collision-disambiguation attempts. Default: 1000.
    ///
    /// Beyond this the resolver fails with `DestinationConflict` rather than
    /// probing the directory forever.
    pub max_disambiguation_attempts: u32,

    /// Number of documents processed concurrently in a batch. Default: 4.
    ///
    /// Rendering is CPU-bound and suggestion acquisition is network-bound, so
    /// a small pool overlaps the two nicely without thrashing the disk.
    pub concurrency: usize,
}

impl Default for FilerConfig {
    fn default() -> Self {
        Self {
            target_dpi: 300,
            max_dimension: 2048,
            max_pages: 3,
            base_dir: None,
            max_disambiguation_attempts: 1000,
            concurrency: 4,
        }
    }
}

impl FilerConfig {
    /// Create a new builder for `FilerConfig`.
    pub fn builder() -> FilerConfigBuilder {
        FilerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Overlay environment variables on the defaults.
    ///
    /// Recognised variables: `IMAGE_DPI`, `MAX_IMAGE_DIMENSION`,
    /// `PDF_PAGES_TO_EXTRACT`, `DEFAULT_DEST_BASE`. Unset variables keep
    /// their defaults; unparseable values are rejected.
    pub fn from_env() -> Result<Self, FilerError> {
        let mut builder = Self::builder();

        if let Ok(v) = std::env::var("IMAGE_DPI") {
            let dpi: u32 = v
                .parse()
                .map_err(|_| FilerError::InvalidConfig(format!("Invalid IMAGE_DPI: {v:?}")))?;
            builder = builder.target_dpi(dpi);
        }
        if let Ok(v) = std::env::var("MAX_IMAGE_DIMENSION") {
            let px: u32 = v.parse().map_err(|_| {
                FilerError::InvalidConfig(format!("Invalid MAX_IMAGE_DIMENSION: {v:?}"))
            })?;
            builder = builder.max_dimension(px);
        }
        if let Ok(v) = std::env::var("PDF_PAGES_TO_EXTRACT") {
            let n: usize = v.parse().map_err(|_| {
                FilerError::InvalidConfig(format!("Invalid PDF_PAGES_TO_EXTRACT: {v:?}"))
            })?;
            builder = builder.max_pages(n);
        }
        if let Ok(v) = std::env::var("DEFAULT_DEST_BASE") {
            if !v.is_empty() {
                builder = builder.base_dir(v);
            }
        }

        builder.build()
    }
}

/// Builder for [`FilerConfig`].
#[derive(Debug)]
pub struct FilerConfigBuilder {
    config: FilerConfig,
}

impl FilerConfigBuilder {
    pub fn target_dpi(mut self, dpi: u32) -> Self {
        self.config.target_dpi = dpi;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(dir.into());
        self
    }

    pub fn max_disambiguation_attempts(mut self, n: u32) -> Self {
        self.config.max_disambiguation_attempts = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FilerConfig, FilerError> {
        let c = &self.config;
        if c.target_dpi < 72 || c.target_dpi > 600 {
            return Err(FilerError::InvalidConfig(format!(
                "target_dpi must be 72–600, got {}",
                c.target_dpi
            )));
        }
        if c.max_dimension == 0 {
            return Err(FilerError::InvalidConfig(
                "max_dimension must be > 0".into(),
            ));
        }
        if c.max_pages == 0 {
            return Err(FilerError::InvalidConfig("max_pages must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
