//! Page rendering: turn one document into normalized page images.
//!
//! ## Strategy chain
//!
//! PDF rendering backends fail in the field — pdfium may be missing on the
//! host, a scanned PDF may carry a corrupt content stream. Instead of one
//! backend and a hard error, rendering walks an ordered list of strategies
//! behind a common trait:
//!
//! 1. [`PdfiumRaster`] — native page rasterisation at the configured DPI.
//! 2. [`EmbeddedImages`] — pure-Rust extraction of embedded raster images
//!    per page via lopdf, without re-rendering vector content.
//!
//! A page that fails under every strategy is omitted; the call only fails
//! outright when no page at all could be produced. Each emitted page records
//! which strategy produced it.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state that must not run on
//! async worker threads, and decoding large scans is CPU-bound anyway. The
//! whole blocking section runs on tokio's dedicated blocking pool.

use crate::config::FilerConfig;
use crate::error::{FilerError, PageError};
use crate::output::{RenderStrategyKind, RenderedPage};
use crate::pipeline::encode;
use crate::pipeline::input::{DocumentKind, SourceDocument};
use crate::pipeline::select::PageSelection;
use image::DynamicImage;
use lopdf::{Dictionary, Object};
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// One document-to-image conversion backend, tried in priority order.
///
/// Strategies are pure with respect to the filesystem: the same document and
/// indices yield the same images or the same failure, and nothing is written.
trait RenderStrategy: Send + Sync {
    fn kind(&self) -> RenderStrategyKind;

    /// Number of pages in the document, or a detail string when the
    /// strategy cannot open it at all.
    fn page_count(&self, pdf_path: &Path) -> Result<usize, String>;

    /// Render the requested pages. A document-level failure returns `Err`;
    /// a glitch on one page yields a per-page `Err` entry so the remaining
    /// pages survive.
    fn render_pages(
        &self,
        pdf_path: &Path,
        indices: &[usize],
        config: &FilerConfig,
    ) -> Result<Vec<(usize, Result<DynamicImage, PageError>)>, String>;
}

/// Render a document into at most `config.max_pages` normalized PNG pages.
///
/// Image documents produce exactly one page at index 0. PDF documents are
/// sampled first/middle/last and rendered through the strategy chain.
///
/// # Errors
/// - [`FilerError::UnsupportedFormat`] when the file cannot be decoded at all
/// - [`FilerError::EmptyDocument`] for a zero-page PDF
/// - [`FilerError::AllPagesFailed`] when every selected page failed
pub async fn render(
    document: &SourceDocument,
    config: &FilerConfig,
) -> Result<Vec<RenderedPage>, FilerError> {
    let doc = document.clone();
    let config = config.clone();

    tokio::task::spawn_blocking(move || render_blocking(&doc, &config))
        .await
        .map_err(|e| FilerError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of document rendering.
fn render_blocking(
    document: &SourceDocument,
    config: &FilerConfig,
) -> Result<Vec<RenderedPage>, FilerError> {
    match document.kind() {
        DocumentKind::Image => render_image(document, config),
        DocumentKind::Pdf => render_pdf(document, config),
    }
}

/// Decode a single raster image and emit one normalized page.
fn render_image(
    document: &SourceDocument,
    config: &FilerConfig,
) -> Result<Vec<RenderedPage>, FilerError> {
    let img = image::open(document.path()).map_err(|e| {
        debug!("Image decode failed for {}: {e}", document.path().display());
        FilerError::UnsupportedFormat {
            path: document.path().to_path_buf(),
        }
    })?;

    let page = encode::encode_page(0, img, RenderStrategyKind::Primary, config.max_dimension)
        .map_err(|e| FilerError::Internal(format!("PNG encoding failed: {e}")))?;

    Ok(vec![page])
}

/// Walk the strategy chain over the sampled pages of a PDF.
fn render_pdf(
    document: &SourceDocument,
    config: &FilerConfig,
) -> Result<Vec<RenderedPage>, FilerError> {
    let path = document.path();
    let strategies: [&dyn RenderStrategy; 2] = [&PdfiumRaster, &EmbeddedImages];

    // First strategy that can open the document decides the page count.
    let mut count: Option<usize> = None;
    for strategy in strategies {
        match strategy.page_count(path) {
            Ok(n) => {
                count = Some(n);
                break;
            }
            Err(detail) => debug!(
                "{:?} strategy cannot open {}: {detail}",
                strategy.kind(),
                path.display()
            ),
        }
    }
    let page_count = count.ok_or_else(|| FilerError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    if page_count == 0 {
        return Err(FilerError::EmptyDocument {
            path: path.to_path_buf(),
        });
    }

    let selection = PageSelection::sample(page_count, config.max_pages);
    info!(
        "PDF {} has {page_count} pages; rendering {:?}",
        path.display(),
        selection.indices()
    );

    let mut collected: BTreeMap<usize, (DynamicImage, RenderStrategyKind)> = BTreeMap::new();
    let mut remaining: Vec<usize> = selection.indices().to_vec();
    let mut first_error: Option<String> = None;

    for strategy in strategies {
        if remaining.is_empty() {
            break;
        }
        match strategy.render_pages(path, &remaining, config) {
            Ok(results) => {
                for (idx, res) in results {
                    match res {
                        Ok(img) => {
                            collected.insert(idx, (img, strategy.kind()));
                        }
                        Err(e) => {
                            warn!("{e}");
                            first_error.get_or_insert_with(|| e.to_string());
                        }
                    }
                }
                remaining.retain(|i| !collected.contains_key(i));
            }
            Err(detail) => {
                warn!(
                    "{:?} strategy failed for {}: {detail}",
                    strategy.kind(),
                    path.display()
                );
                first_error.get_or_insert(detail);
            }
        }
    }

    let total = selection.len();
    let mut pages = Vec::with_capacity(collected.len());
    for (idx, (img, kind)) in collected {
        match encode::encode_page(idx, img, kind, config.max_dimension) {
            Ok(page) => pages.push(page),
            Err(e) => {
                warn!("Page {idx}: PNG encoding failed: {e}");
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if pages.is_empty() {
        return Err(FilerError::AllPagesFailed {
            total,
            first_error: first_error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    Ok(pages)
}

// ── Primary strategy: pdfium rasterisation ───────────────────────────────

struct PdfiumRaster;

impl PdfiumRaster {
    /// Bind to a pdfium library: `PDFIUM_LIB_PATH` first, then the system
    /// library, then the executable's directory.
    fn bind() -> Result<Pdfium, String> {
        if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            {
                return Ok(Pdfium::new(bindings));
            }
        }
        Pdfium::bind_to_system_library()
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            })
            .map(Pdfium::new)
            .map_err(|e| format!("{e:?}"))
    }
}

impl RenderStrategy for PdfiumRaster {
    fn kind(&self) -> RenderStrategyKind {
        RenderStrategyKind::Primary
    }

    fn page_count(&self, pdf_path: &Path) -> Result<usize, String> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| format!("{e:?}"))?;
        Ok(document.pages().len() as usize)
    }

    fn render_pages(
        &self,
        pdf_path: &Path,
        indices: &[usize],
        config: &FilerConfig,
    ) -> Result<Vec<(usize, Result<DynamicImage, PageError>)>, String> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| format!("{e:?}"))?;
        let pages = document.pages();

        let mut results = Vec::with_capacity(indices.len());
        for &idx in indices {
            results.push((idx, rasterise_page(&pages, idx, config)));
        }
        Ok(results)
    }
}

/// Rasterise one page at the configured DPI, capped at `max_dimension`.
fn rasterise_page(
    pages: &PdfPages<'_>,
    idx: usize,
    config: &FilerConfig,
) -> Result<DynamicImage, PageError> {
    let page = pages.get(idx as u16).map_err(|e| PageError::RenderFailed {
        page: idx,
        detail: format!("{e:?}"),
    })?;

    // Cap the render size up front so an A0 poster at 300 DPI never
    // allocates hundreds of megapixels just to be downscaled again.
    let page_w = page.width().value;
    let page_h = page.height().value;
    let scale =
        (config.max_dimension as f32 / page_w.max(page_h)).min(config.target_dpi as f32 / 72.0);
    let render_config = PdfRenderConfig::new()
        .set_target_width((page_w * scale) as i32)
        .set_target_height((page_h * scale) as i32)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| PageError::RenderFailed {
            page: idx,
            detail: format!("{e:?}"),
        })?;

    let image = bitmap.as_image();
    debug!("Rasterised page {idx} -> {}x{} px", image.width(), image.height());
    Ok(image)
}

// ── Fallback strategy: embedded image extraction ─────────────────────────

struct EmbeddedImages;

impl RenderStrategy for EmbeddedImages {
    fn kind(&self) -> RenderStrategyKind {
        RenderStrategyKind::Fallback
    }

    fn page_count(&self, pdf_path: &Path) -> Result<usize, String> {
        let doc = lopdf::Document::load(pdf_path).map_err(|e| e.to_string())?;
        Ok(doc.get_pages().len())
    }

    fn render_pages(
        &self,
        pdf_path: &Path,
        indices: &[usize],
        _config: &FilerConfig,
    ) -> Result<Vec<(usize, Result<DynamicImage, PageError>)>, String> {
        let doc = lopdf::Document::load(pdf_path).map_err(|e| e.to_string())?;
        let pages = doc.get_pages();

        let mut results = Vec::with_capacity(indices.len());
        for &idx in indices {
            let res = pages
                .get(&((idx + 1) as u32))
                .ok_or_else(|| PageError::ExtractionFailed {
                    page: idx,
                    detail: "page index out of range".into(),
                })
                .and_then(|&page_id| extract_page_image(&doc, page_id, idx));
            results.push((idx, res));
        }
        Ok(results)
    }
}

/// Resolve an indirect reference, or return the object unchanged.
fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    if let Ok(id) = obj.as_reference() {
        if let Ok(target) = doc.get_object(id) {
            return target;
        }
    }
    obj
}

/// Find the page's Resources dictionary, walking the Pages tree for
/// inherited entries.
fn page_resources<'a>(
    doc: &'a lopdf::Document,
    page_id: lopdf::ObjectId,
) -> Option<&'a Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    loop {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res).as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve(doc, parent).as_dict().ok()?;
    }
}

/// Extract the largest embedded raster image on the page.
///
/// Scanned-document PDFs place a single full-page image per page; vector
/// pages usually carry none, which is reported as a per-page failure rather
/// than a blank page.
fn extract_page_image(
    doc: &lopdf::Document,
    page_id: lopdf::ObjectId,
    idx: usize,
) -> Result<DynamicImage, PageError> {
    let fail = |detail: String| PageError::ExtractionFailed { page: idx, detail };

    let resources =
        page_resources(doc, page_id).ok_or_else(|| fail("page has no Resources".into()))?;
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .ok_or_else(|| fail("page has no XObject resources".into()))?;

    let mut best: Option<DynamicImage> = None;
    for (_name, obj) in xobjects.iter() {
        let stream = match resolve(doc, obj).as_stream() {
            Ok(s) => s,
            Err(_) => continue,
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|s| s.as_name().ok())
            .map(|n| n == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        match decode_image_stream(stream) {
            Ok(img) => {
                let better = best
                    .as_ref()
                    .map(|b| img.width() * img.height() > b.width() * b.height())
                    .unwrap_or(true);
                if better {
                    best = Some(img);
                }
            }
            Err(detail) => debug!("Page {idx}: skipping image XObject: {detail}"),
        }
    }

    best.ok_or_else(|| fail("no decodable embedded image on page".into()))
}

/// Decode one image XObject stream into pixels.
///
/// DCT/JPX-encoded streams are complete JPEG files and go straight through
/// the image crate; flate-encoded streams are rebuilt from Width, Height,
/// and ColorSpace.
fn decode_image_stream(stream: &lopdf::Stream) -> Result<DynamicImage, String> {
    let filters = stream_filters(stream);

    if filters.iter().any(|f| f == b"DCTDecode" || f == b"JPXDecode") {
        return image::load_from_memory(&stream.content).map_err(|e| e.to_string());
    }

    let data = stream
        .decompressed_content()
        .map_err(|e| format!("decompress failed: {e}"))?;

    let width = dict_u32(&stream.dict, b"Width").ok_or("missing Width")?;
    let height = dict_u32(&stream.dict, b"Height").ok_or("missing Height")?;
    let bpc = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bpc != 8 {
        return Err(format!("unsupported BitsPerComponent {bpc}"));
    }

    // Colour space is inferred from the data length; indexed and ICC-based
    // spaces fall through to the error branch and the XObject is skipped.
    let pixels = (width as usize) * (height as usize);
    if data.len() >= pixels * 3 {
        image::RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "RGB buffer size mismatch".to_string())
    } else if data.len() >= pixels {
        image::GrayImage::from_raw(width, height, data[..pixels].to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| "grayscale buffer size mismatch".to_string())
    } else {
        Err(format!(
            "image data too short: {} bytes for {width}x{height}",
            data.len()
        ))
    }
}

/// Collect the stream's Filter entry as a list of filter names.
fn stream_filters(stream: &lopdf::Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => vec![],
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    dict.get(key).ok()?.as_i64().ok().map(|v| v as u32)
}
