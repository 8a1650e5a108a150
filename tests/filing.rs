//! End-to-end tests over the public API: render, suggest (canned provider),
//! and file, without any network or pdfium dependency.

use async_trait::async_trait;
use docfiler::{
    FileOperation, FilerConfig, FilerError, FilingOrchestrator, FilingRequest, FilingSuggestion,
    RenderStrategyKind, RenderedPage, SuggestionProvider,
};
use std::path::Path;
use std::sync::Arc;

/// A provider that answers with a fixed suggestion, recording the prompt.
struct CannedProvider {
    response: String,
}

#[async_trait]
impl SuggestionProvider for CannedProvider {
    async fn suggest(
        &self,
        _pages: &[RenderedPage],
        _prompt: &str,
    ) -> Result<FilingSuggestion, FilerError> {
        FilingSuggestion::parse(&self.response)
    }
}

fn write_png(path: &Path, w: u32, h: u32) {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
        w,
        h,
        image::Rgba([230, 230, 230, 255]),
    ));
    img.save(path).unwrap();
}

/// Build a PDF of `page_count` scanned pages, each a JPEG image XObject.
fn write_scanned_pdf(path: &Path, page_count: usize) {
    use lopdf::{dictionary, Object, Stream};

    let mut jpeg = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(120, 90, image::Rgb([15, 25, 35])))
        .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..page_count {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 120,
                "Height" => 90,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        ));
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"q 120 0 0 90 0 0 cm /Im0 Do Q".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => Object::Reference(image_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[tokio::test]
async fn oversized_png_renders_one_bounded_primary_page() {
    let dir = tempfile::tempdir().unwrap();
    let scan = dir.path().join("scan.png");
    write_png(&scan, 5000, 3000);

    let orchestrator = FilingOrchestrator::new(FilerConfig::default());
    let pages = orchestrator.analyze(&scan).await.unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].index, 0);
    assert_eq!((pages[0].width, pages[0].height), (2048, 1229));
    assert_eq!(pages[0].strategy, RenderStrategyKind::Primary);
}

#[tokio::test]
async fn ten_page_pdf_yields_first_middle_last_pages_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("contract.pdf");
    write_scanned_pdf(&pdf, 10);

    let orchestrator = FilingOrchestrator::new(FilerConfig::default());
    let pages = orchestrator.analyze(&pdf).await.unwrap();

    let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![0, 4, 9]);
    for page in &pages {
        assert!(page.width > 0 && page.height > 0);
    }
}

#[tokio::test]
async fn full_pipeline_renders_suggests_and_moves() {
    let dir = tempfile::tempdir().unwrap();
    let scan = dir.path().join("scan0001.png");
    write_png(&scan, 800, 600);

    let provider = Arc::new(CannedProvider {
        response: r#"```json
{"filename": "20240110 Electricity Bill.png",
 "destination": "Finances/Bills",
 "confidence": 0.92,
 "reasoning": "utility invoice"}
```"#
            .to_string(),
    });

    let config = FilerConfig::builder()
        .base_dir(dir.path().join("archive"))
        .build()
        .unwrap();
    let orchestrator = FilingOrchestrator::new(config).with_provider(provider);

    let pages = orchestrator.analyze(&scan).await.unwrap();
    let prompt = docfiler::prompts::build_prompt(None, None);
    let suggestion = orchestrator.suggest(&pages, &prompt).await.unwrap();
    assert_eq!(suggestion.destination, "Finances/Bills");

    let result = orchestrator
        .confirm_and_file(&scan, &suggestion, FileOperation::Move)
        .await
        .unwrap();

    let expected = dir
        .path()
        .join("archive/Finances/Bills/20240110 Electricity Bill.png");
    assert!(result.is_success());
    assert_eq!(result.target, expected);
    assert!(expected.exists());
    assert!(!scan.exists());
}

#[tokio::test]
async fn hostile_provider_output_never_reaches_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let scan = dir.path().join("scan.png");
    write_png(&scan, 100, 100);

    let provider = Arc::new(CannedProvider {
        response: r#"{"filename": "x.png", "destination": "../../outside", "confidence": 0.9, "reasoning": "bad"}"#
            .to_string(),
    });

    let config = FilerConfig::builder()
        .base_dir(dir.path().join("archive"))
        .build()
        .unwrap();
    let orchestrator = FilingOrchestrator::new(config).with_provider(provider);

    let pages = orchestrator.analyze(&scan).await.unwrap();
    let err = orchestrator.suggest(&pages, "prompt").await.unwrap_err();
    assert!(matches!(err, FilerError::PathTraversal { .. }));
    assert!(scan.exists());
    assert!(!dir.path().join("archive").exists());
}

#[tokio::test]
async fn mixed_batch_reports_failures_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    write_png(&good, 50, 50);
    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"not a png at all").unwrap();
    let missing = dir.path().join("missing.png");

    let orchestrator = FilingOrchestrator::new(FilerConfig::default());
    let results = orchestrator
        .analyze_batch(&[good.clone(), corrupt.clone(), missing.clone()])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(FilerError::UnsupportedFormat { .. })
    ));
    assert!(matches!(results[2], Err(FilerError::SourceNotFound { .. })));
}

#[tokio::test]
async fn filing_the_same_name_twice_produces_a_numbered_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a-scan.png");
    let b = dir.path().join("b-scan.png");
    write_png(&a, 20, 20);
    write_png(&b, 20, 20);

    let config = FilerConfig::builder()
        .base_dir(dir.path().join("out"))
        .build()
        .unwrap();
    let orchestrator = FilingOrchestrator::new(config);

    let suggestion = FilingSuggestion {
        filename: "Receipt.png".into(),
        destination: "Taxes/Receipts".into(),
        confidence: 0.8,
        reasoning: "receipt".into(),
    };

    let results = orchestrator
        .file_batch(&[
            FilingRequest {
                source: a,
                suggestion: suggestion.clone(),
                operation: FileOperation::Move,
            },
            FilingRequest {
                source: b,
                suggestion,
                operation: FileOperation::Move,
            },
        ])
        .await;

    assert!(results.iter().all(|r| r.is_success()));
    let mut names: Vec<_> = results
        .iter()
        .map(|r| r.target.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Receipt (1).png", "Receipt.png"]);
}
