//! OCR parser behavior with substituted rendering and recognition steps.
//!
//! These tests pin the content-list contract: block shape, page stamping,
//! engine-order preservation, and the dependency-missing error paths.

use image::DynamicImage;
use ragparse_core::{BlockType, ParseError, Result};
use ragparse_parser::{
    OcrParser, PageRenderer, ParseOptions, Parser, RenderedPage, TextRecognizer,
};
use std::path::Path;

/// Renderer that yields one blank page per configured marker string.
struct StubRenderer {
    pages: Vec<String>,
}

impl PageRenderer for StubRenderer {
    fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn render_pages(&self, _path: &Path) -> Result<Vec<RenderedPage>> {
        Ok(self
            .pages
            .iter()
            .map(|_| RenderedPage::new(DynamicImage::new_rgb8(8, 8)))
            .collect())
    }
}

/// Renderer whose dependency is absent.
struct MissingRenderer;

impl PageRenderer for MissingRenderer {
    fn probe(&self) -> Result<()> {
        Err(ParseError::missing_dependency(
            "pdf-renderer",
            "install the pdfium shared library",
        ))
    }

    fn render_pages(&self, _path: &Path) -> Result<Vec<RenderedPage>> {
        self.probe().map(|()| Vec::new())
    }
}

/// Recognizer that replays canned lines, one batch per call.
struct StubRecognizer {
    batches: std::sync::Mutex<Vec<Vec<String>>>,
}

impl StubRecognizer {
    fn new(batches: Vec<Vec<&str>>) -> Self {
        Self {
            batches: std::sync::Mutex::new(
                batches
                    .into_iter()
                    .rev()
                    .map(|lines| lines.into_iter().map(String::from).collect())
                    .collect(),
            ),
        }
    }
}

impl TextRecognizer for StubRecognizer {
    fn probe(&self) -> Result<()> {
        Ok(())
    }

    fn recognize_lines(
        &self,
        _image: &DynamicImage,
        _lang: Option<&str>,
        _cls_enabled: bool,
    ) -> Result<Vec<String>> {
        Ok(self.batches.lock().unwrap().pop().unwrap_or_default())
    }
}

/// Recognizer whose engine cannot be loaded.
struct MissingRecognizer;

impl TextRecognizer for MissingRecognizer {
    fn probe(&self) -> Result<()> {
        Err(ParseError::missing_dependency(
            "ocr-engine",
            "place det_model.onnx, rec_model.onnx and charset.txt under RAGPARSE_OCR_ASSETS",
        ))
    }

    fn recognize_lines(
        &self,
        _image: &DynamicImage,
        _lang: Option<&str>,
        _cls_enabled: bool,
    ) -> Result<Vec<String>> {
        self.probe().map(|()| Vec::new())
    }
}

fn parser_with(renderer: impl PageRenderer + 'static, recognizer: impl TextRecognizer + 'static) -> OcrParser {
    OcrParser::with_components(Box::new(renderer), Box::new(recognizer))
}

fn blank_png(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("scan.png");
    DynamicImage::new_rgb8(8, 8).save(&path).unwrap();
    path
}

#[test]
fn test_parse_image_stamps_requested_page_idx_and_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = blank_png(&dir);

    let parser = parser_with(
        StubRenderer { pages: vec![] },
        StubRecognizer::new(vec![vec!["Alpha", "Beta", "Gamma"]]),
    );
    let opts = ParseOptions::default().with_page_idx(7);

    let blocks = parser.parse_image(&path, &opts).unwrap();
    assert_eq!(blocks.len(), 3);
    let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, ["Alpha", "Beta", "Gamma"]);
    assert!(blocks.iter().all(|b| b.page_idx == 7));
    assert!(blocks.iter().all(|b| b.block_type == BlockType::Text));
}

#[test]
fn test_parse_image_preserves_duplicate_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = blank_png(&dir);

    let parser = parser_with(
        StubRenderer { pages: vec![] },
        StubRecognizer::new(vec![vec!["Same", "Same"]]),
    );

    let blocks = parser.parse_image(&path, &ParseOptions::default()).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].text, "Same");
    assert_eq!(blocks[1].text, "Same");
}

#[test]
fn test_parse_pdf_stamps_each_page_with_its_index() {
    let parser = parser_with(
        StubRenderer {
            pages: vec!["page0".into(), "page1".into()],
        },
        StubRecognizer::new(vec![vec!["page0-text"], vec!["page1-text"]]),
    );

    let blocks = parser
        .parse_pdf(Path::new("doc.pdf"), &ParseOptions::default())
        .unwrap();
    let stamped: Vec<(usize, &str)> = blocks
        .iter()
        .map(|b| (b.page_idx, b.text.as_str()))
        .collect();
    assert_eq!(stamped, [(0, "page0-text"), (1, "page1-text")]);
}

#[test]
fn test_parse_pdf_without_engine_fails_before_rendering() {
    let parser = parser_with(
        StubRenderer {
            pages: vec!["page0".into()],
        },
        MissingRecognizer,
    );

    let err = parser
        .parse_pdf(Path::new("doc.pdf"), &ParseOptions::default())
        .unwrap_err();
    assert!(err.is_missing_dependency());
    assert!(err.to_string().contains("ocr-engine"));
}

#[test]
fn test_parse_image_without_engine_fails_before_reading_the_file() {
    let parser = parser_with(StubRenderer { pages: vec![] }, MissingRecognizer);

    // Path deliberately does not exist: the dependency error must win.
    let err = parser
        .parse_image(Path::new("/nonexistent/scan.png"), &ParseOptions::default())
        .unwrap_err();
    assert!(err.is_missing_dependency());
}

#[test]
fn test_parse_pdf_without_renderer_reports_missing_dependency() {
    let parser = parser_with(MissingRenderer, StubRecognizer::new(vec![]));

    let err = parser
        .parse_pdf(Path::new("doc.pdf"), &ParseOptions::default())
        .unwrap_err();
    assert!(err.is_missing_dependency());
    assert!(err.to_string().contains("pdf-renderer"));
}

#[test]
fn test_check_installation_true_when_only_renderer_is_missing() {
    let parser = parser_with(MissingRenderer, StubRecognizer::new(vec![]));
    assert!(parser.check_installation());
}

#[test]
fn test_check_installation_false_without_engine() {
    let parser = parser_with(StubRenderer { pages: vec![] }, MissingRecognizer);
    assert!(!parser.check_installation());
}

#[test]
fn test_parse_document_routes_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "plain line\n").unwrap();

    // Text files bypass OCR entirely, so a missing engine is irrelevant.
    let parser = parser_with(MissingRenderer, MissingRecognizer);
    let blocks = parser.parse_document(&path, &ParseOptions::default()).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].text, "plain line");
}

#[test]
fn test_parse_document_rejects_unknown_extensions() {
    let parser = parser_with(StubRenderer { pages: vec![] }, StubRecognizer::new(vec![]));
    let err = parser
        .parse_document(Path::new("data.xyz"), &ParseOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("unsupported file type"));
}
