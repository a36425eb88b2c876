//! OCR-based parser: rasterize pages with pdfium, recognize text with the
//! `ragparse-ocr` engine.
//!
//! The two extraction steps — page rendering and per-page recognition — are
//! separate collaborators ([`PageRenderer`], [`TextRecognizer`]) so they can
//! be substituted in tests without the real pdfium/OCR installations.

use crate::guard::{self, OcrHandle};
use crate::native_parser;
use crate::traits::{ParseMethod, ParseOptions, Parser};
use image::DynamicImage;
use pdfium_render::prelude::*;
use ragparse_core::{ContentBlock, ContentList, ParseError, Result};
use std::path::Path;

/// Default DPI for rasterizing PDF pages before OCR. Higher improves
/// recognition quality at the cost of memory and time.
pub const DEFAULT_OCR_DPI: f32 = 300.0;

/// Image extensions routed to [`Parser::parse_image`].
const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp", "gif"];

/// One PDF page rasterized for OCR.
///
/// Parser-internal: produced by the renderer, consumed by the recognizer,
/// dropped once its content blocks exist.
pub struct RenderedPage {
    /// The rasterized page.
    pub image: DynamicImage,
}

impl RenderedPage {
    /// Wrap a rasterized page image.
    #[inline]
    #[must_use = "rendered page is created but not used"]
    pub const fn new(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// Enumerates a PDF's pages as rasterized images.
pub trait PageRenderer: Send + Sync {
    /// Probe whether the rendering capability is available.
    ///
    /// # Errors
    ///
    /// A dependency-missing error when it is not.
    fn probe(&self) -> Result<()>;

    /// Rasterize every page of the PDF at `path`, in page order.
    ///
    /// # Errors
    ///
    /// Dependency-missing when the renderer is unavailable; extraction
    /// errors on malformed PDFs.
    fn render_pages(&self, path: &Path) -> Result<Vec<RenderedPage>>;
}

/// Recognizes text lines in one rasterized page or image.
pub trait TextRecognizer: Send + Sync {
    /// Probe whether the recognition capability is available.
    ///
    /// # Errors
    ///
    /// A dependency-missing error when it is not.
    fn probe(&self) -> Result<()>;

    /// Return the recognized text lines in engine order, verbatim.
    ///
    /// # Errors
    ///
    /// Dependency-missing when the engine is unavailable; extraction
    /// errors when recognition fails.
    fn recognize_lines(
        &self,
        image: &DynamicImage,
        lang: Option<&str>,
        cls_enabled: bool,
    ) -> Result<Vec<String>>;
}

/// Production renderer backed by the pdfium shared library.
///
/// Binding happens per operation (a fast dlopen); nothing is held between
/// calls, so the renderer stays `Sync` despite pdfium itself not being so.
pub struct PdfiumRenderer {
    dpi: f32,
}

impl PdfiumRenderer {
    /// Renderer at the default OCR DPI.
    #[inline]
    #[must_use = "renderer is created but not used"]
    pub const fn new() -> Self {
        Self {
            dpi: DEFAULT_OCR_DPI,
        }
    }

    /// Renderer at a custom DPI.
    #[inline]
    #[must_use = "renderer is created but not used"]
    pub const fn with_dpi(dpi: f32) -> Self {
        Self { dpi }
    }

    #[allow(clippy::cast_possible_truncation)] // page sizes in points fit i32
    fn render_page(&self, page: &PdfPage<'_>) -> Result<RenderedPage> {
        // PDF user space is 72 points per inch.
        let scale = self.dpi / 72.0;
        let pixel_width = (page.width().value * scale) as i32;
        let pixel_height = (page.height().value * scale) as i32;

        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(pixel_width)
                    .set_target_height(pixel_height)
                    .render_form_data(true),
            )
            .map_err(|e| ParseError::Extraction(format!("PDF page render failed: {e}")))?;

        Ok(RenderedPage::new(bitmap.as_image()))
    }
}

impl Default for PdfiumRenderer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdfiumRenderer {
    fn probe(&self) -> Result<()> {
        guard::bind_pdfium().map(|_| ())
    }

    fn render_pages(&self, path: &Path) -> Result<Vec<RenderedPage>> {
        let pdfium = guard::bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ParseError::Extraction(format!("{}: {e}", path.display())))?;

        let page_count = document.pages().len();
        log::debug!("rendering {page_count} pages from {}", path.display());

        let mut rendered = Vec::with_capacity(usize::from(page_count));
        for page in document.pages().iter() {
            rendered.push(self.render_page(&page)?);
        }
        Ok(rendered)
    }
}

/// Production recognizer backed by the guarded OCR engine.
///
/// The engine handle is loaded on first use and reused across calls.
#[derive(Debug, Default)]
pub struct EngineRecognizer {
    engine: OcrHandle,
}

impl EngineRecognizer {
    /// Create a recognizer with an unloaded engine handle.
    #[inline]
    #[must_use = "recognizer is created but not used"]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextRecognizer for EngineRecognizer {
    fn probe(&self) -> Result<()> {
        self.engine.acquire().map(|_| ())
    }

    fn recognize_lines(
        &self,
        image: &DynamicImage,
        lang: Option<&str>,
        _cls_enabled: bool,
    ) -> Result<Vec<String>> {
        if let Some(lang) = lang {
            // Single-model engine; the hint selects nothing today.
            log::debug!("OCR language hint '{lang}' ignored by the bundled engine");
        }

        let engine = self.engine.acquire()?;
        let mut engine = engine
            .lock()
            .map_err(|_| ParseError::Extraction("OCR engine mutex poisoned".to_string()))?;
        let output = engine
            .recognize(image)
            .map_err(|e| ParseError::Extraction(e.to_string()))?;

        Ok(output.lines.into_iter().map(|line| line.text).collect())
    }
}

/// OCR-based parser (registry id `"ocr"`).
pub struct OcrParser {
    renderer: Box<dyn PageRenderer>,
    recognizer: Box<dyn TextRecognizer>,
}

impl OcrParser {
    /// Parser with the production pdfium renderer and OCR engine.
    ///
    /// Construction is side-effect free: no model load, no library bind.
    #[must_use = "parser is created but not used"]
    pub fn new() -> Self {
        Self::with_components(
            Box::new(PdfiumRenderer::new()),
            Box::new(EngineRecognizer::new()),
        )
    }

    /// Parser with substituted collaborators (test seam).
    #[must_use = "parser is created but not used"]
    pub fn with_components(
        renderer: Box<dyn PageRenderer>,
        recognizer: Box<dyn TextRecognizer>,
    ) -> Self {
        Self {
            renderer,
            recognizer,
        }
    }
}

impl Default for OcrParser {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for OcrParser {
    fn name(&self) -> &'static str {
        "ocr"
    }

    /// True when the OCR engine is usable. A missing PDF renderer alone
    /// still counts as installed: image-only OCR remains available.
    fn check_installation(&self) -> bool {
        if let Err(err) = self.recognizer.probe() {
            log::warn!("OCR engine unavailable: {err}");
            return false;
        }
        if let Err(err) = self.renderer.probe() {
            log::warn!("PDF renderer unavailable, image-only OCR: {err}");
        }
        true
    }

    fn parse_document(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
        match extension_of(path).as_deref() {
            // A forced text method reads the embedded text layer instead of
            // rasterizing.
            Some("pdf") if opts.method == ParseMethod::Text => {
                native_parser::extract_pdf_text(path)
            }
            Some("pdf") => self.parse_pdf(path, opts),
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => self.parse_image(path, opts),
            Some("docx") => self.parse_office_doc(path, opts),
            Some("txt" | "md" | "markdown") => native_parser::extract_text_file(path),
            _ => Err(ParseError::Extraction(format!(
                "unsupported file type: {}",
                path.display()
            ))),
        }
    }

    fn parse_pdf(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
        // Engine first: rendering a whole PDF is pointless without OCR.
        self.recognizer.probe()?;

        let pages = self.renderer.render_pages(path)?;
        let mut content_list = ContentList::new();
        for (page_idx, page) in pages.iter().enumerate() {
            let lines =
                self.recognizer
                    .recognize_lines(&page.image, opts.lang.as_deref(), opts.cls_enabled())?;
            content_list.extend(
                lines
                    .into_iter()
                    .map(|line| ContentBlock::text(line, page_idx)),
            );
        }

        log::info!(
            "OCR parsed {} pages into {} blocks from {}",
            pages.len(),
            content_list.len(),
            path.display()
        );
        Ok(content_list)
    }

    fn parse_image(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
        // Surface a missing engine before touching the file.
        self.recognizer.probe()?;

        let image = image::open(path)
            .map_err(|e| ParseError::Extraction(format!("{}: {e}", path.display())))?;
        let lines =
            self.recognizer
                .recognize_lines(&image, opts.lang.as_deref(), opts.cls_enabled())?;

        Ok(lines
            .into_iter()
            .map(|line| ContentBlock::text(line, opts.page_idx))
            .collect())
    }

    fn parse_office_doc(&self, path: &Path, _opts: &ParseOptions) -> Result<ContentList> {
        // Office files carry their text natively; OCR adds nothing here.
        native_parser::extract_office(path)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
