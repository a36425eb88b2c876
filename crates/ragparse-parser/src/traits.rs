//! The parser capability set and per-call options.

use ragparse_core::{ContentList, Result};
use std::path::Path;

/// Extraction strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ParseMethod {
    /// Pick per file type (the default).
    #[default]
    Auto,
    /// Force OCR even where a text layer exists.
    Ocr,
    /// Force direct text extraction.
    Text,
}

impl std::fmt::Display for ParseMethod {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Ocr => write!(f, "ocr"),
            Self::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for ParseMethod {
    type Err = String;

    /// Parse a method from string (case-insensitive).
    ///
    /// Accepts: "auto" | "ocr" | "text", "txt"
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "ocr" => Ok(Self::Ocr),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!(
                "Unknown parse method '{s}'. Valid options: auto, ocr, text"
            )),
        }
    }
}

/// Per-call parsing options.
///
/// Builder-style; every field has a sensible default so callers only touch
/// what they need:
///
/// ```
/// use ragparse_parser::ParseOptions;
///
/// let opts = ParseOptions::default().with_page_idx(7).with_lang("en");
/// assert_eq!(opts.page_idx, 7);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOptions {
    /// Page index to stamp on blocks extracted from a standalone image.
    pub page_idx: usize,

    /// OCR language hint (engine-dependent; `None` means the engine default).
    pub lang: Option<String>,

    /// Inverted flag for the OCR orientation classifier, so that the
    /// derived `Default` leaves the classifier enabled. Read through
    /// [`ParseOptions::cls_enabled`].
    pub cls_disabled: bool,

    /// Requested extraction strategy.
    pub method: ParseMethod,
}

impl ParseOptions {
    /// Set the page index used for standalone images.
    #[inline]
    #[must_use = "returns options with the page index configured"]
    pub const fn with_page_idx(mut self, page_idx: usize) -> Self {
        self.page_idx = page_idx;
        self
    }

    /// Set the OCR language hint.
    #[inline]
    #[must_use = "returns options with the language configured"]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Toggle the OCR orientation classifier.
    #[inline]
    #[must_use = "returns options with the classifier setting configured"]
    pub const fn with_cls(mut self, enabled: bool) -> Self {
        self.cls_disabled = !enabled;
        self
    }

    /// Set the extraction strategy.
    #[inline]
    #[must_use = "returns options with the method configured"]
    pub const fn with_method(mut self, method: ParseMethod) -> Self {
        self.method = method;
        self
    }

    /// Whether the orientation classifier is enabled (default: true).
    #[inline]
    #[must_use = "classifier setting is read but not used"]
    pub const fn cls_enabled(&self) -> bool {
        !self.cls_disabled
    }
}

/// The shared parsing capability set.
///
/// Every variant produces the same content-list schema regardless of how it
/// extracts text, which keeps the rest of the pipeline backend-agnostic.
pub trait Parser: Send + Sync {
    /// Registry identifier of this parser.
    fn name(&self) -> &'static str;

    /// Probe whether this parser's dependencies are usable.
    ///
    /// A probe, not an operation: converts dependency failures into
    /// `false` instead of propagating them, and never panics.
    fn check_installation(&self) -> bool;

    /// Parse any supported document, dispatching by file type.
    ///
    /// # Errors
    ///
    /// Dependency-missing or extraction errors from the selected path.
    fn parse_document(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList>;

    /// Parse a PDF file.
    ///
    /// # Errors
    ///
    /// Dependency-missing when a required optional capability is absent;
    /// extraction errors on malformed input.
    fn parse_pdf(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList>;

    /// Parse a single image.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Parser::parse_pdf`].
    fn parse_image(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList>;

    /// Parse an office document (DOCX).
    ///
    /// # Errors
    ///
    /// Extraction errors on malformed or unsupported office input.
    fn parse_office_doc(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList>;
}

impl std::fmt::Debug for dyn Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_options_defaults() {
        let opts = ParseOptions::default();
        assert_eq!(opts.page_idx, 0);
        assert!(opts.lang.is_none());
        assert!(opts.cls_enabled());
        assert_eq!(opts.method, ParseMethod::Auto);
    }

    #[test]
    fn test_options_chaining() {
        let opts = ParseOptions::default()
            .with_page_idx(4)
            .with_lang("de")
            .with_cls(false)
            .with_method(ParseMethod::Ocr);
        assert_eq!(opts.page_idx, 4);
        assert_eq!(opts.lang.as_deref(), Some("de"));
        assert!(!opts.cls_enabled());
        assert_eq!(opts.method, ParseMethod::Ocr);
    }

    #[test]
    fn test_parse_method_from_str() {
        assert_eq!(ParseMethod::from_str("auto").unwrap(), ParseMethod::Auto);
        assert_eq!(ParseMethod::from_str("OCR").unwrap(), ParseMethod::Ocr);
        assert_eq!(ParseMethod::from_str("txt").unwrap(), ParseMethod::Text);
        assert!(ParseMethod::from_str("fancy").is_err());
    }

    #[test]
    fn test_parse_method_display_roundtrip() {
        for method in [ParseMethod::Auto, ParseMethod::Ocr, ParseMethod::Text] {
            assert_eq!(
                ParseMethod::from_str(&method.to_string()).unwrap(),
                method
            );
        }
    }
}
