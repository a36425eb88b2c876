//! Parser backends for ragparse.
//!
//! A *parser* turns one document (PDF, image, office file, plain text) into
//! the shared content-list schema of `ragparse-core`. Two interchangeable
//! variants exist:
//!
//! - [`OcrParser`] — rasterizes PDF pages with pdfium and runs the
//!   `ragparse-ocr` engine over pages and images;
//! - [`NativeParser`] — extracts embedded text directly (PDF text layer,
//!   DOCX XML, plain text) without any optional dependency.
//!
//! Instances come from the registry: [`get_parser`] maps a string id from
//! [`SUPPORTED_PARSERS`] to a boxed [`Parser`]. Construction never loads
//! the heavy optional dependencies (OCR models, pdfium); those are acquired
//! lazily by the operations that need them, via [`guard`].

pub mod guard;
mod native_parser;
mod ocr_parser;
mod registry;
mod traits;

pub use native_parser::NativeParser;
pub use ocr_parser::{
    EngineRecognizer, OcrParser, PageRenderer, PdfiumRenderer, RenderedPage, TextRecognizer,
};
pub use registry::{get_parser, SUPPORTED_PARSERS};
pub use traits::{ParseMethod, ParseOptions, Parser};
