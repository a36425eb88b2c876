//! Lazy acquisition of the optional heavy dependencies.
//!
//! Neither the OCR engine (ONNX models) nor the PDF renderer (the pdfium
//! shared library) is touched when this crate is linked or when a parser is
//! constructed. Each operation that needs a capability acquires it here, on
//! first use, and absence surfaces as a typed
//! [`ParseError::MissingDependency`] carrying an install hint.
//!
//! The OCR engine handle is memoized per parser instance (model loading is
//! expensive); the pdfium binding is a cheap dlopen performed per operation
//! because the `Pdfium` handle is not `Sync` and safe to re-create.

use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use ragparse_core::{ParseError, Result};
use ragparse_ocr::OcrEngine;
use std::sync::{Arc, Mutex};

/// Capability name used in OCR dependency errors.
pub const OCR_CAPABILITY: &str = "ocr-engine";

/// Capability name used in PDF-renderer dependency errors.
pub const PDF_CAPABILITY: &str = "pdf-renderer";

/// Install hint attached to PDF-renderer dependency errors.
pub const PDFIUM_INSTALL_HINT: &str =
    "install the pdfium shared library (https://github.com/bblanchon/pdfium-binaries) \
     next to the binary or on the system library path";

/// Memoized handle to the OCR engine.
///
/// The first [`OcrHandle::acquire`] loads the models; later calls reuse the
/// same engine behind a mutex (ONNX sessions need `&mut` to run).
#[derive(Default)]
pub struct OcrHandle {
    cell: OnceCell<Arc<Mutex<OcrEngine>>>,
}

impl OcrHandle {
    /// Create an empty handle. Does not touch the filesystem.
    #[inline]
    #[must_use = "handle is created but not used"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or reuse) the OCR engine.
    ///
    /// # Errors
    ///
    /// [`ParseError::MissingDependency`] naming the `ocr-engine` capability
    /// when the models cannot be loaded. The engine's own error message is
    /// the install hint.
    pub fn acquire(&self) -> Result<Arc<Mutex<OcrEngine>>> {
        self.cell
            .get_or_try_init(|| {
                log::debug!("loading OCR engine (first use)");
                OcrEngine::new()
                    .map(|engine| Arc::new(Mutex::new(engine)))
                    .map_err(|e| ParseError::missing_dependency(OCR_CAPABILITY, e.to_string()))
            })
            .cloned()
    }
}

impl std::fmt::Debug for OcrHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrHandle")
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}

/// Bind the pdfium shared library.
///
/// Tries a library next to the executable first, then the system library
/// path. A fast fail/succeed check, not a network call.
///
/// # Errors
///
/// [`ParseError::MissingDependency`] naming the `pdf-renderer` capability
/// and pdfium when no library can be bound.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| {
            ParseError::missing_dependency(
                PDF_CAPABILITY,
                format!("pdfium could not be bound ({e}); {PDFIUM_INSTALL_HINT}"),
            )
        })?;
    Ok(Pdfium::new(bindings))
}
