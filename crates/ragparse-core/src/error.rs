//! Error types shared across the parsing pipeline.

use thiserror::Error;

/// Errors surfaced by the parsing core.
///
/// Three conditions matter to callers and each gets its own variant: the
/// registry rejecting an unknown parser id, an optional heavy capability
/// being unavailable, and a backend failing mid-extraction. Everything else
/// is plumbing (`Io`, `Json`).
#[derive(Error, Debug)]
pub enum ParseError {
    /// Registry received an identifier outside the supported set.
    ///
    /// Never silently substituted with a default parser.
    #[error("Unsupported parser type: {0}")]
    UnsupportedParser(String),

    /// An optional heavy capability (OCR engine, PDF renderer) could not be
    /// loaded. The hint tells the operator how to install it.
    #[error("Missing optional dependency '{capability}': {hint}")]
    MissingDependency {
        /// Which capability failed to load (e.g. `ocr-engine`, `pdf-renderer`).
        capability: String,
        /// Actionable install hint.
        hint: String,
    },

    /// The backend failed mid-extraction on malformed input.
    ///
    /// No partial content list is returned for a partially-failed document.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// File I/O error while reading input or writing output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Content-list serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ParseError {
    /// Build a dependency-missing error for the named capability.
    #[inline]
    #[must_use = "error value is created but not used"]
    pub fn missing_dependency(capability: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingDependency {
            capability: capability.into(),
            hint: hint.into(),
        }
    }

    /// True when the error is a missing optional dependency.
    ///
    /// `check_installation` probes use this to fold the error into `false`
    /// instead of propagating it.
    #[inline]
    #[must_use = "probe result is returned but not used"]
    pub const fn is_missing_dependency(&self) -> bool {
        matches!(self, Self::MissingDependency { .. })
    }
}

/// Type alias for [`std::result::Result<T, ParseError>`].
pub type Result<T> = std::result::Result<T, ParseError>;
