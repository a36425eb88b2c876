//! Content-derived document identity.
//!
//! The parse cache is keyed by what a document *is*, not where it lives:
//! two byte-identical files produce the same id regardless of filename,
//! path or mtime. Ids are a sha256 digest of the raw bytes with a `doc-`
//! prefix.

use sha2::{Digest, Sha256};

/// Derive the cache identity for a document from its raw bytes.
///
/// # Examples
///
/// ```
/// use ragparse_core::document_id;
///
/// let id = document_id(b"%PDF-1.4\n");
/// assert!(id.starts_with("doc-"));
/// assert_eq!(id, document_id(b"%PDF-1.4\n"));
/// ```
#[must_use = "document id is computed but not used"]
pub fn document_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("doc-{:x}", hasher.finalize())
}
