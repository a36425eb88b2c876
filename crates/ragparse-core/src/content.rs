//! The shared content-list schema produced by every parser variant.
//!
//! A parse result is an ordered sequence of typed blocks, each tagged with
//! the zero-based physical page (or image) it was extracted from. Ordering
//! carries reading order and is significant; identical text appearing twice
//! stays as two distinct blocks (repeated OCR lines are legitimate content,
//! not duplicates to fold).

use serde::{Deserialize, Serialize};

/// Kind tag of a content block.
///
/// Serialized as the `"type"` key of each block. Text is the only kind the
/// parsing core emits today; the tag exists so downstream consumers can
/// dispatch without sniffing field sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Extracted text content.
    Text,
}

/// One unit of extracted content.
///
/// # Examples
///
/// ```
/// use ragparse_core::ContentBlock;
///
/// let block = ContentBlock::text("First line", 7);
/// assert_eq!(block.page_idx, 7);
/// let json = serde_json::to_value(&block).unwrap();
/// assert_eq!(json["type"], "text");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Block kind tag (wire key: `type`).
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Extracted text, verbatim as returned by the backend.
    pub text: String,
    /// Zero-based index of the physical page/image this block came from.
    pub page_idx: usize,
}

impl ContentBlock {
    /// Create a text block for the given page.
    #[inline]
    #[must_use = "content block is created but not used"]
    pub fn text(text: impl Into<String>, page_idx: usize) -> Self {
        Self {
            block_type: BlockType::Text,
            text: text.into(),
            page_idx,
        }
    }
}

/// Ordered sequence of content blocks — the canonical output of every
/// parser variant for one document.
pub type ContentList = Vec<ContentBlock>;
