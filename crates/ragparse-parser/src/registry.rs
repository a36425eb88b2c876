//! Parser registry: string ids to parser instances.

use crate::native_parser::NativeParser;
use crate::ocr_parser::OcrParser;
use crate::traits::Parser;
use ragparse_core::{ParseError, Result};

/// Registry ids accepted by [`get_parser`], in preference order.
pub const SUPPORTED_PARSERS: [&str; 2] = ["ocr", "native"];

/// Look up a parser by its registry id.
///
/// Construction is side-effect free for every parser; heavy dependencies
/// load on first parse, not here.
///
/// # Errors
///
/// [`ParseError::UnsupportedParser`] for unknown ids. Matching is exact:
/// no case folding, no trimming.
pub fn get_parser(type_id: &str) -> Result<Box<dyn Parser>> {
    match type_id {
        "ocr" => Ok(Box::new(OcrParser::new())),
        "native" => Ok(Box::new(NativeParser::new())),
        other => Err(ParseError::UnsupportedParser(other.to_string())),
    }
}
