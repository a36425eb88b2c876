//! Core types for the ragparse document-parsing pipeline.
//!
//! This crate defines the three contracts every other ragparse crate builds
//! on:
//!
//! - the **content list schema** ([`ContentBlock`] / [`ContentList`]) — the
//!   wire format between parser backends and downstream indexing/embedding
//!   stages;
//! - the **error taxonomy** ([`ParseError`]) shared by all parser variants
//!   and the processing driver;
//! - **document identity** ([`document_id`]) — the content-derived key used
//!   to memoize parse results.

pub mod content;
pub mod error;
pub mod identity;

pub use content::{BlockType, ContentBlock, ContentList};
pub use error::{ParseError, Result};
pub use identity::document_id;
