//! Document-processing pipeline for ragparse.
//!
//! Two layers sit above the parser backends:
//!
//! - [`Processor`] — parses single documents through a content-addressed
//!   cache. Identical bytes parse exactly once, even under concurrent
//!   callers; subsequent requests are served from the cache.
//! - [`BatchParser`] — fans a file set out across a rayon worker pool,
//!   continuing past per-file failures and reporting a [`BatchSummary`].
//!
//! Cache storage is pluggable through the async [`CacheStore`] trait; the
//! bundled [`MemoryCacheStore`] keeps entries in process memory.

pub mod batch;
pub mod cache;
pub mod processor;

pub use batch::{BatchParser, BatchSummary};
pub use cache::{CacheStore, CachedParse, MemoryCacheStore};
pub use processor::{Processor, ProcessorConfig};
