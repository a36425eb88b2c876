//! Cached document processor.
//!
//! A [`Processor`] owns one parser backend and one cache store. Documents
//! are identified by the hash of their bytes, so the same content is parsed
//! exactly once no matter how many paths or callers refer to it.

use crate::cache::{CacheStore, CachedParse, MemoryCacheStore};
use ragparse_core::{document_id, ContentList, ParseError, Result};
use ragparse_parser::{get_parser, ParseMethod, ParseOptions, Parser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Processor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Registry id of the parser backend.
    pub parser: String,
    /// When set, each fresh parse is also written there as
    /// `<file stem>.json`.
    pub parser_output_dir: Option<PathBuf>,
    /// Extraction method passed through to the parser.
    pub parse_method: ParseMethod,
    /// Log a block-count summary after each parse.
    pub display_content_stats: bool,
    /// Report documents by full path instead of file name in logs and
    /// summaries.
    pub use_full_path: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            parser: "ocr".to_string(),
            parser_output_dir: None,
            parse_method: ParseMethod::Auto,
            display_content_stats: false,
            use_full_path: false,
        }
    }
}

impl ProcessorConfig {
    /// Display label for `path` under this configuration.
    #[must_use = "label is computed but not used"]
    pub fn document_label(&self, path: &Path) -> String {
        if self.use_full_path {
            path.display().to_string()
        } else {
            path.file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
        }
    }
}

/// Parses documents through a content-addressed cache.
pub struct Processor {
    config: ProcessorConfig,
    parser: Arc<dyn Parser>,
    cache: Arc<dyn CacheStore>,
    // Per-document-id gates: concurrent callers for the same content wait
    // here instead of parsing twice.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Processor {
    /// Processor with the configured registry parser and an in-memory cache.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnsupportedParser`] when `config.parser` is not a
    /// registry id.
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let parser: Arc<dyn Parser> = Arc::from(get_parser(&config.parser)?);
        Ok(Self::with_parts(
            config,
            parser,
            Arc::new(MemoryCacheStore::new()),
        ))
    }

    /// Processor with substituted parser and cache (test seam, and the hook
    /// for external cache stores).
    #[must_use = "processor is created but not used"]
    pub fn with_parts(
        config: ProcessorConfig,
        parser: Arc<dyn Parser>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            config,
            parser,
            cache,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Parse the document at `path`, returning its content list and
    /// content-derived id.
    ///
    /// The id is `doc-<sha256 of the bytes>`: two files with identical
    /// bytes share an id and therefore a cache entry. For a given id the
    /// parser runs at most once across all concurrent callers of this
    /// processor; everyone else gets the cached result.
    ///
    /// # Errors
    ///
    /// I/O errors reading the file, plus whatever the parser backend
    /// returns (dependency-missing, extraction failures).
    pub async fn parse_document(&self, path: &Path) -> Result<(ContentList, String)> {
        let bytes = tokio::fs::read(path).await?;
        let doc_id = document_id(&bytes);

        if let Some(hit) = self.cache.get(&doc_id).await? {
            log::debug!("cache hit for {} ({doc_id})", self.config.document_label(path));
            self.maybe_log_stats(path, &hit.content_list);
            return Ok((hit.content_list, doc_id));
        }

        // Take the per-id gate so identical content parses once. The map
        // lock is held only long enough to fetch the gate.
        let gate = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(inflight.entry(doc_id.clone()).or_default())
        };
        let _guard = gate.lock().await;

        // A concurrent caller may have finished while we waited.
        if let Some(hit) = self.cache.get(&doc_id).await? {
            log::debug!("cache hit after wait for {doc_id}");
            self.maybe_log_stats(path, &hit.content_list);
            return Ok((hit.content_list, doc_id));
        }

        let result = self.parse_uncached(path, &doc_id).await;
        self.inflight.lock().await.remove(&doc_id);
        let content_list = result?;

        self.maybe_log_stats(path, &content_list);
        Ok((content_list, doc_id))
    }

    async fn parse_uncached(&self, path: &Path, doc_id: &str) -> Result<ContentList> {
        let parser = Arc::clone(&self.parser);
        let opts = ParseOptions::default().with_method(self.config.parse_method);
        let parse_path = path.to_path_buf();

        let content_list = tokio::task::spawn_blocking(move || {
            parser.parse_document(&parse_path, &opts)
        })
        .await
        .map_err(|e| ParseError::Extraction(format!("parse task failed: {e}")))??;

        self.cache
            .put(
                doc_id,
                CachedParse {
                    content_list: content_list.clone(),
                    doc_id: doc_id.to_string(),
                },
            )
            .await?;

        if let Some(dir) = &self.config.parser_output_dir {
            self.write_output(dir, path, &content_list).await?;
        }
        Ok(content_list)
    }

    async fn write_output(
        &self,
        dir: &Path,
        source: &Path,
        content_list: &ContentList,
    ) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;
        let stem = source
            .file_stem()
            .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().into_owned());
        let out_path = dir.join(format!("{stem}.json"));
        let json = serde_json::to_string_pretty(content_list)?;
        tokio::fs::write(&out_path, json).await?;
        log::info!("wrote content list to {}", out_path.display());
        Ok(())
    }

    fn maybe_log_stats(&self, path: &Path, content_list: &ContentList) {
        if !self.config.display_content_stats {
            return;
        }
        let pages = content_list
            .iter()
            .map(|b| b.page_idx)
            .max()
            .map_or(0, |max| max + 1);
        log::info!(
            "{}: {} blocks across {pages} pages",
            self.config.document_label(path),
            content_list.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragparse_core::ContentBlock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Parser that counts invocations and yields one block per call.
    struct CountingParser {
        calls: AtomicUsize,
    }

    impl CountingParser {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Parser for CountingParser {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn check_installation(&self) -> bool {
            true
        }

        fn parse_document(&self, path: &Path, _opts: &ParseOptions) -> Result<ContentList> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ContentBlock::text(
                format!("parsed {}", path.display()),
                0,
            )])
        }

        fn parse_pdf(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
            self.parse_document(path, opts)
        }

        fn parse_image(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
            self.parse_document(path, opts)
        }

        fn parse_office_doc(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
            self.parse_document(path, opts)
        }
    }

    fn processor_with(parser: Arc<CountingParser>) -> Processor {
        Processor::with_parts(
            ProcessorConfig::default(),
            parser,
            Arc::new(MemoryCacheStore::new()),
        )
    }

    #[tokio::test]
    async fn test_repeat_parse_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        let parser = CountingParser::new();
        let processor = processor_with(Arc::clone(&parser));

        let (first, id1) = processor.parse_document(&path).await.unwrap();
        let (second, id2) = processor.parse_document(&path).await.unwrap();

        assert_eq!(parser.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(id1, id2);
        assert!(id1.starts_with("doc-"));
    }

    #[tokio::test]
    async fn test_identical_bytes_share_one_parse_across_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("copy-of-a.txt");
        std::fs::write(&a, "same bytes").unwrap();
        std::fs::write(&b, "same bytes").unwrap();

        let parser = CountingParser::new();
        let processor = processor_with(Arc::clone(&parser));

        let (_, id_a) = processor.parse_document(&a).await.unwrap();
        let (_, id_b) = processor.parse_document(&b).await.unwrap();

        assert_eq!(id_a, id_b);
        assert_eq!(parser.calls(), 1);
    }

    #[tokio::test]
    async fn test_different_bytes_parse_separately() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "beta").unwrap();

        let parser = CountingParser::new();
        let processor = processor_with(Arc::clone(&parser));

        let (_, id_a) = processor.parse_document(&a).await.unwrap();
        let (_, id_b) = processor.parse_document(&b).await.unwrap();

        assert_ne!(id_a, id_b);
        assert_eq!(parser.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_parse_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.txt");
        std::fs::write(&path, "contended content").unwrap();

        let parser = CountingParser::new();
        let processor = Arc::new(processor_with(Arc::clone(&parser)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let processor = Arc::clone(&processor);
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                processor.parse_document(&path).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let (_, id) = handle.await.unwrap().unwrap();
            ids.push(id);
        }

        assert_eq!(parser.calls(), 1);
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_output_dir_receives_content_list_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "text").unwrap();

        let processor = Processor::with_parts(
            ProcessorConfig {
                parser_output_dir: Some(out.clone()),
                ..ProcessorConfig::default()
            },
            CountingParser::new(),
            Arc::new(MemoryCacheStore::new()),
        );
        processor.parse_document(&path).await.unwrap();

        let written = std::fs::read_to_string(out.join("report.json")).unwrap();
        let blocks: ContentList = serde_json::from_str(&written).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_io_error() {
        let processor = processor_with(CountingParser::new());
        let err = processor
            .parse_document(Path::new("/nonexistent/file.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }

    #[test]
    fn test_document_label_respects_use_full_path() {
        let mut config = ProcessorConfig::default();
        let path = Path::new("/data/docs/report.pdf");

        assert_eq!(config.document_label(path), "report.pdf");
        config.use_full_path = true;
        assert_eq!(config.document_label(path), "/data/docs/report.pdf");
    }

    #[test]
    fn test_unknown_parser_id_is_rejected_at_construction() {
        let config = ProcessorConfig {
            parser: "mineru".to_string(),
            ..ProcessorConfig::default()
        };
        assert!(matches!(
            Processor::new(config),
            Err(ParseError::UnsupportedParser(_))
        ));
    }
}
