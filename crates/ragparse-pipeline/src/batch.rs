//! Batch parsing across a worker pool.
//!
//! Files are distributed over rayon workers; a failure in one file never
//! aborts the batch. The summary keeps every outcome so callers can report
//! or retry.

use indicatif::{ProgressBar, ProgressStyle};
use ragparse_core::{ParseError, Result};
use ragparse_parser::{get_parser, ParseOptions};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File extensions the batch directory scan picks up.
const BATCH_EXTENSIONS: [&str; 12] = [
    "pdf", "docx", "txt", "md", "png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp", "gif",
];

/// Outcome of one batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchSummary {
    /// Successfully parsed files with their block counts.
    pub succeeded: Vec<(PathBuf, usize)>,
    /// Failed files with the error message.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    /// Total number of files processed.
    #[inline]
    #[must_use = "count is computed but not used"]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when every file parsed.
    #[inline]
    #[must_use = "result is computed but not used"]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Parses many files with one parser backend, in parallel.
pub struct BatchParser {
    parser_type: String,
    show_progress: bool,
    skip_installation_check: bool,
}

impl BatchParser {
    /// Batch parser for the given registry id.
    ///
    /// `show_progress` draws a terminal progress bar.
    /// `skip_installation_check` bypasses the up-front capability probe,
    /// letting individual files fail instead.
    #[must_use = "batch parser is created but not used"]
    pub fn new(parser_type: impl Into<String>, show_progress: bool, skip_installation_check: bool) -> Self {
        Self {
            parser_type: parser_type.into(),
            show_progress,
            skip_installation_check,
        }
    }

    /// Parse every file in `files`, continuing past failures.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnsupportedParser`] for an unknown parser id, and a
    /// dependency-missing error when the up-front installation check fails
    /// (unless skipped). Per-file errors land in the summary, not here.
    pub fn process_files(&self, files: &[PathBuf], opts: &ParseOptions) -> Result<BatchSummary> {
        let parser = get_parser(&self.parser_type)?;

        if !self.skip_installation_check && !parser.check_installation() {
            return Err(ParseError::missing_dependency(
                &self.parser_type,
                "parser dependencies are not installed; \
                 enable skip_installation_check to attempt parsing anyway",
            ));
        }

        let bar = if self.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Vec<(PathBuf, std::result::Result<usize, String>)> = files
            .par_iter()
            .map(|path| {
                let outcome = parser
                    .parse_document(path, opts)
                    .map(|blocks| blocks.len())
                    .map_err(|e| e.to_string());
                bar.inc(1);
                (path.clone(), outcome)
            })
            .collect();
        bar.finish_and_clear();

        let mut summary = BatchSummary::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(blocks) => summary.succeeded.push((path, blocks)),
                Err(message) => {
                    log::warn!("{}: {message}", path.display());
                    summary.failed.push((path, message));
                }
            }
        }

        log::info!(
            "batch finished: {} ok, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Parse every supported file directly under `dir` (non-recursive),
    /// in name order.
    ///
    /// # Errors
    ///
    /// I/O errors reading the directory, plus everything
    /// [`Self::process_files`] returns.
    pub fn process_directory(&self, dir: &Path, opts: &ParseOptions) -> Result<BatchSummary> {
        let files = collect_documents(dir)?;
        log::info!("batch parsing {} files from {}", files.len(), dir.display());
        self.process_files(&files, opts)
    }
}

/// Supported document files directly under `dir`, sorted by path.
pub fn collect_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| BATCH_EXTENSIONS.contains(&ext.as_str()));
        if supported {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_texts(dir: &Path, names: &[(&str, &str)]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|(name, content)| {
                let path = dir.join(name);
                fs::write(&path, content).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_batch_parses_all_files_with_native_parser() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_texts(dir.path(), &[("a.txt", "one\ntwo"), ("b.txt", "three")]);

        let batch = BatchParser::new("native", false, false);
        let summary = batch.process_files(&files, &ParseOptions::default()).unwrap();

        assert!(summary.all_succeeded());
        assert_eq!(summary.total(), 2);
        let counts: Vec<usize> = summary.succeeded.iter().map(|(_, n)| *n).collect();
        assert!(counts.contains(&2));
        assert!(counts.contains(&1));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_texts(dir.path(), &[("good.txt", "fine")]);
        files.push(dir.path().join("missing.txt"));

        let batch = BatchParser::new("native", false, false);
        let summary = batch.process_files(&files, &ParseOptions::default()).unwrap();

        assert_eq!(summary.succeeded.len(), 1);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].0.ends_with("missing.txt"));
    }

    #[test]
    fn test_unknown_parser_type_fails_up_front() {
        let batch = BatchParser::new("mineru", false, false);
        let err = batch.process_files(&[], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedParser(_)));
    }

    #[test]
    fn test_directory_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write_texts(dir.path(), &[("b.txt", "x"), ("a.md", "y"), ("skip.dat", "z")]);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let files = collect_documents(dir.path()).unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.md", "b.txt"]);
    }

    #[test]
    fn test_empty_batch_is_a_successful_noop() {
        let batch = BatchParser::new("native", false, false);
        let summary = batch.process_files(&[], &ParseOptions::default()).unwrap();
        assert_eq!(summary.total(), 0);
        assert!(summary.all_succeeded());
    }
}
