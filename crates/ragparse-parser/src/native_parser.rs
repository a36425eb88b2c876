//! Native parser: extracts embedded text directly, no rasterization.
//!
//! PDF text comes from the content streams via `lopdf`; DOCX text from the
//! document XML inside the OOXML zip container. Scanned documents have no
//! embedded text and belong to the OCR parser instead.

use crate::traits::{ParseOptions, Parser};
use quick_xml::events::Event;
use quick_xml::Reader;
use ragparse_core::{ContentBlock, ContentList, ParseError, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Native text-extraction parser (registry id `"native"`).
///
/// Stateless and always installed: every capability it needs is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeParser;

impl NativeParser {
    /// Create the parser. Free of side effects.
    #[inline]
    #[must_use = "parser is created but not used"]
    pub const fn new() -> Self {
        Self
    }
}

impl Parser for NativeParser {
    fn name(&self) -> &'static str {
        "native"
    }

    fn check_installation(&self) -> bool {
        true
    }

    fn parse_document(&self, path: &Path, opts: &ParseOptions) -> Result<ContentList> {
        match path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("pdf") => self.parse_pdf(path, opts),
            Some("docx") => self.parse_office_doc(path, opts),
            Some("txt" | "md" | "markdown") => extract_text_file(path),
            Some(ext) if is_image_extension(ext) => self.parse_image(path, opts),
            _ => Err(ParseError::Extraction(format!(
                "unsupported file type: {}",
                path.display()
            ))),
        }
    }

    fn parse_pdf(&self, path: &Path, _opts: &ParseOptions) -> Result<ContentList> {
        extract_pdf_text(path)
    }

    fn parse_image(&self, _path: &Path, _opts: &ParseOptions) -> Result<ContentList> {
        Err(ParseError::Extraction(
            "native parser cannot extract text from images; use the ocr parser".to_string(),
        ))
    }

    fn parse_office_doc(&self, path: &Path, _opts: &ParseOptions) -> Result<ContentList> {
        extract_office(path)
    }
}

fn is_image_extension(ext: &str) -> bool {
    matches!(
        ext,
        "png" | "jpg" | "jpeg" | "bmp" | "tif" | "tiff" | "webp" | "gif"
    )
}

/// Extract embedded text from a PDF, one block per non-empty line, stamped
/// with its zero-based page index.
pub(crate) fn extract_pdf_text(path: &Path) -> Result<ContentList> {
    let document = lopdf::Document::load(path)
        .map_err(|e| ParseError::Extraction(format!("{}: {e}", path.display())))?;

    let mut content_list = ContentList::new();
    for (page_num, _) in document.get_pages() {
        let text = document
            .extract_text(&[page_num])
            .map_err(|e| ParseError::Extraction(format!("page {page_num}: {e}")))?;
        // lopdf page numbers are one-based; content blocks are zero-based.
        let page_idx = (page_num as usize).saturating_sub(1);
        content_list.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| ContentBlock::text(line, page_idx)),
        );
    }

    log::debug!(
        "native extracted {} blocks from {}",
        content_list.len(),
        path.display()
    );
    Ok(content_list)
}

/// Extract text from an office document. Only DOCX is handled; legacy
/// binary formats have no zip container to open.
pub(crate) fn extract_office(path: &Path) -> Result<ContentList> {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("docx") => extract_docx(path),
        _ => Err(ParseError::Extraction(format!(
            "unsupported office format: {}",
            path.display()
        ))),
    }
}

/// Extract paragraph text from a DOCX file.
///
/// DOCX has no page geometry before layout, so every block carries
/// `page_idx` 0.
pub(crate) fn extract_docx(path: &Path) -> Result<ContentList> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ParseError::Extraction(format!("{}: {e}", path.display())))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ParseError::Extraction(format!("not a DOCX file: {e}")))?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    reader.trim_text(false);

    let mut content_list = ContentList::new();
    let mut paragraph = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Extraction(format!("document.xml: {e}")))?
        {
            Event::Start(ref e) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        content_list.push(ContentBlock::text(text, 0));
                    }
                    paragraph.clear();
                }
                _ => {}
            },
            Event::Text(e) if in_text_run => {
                paragraph.push_str(
                    &e.unescape()
                        .map_err(|err| ParseError::Extraction(format!("document.xml: {err}")))?,
                );
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(content_list)
}

/// Extract a plain-text or Markdown file, one block per non-empty line.
pub(crate) fn extract_text_file(path: &Path) -> Result<ContentList> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ContentBlock::text(line, 0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_docx(path: &Path, document_xml: &str) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_native_is_always_installed() {
        assert!(NativeParser::new().check_installation());
    }

    #[test]
    fn test_parse_image_is_rejected() {
        let err = NativeParser::new()
            .parse_image(Path::new("scan.png"), &ParseOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("ocr parser"));
    }

    #[test]
    fn test_text_file_blocks_keep_order_and_skip_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "first\n\n  second  \nthird\n").unwrap();

        let blocks = extract_text_file(&path).unwrap();
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert!(blocks.iter().all(|b| b.page_idx == 0));
    }

    #[test]
    fn test_docx_paragraphs_become_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        write_docx(
            &path,
            r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
    <w:p></w:p>
    <w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
        );

        let blocks = extract_docx(&path).unwrap();
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, ["Hello world", "Second paragraph"]);
    }

    #[test]
    fn test_non_docx_office_is_rejected() {
        let err = extract_office(Path::new("old.doc")).unwrap_err();
        assert!(err.to_string().contains("unsupported office format"));
    }

    #[test]
    fn test_missing_document_xml_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        let file = fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
        zip.start_file("mimetype", options).unwrap();
        zip.finish().unwrap();

        let err = extract_docx(&path).unwrap_err();
        assert!(err.to_string().contains("not a DOCX"));
    }
}
