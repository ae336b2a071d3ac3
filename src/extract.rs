//! Text extraction for uploaded documents (PDF, DOCX, plain text).
//!
//! [`DocumentExtractor`] is the production [`TextExtractor`]. It is pure
//! CPU work over an in-memory buffer; the ingestion pipeline runs it on a
//! blocking thread.

use std::io::Read;

use docchat_core::error::{Error, Result};
use docchat_core::extract::{FileKind, TextExtractor};
use quick_xml::events::Event;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], kind: FileKind) -> Result<String> {
        match kind {
            FileKind::Pdf => extract_pdf(bytes),
            FileKind::Docx => extract_docx(bytes),
            FileKind::Text => extract_plain(bytes),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| Error::Extraction(format!("PDF: {}", e)))
}

fn extract_plain(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Extraction(format!("text file is not valid UTF-8: {}", e)))
}

fn ooxml_err(e: impl std::fmt::Display) -> Error {
    Error::Extraction(format!("DOCX: {}", e))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    let entry = archive.by_name(DOCX_BODY).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ooxml_err(format!("{} not found", DOCX_BODY)),
        other => ooxml_err(other),
    })?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(ooxml_err)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ooxml_err(format!("{} exceeds size limit", DOCX_BODY)));
    }
    docx_paragraphs(&doc_xml)
}

/// Collect `w:t` runs, one line per `w:p` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().map_err(ooxml_err)?.as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file(DOCX_BODY, zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = DocumentExtractor
            .extract("héllo\nworld".as_bytes(), FileKind::Text)
            .unwrap();
        assert_eq!(text, "héllo\nworld");
    }

    #[test]
    fn test_plain_text_strips_bom() {
        let text = DocumentExtractor
            .extract(b"\xEF\xBB\xBFhello", FileKind::Text)
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_invalid_utf8_is_extraction_error() {
        let err = DocumentExtractor
            .extract(&[0xff, 0xfe, 0x00], FileKind::Text)
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let err = DocumentExtractor
            .extract(b"not a pdf", FileKind::Pdf)
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let err = DocumentExtractor
            .extract(b"not a zip", FileKind::Docx)
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let bytes = docx_with_body(
            r#"<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world</w:t></w:r></w:p><w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>"#,
        );
        let text = DocumentExtractor.extract(&bytes, FileKind::Docx).unwrap();
        assert_eq!(text, "Hello world\nSecond & last");
    }

    #[test]
    fn test_docx_without_body_is_error() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = DocumentExtractor.extract(&bytes, FileKind::Docx).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
