#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! First-page text decoding for task order PDFs.
//!
//! Task orders are single-page forms, so only the text of the first page
//! is returned. Text extraction is pure Rust ([`pdf_extract`]); a document
//! that cannot be decoded, has no pages, or has a blank first page is a
//! [`PdfError`].

use std::any::Any;
use std::path::Path;

/// Errors that prevent a document's text from being read.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    /// The file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed to read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// PDF text extraction failed.
    #[error("PDF extraction error: {0}")]
    Extraction(String),

    /// The document decoded but contains no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// The first page has no extractable text.
    #[error("PDF first page has no extractable text")]
    EmptyText,
}

/// Reads the PDF at `path` and returns the text of its first page.
///
/// # Errors
///
/// Returns [`PdfError`] if the file cannot be read or decoded, or if its
/// first page is missing or blank.
pub fn first_page_text(path: &Path) -> Result<String, PdfError> {
    let bytes = std::fs::read(path).map_err(|e| PdfError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    log::debug!("Read {} bytes from {}", bytes.len(), path.display());

    let text = first_page_text_from_mem(&bytes)?;

    log::debug!(
        "Extracted {} characters of first-page text from {}",
        text.len(),
        path.display()
    );

    Ok(text)
}

/// Decodes in-memory PDF bytes and returns the text of the first page.
///
/// `pdf_extract` panics on some malformed inputs; those panics are
/// reported as [`PdfError::Extraction`].
///
/// # Errors
///
/// Returns [`PdfError`] if the bytes are not a decodable PDF or the first
/// page is missing or blank.
pub fn first_page_text_from_mem(bytes: &[u8]) -> Result<String, PdfError> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|payload| {
            PdfError::Extraction(format!("decoder panicked: {}", panic_message(&*payload)))
        })?
        .map_err(|e| PdfError::Extraction(format!("failed to extract text from PDF: {e}")))?;

    first_page(pages)
}

/// Picks the first page out of per-page text.
fn first_page(pages: Vec<String>) -> Result<String, PdfError> {
    let page = pages.into_iter().next().ok_or(PdfError::NoPages)?;
    if page.trim().is_empty() {
        return Err(PdfError::EmptyText);
    }
    Ok(page)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_selected() {
        let pages = vec!["Task Order Number: TO-1".to_owned(), "page two".to_owned()];
        assert_eq!(first_page(pages).unwrap(), "Task Order Number: TO-1");
    }

    #[test]
    fn no_pages_is_an_error() {
        assert!(matches!(first_page(Vec::new()), Err(PdfError::NoPages)));
    }

    #[test]
    fn blank_first_page_is_an_error() {
        let pages = vec![" \n\t ".to_owned(), "text on page two".to_owned()];
        assert!(matches!(first_page(pages), Err(PdfError::EmptyText)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("task_orders_pdf_test_missing.pdf");
        let _ = std::fs::remove_file(&path);
        assert!(matches!(first_page_text(&path), Err(PdfError::Io { .. })));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = first_page_text_from_mem(b"this is not a pdf");
        assert!(matches!(result, Err(PdfError::Extraction(_))));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("bad xref");
        assert_eq!(panic_message(&*boxed), "bad xref");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bad stream"));
        assert_eq!(panic_message(&*boxed), "bad stream");
    }
}
