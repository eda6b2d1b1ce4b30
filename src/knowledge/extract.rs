//! Text extraction from uploaded documents

use std::path::Path;

use crate::{Error, Result};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// PDF, extracted page by page
    Pdf,
    /// Plain text or markdown, treated as a single page
    Text,
}

impl DocumentKind {
    /// Detect the kind from a file name's extension
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Extract the text of each page
///
/// # Errors
///
/// Returns error if the format is unsupported or the file cannot be parsed
pub fn extract_pages(bytes: &[u8], name: &str) -> Result<Vec<String>> {
    let kind = DocumentKind::from_name(name)
        .ok_or_else(|| Error::Document(format!("unsupported document type: {name}")))?;

    match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Text => Ok(vec![String::from_utf8_lossy(bytes).into_owned()]),
    }
}

/// Extract and join all pages, each followed by a newline
///
/// # Errors
///
/// Returns error if extraction fails or the document has no text
pub fn extract_text(bytes: &[u8], name: &str) -> Result<String> {
    let pages = extract_pages(bytes, name)?;
    let text = join_pages(&pages);

    if text.trim().is_empty() {
        return Err(Error::Document(format!("no extractable text in {name}")));
    }

    tracing::debug!(document = %name, pages = pages.len(), chars = text.len(), "text extracted");
    Ok(text)
}

/// Concatenate pages as `page + "\n"`
#[must_use]
pub fn join_pages(pages: &[String]) -> String {
    pages.iter().fold(String::new(), |mut acc, page| {
        acc.push_str(page);
        acc.push('\n');
        acc
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>> {
    let document =
        lopdf::Document::load_mem(bytes).map_err(|e| Error::Document(format!("invalid PDF: {e}")))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                // Image-only or oddly encoded pages contribute nothing
                tracing::debug!(page = page_number, error = %e, "page has no extractable text");
                pages.push(String::new());
            }
        }
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(DocumentKind::from_name("Report.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_name("notes.md"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_name("notes.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_name("slides.pptx"), None);
        assert_eq!(DocumentKind::from_name("README"), None);
    }

    #[test]
    fn test_join_pages() {
        let pages = vec!["one".to_string(), "two".to_string()];
        assert_eq!(join_pages(&pages), "one\ntwo\n");
    }

    #[test]
    fn test_plain_text_single_page() {
        let text = extract_text(b"The launch is on Tuesday.", "plan.txt").unwrap();
        assert_eq!(text, "The launch is on Tuesday.\n");
    }

    #[test]
    fn test_empty_document_rejected() {
        let result = extract_text(b"   \n", "empty.md");
        assert!(matches!(result, Err(Error::Document(_))));
    }

    #[test]
    fn test_garbage_pdf_rejected() {
        let result = extract_text(b"definitely not a pdf", "broken.pdf");
        assert!(matches!(result, Err(Error::Document(_))));
    }

    #[test]
    fn test_unsupported_type() {
        assert!(extract_pages(b"data", "image.png").is_err());
    }
}
