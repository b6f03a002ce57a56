//! services/api/src/adapters/pdf.rs
//!
//! Reference-document text extraction with `pdf_oxide`. Uploads are parsed in
//! memory on the blocking pool and bounded by a deadline.

use std::time::Duration;

use activity_planner_core::{PdfTextExtractor, PortError, PortResult};
use async_trait::async_trait;
use pdf_oxide::PdfDocument;
use tracing::{debug, info};

const PARSE_DEADLINE: Duration = Duration::from_secs(30);
const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Default)]
pub struct PdfOxideExtractor;

impl PdfOxideExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Parses a whole upload and returns the cleaned text of every readable page.
fn read_document(bytes: Vec<u8>) -> PortResult<String> {
    let doc = PdfDocument::from_bytes(bytes)
        .map_err(|e| PortError::InvalidInput(format!("upload is not a readable PDF: {e}")))?;
    let pages = doc
        .page_count()
        .map_err(|e| PortError::InvalidInput(format!("PDF page tree is damaged: {e}")))?;

    let mut readable = 0usize;
    let mut text = String::new();
    for index in 0..pages {
        let page = match doc.extract_text(index) {
            Ok(raw) => normalize_whitespace(&raw),
            Err(e) => {
                debug!(page = index + 1, error = %e, "Skipping unreadable page");
                continue;
            }
        };
        if page.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push_str(PAGE_SEPARATOR);
        }
        text.push_str(&page);
        readable += 1;
    }

    info!(pages, readable, "Reference PDF read");
    if text.is_empty() {
        return Err(PortError::InvalidInput(
            "PDF has no text layer to read".to_string(),
        ));
    }
    Ok(text)
}

/// Collapses runs of spaces inside lines and drops blank lines.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl PdfTextExtractor for PdfOxideExtractor {
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    async fn extract_text(&self, data: &[u8]) -> PortResult<String> {
        let bytes = data.to_vec();
        let worker = tokio::task::spawn_blocking(move || read_document(bytes));
        match tokio::time::timeout(PARSE_DEADLINE, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(PortError::Unexpected(format!("PDF worker stopped: {join}"))),
            Err(_) => Err(PortError::InvalidInput(format!(
                "PDF took longer than {}s to read",
                PARSE_DEADLINE.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_normalized() {
        let text = "  Phonological   awareness \n\n\t\n  rhyme  tasks ";
        assert_eq!(normalize_whitespace(text), "Phonological awareness\nrhyme tasks");
    }

    #[test]
    fn unreadable_upload_is_invalid_input() {
        let err = read_document(b"%PDF-1.4 truncated".to_vec()).unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn garbage_bytes_are_rejected() {
        let extractor = PdfOxideExtractor::new();
        assert!(extractor.extract_text(b"definitely not a pdf").await.is_err());
    }
}
