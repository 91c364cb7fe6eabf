//! PdfText extractor - reads the PDF text layer with `pdf-extract`.

use async_trait::async_trait;
use tracing::debug;

use mande_core::{Error, ExtractionMethod, Result, TextExtractor};

/// Extracts the text layer of a PDF.
///
/// Parsing runs on the blocking pool; a panic inside the parser is
/// reported as a failed extraction rather than unwinding into the caller.
/// Scanned PDFs without a text layer produce an error so the fallback
/// chain can continue.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PdfText
    }

    async fn extract(&self, data: &[u8], filename: &str, _mime_type: &str) -> Result<String> {
        if !data.starts_with(b"%PDF") {
            return Err(Error::Extraction("missing %PDF header".to_string()));
        }

        let owned = data.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(|e| Error::Extraction(format!("PDF parser aborted: {}", e)))?
            .map_err(|e| Error::Extraction(format!("PDF parse error: {}", e)))?;

        // pdf-extract separates pages with form feeds
        let text = text.replace('\x0C', "\n");
        if text.trim().is_empty() {
            return Err(Error::Extraction(
                "PDF has no extractable text layer".to_string(),
            ));
        }

        debug!(filename, chars = text.len(), "PDF text extracted");
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
