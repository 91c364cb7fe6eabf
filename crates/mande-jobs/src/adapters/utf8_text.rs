//! Utf8Text extractor - strict UTF-8 decode for text formats.

use async_trait::async_trait;

use mande_core::defaults::PRINTABLE_RATIO_MIN;
use mande_core::{printable_ratio, Error, ExtractionMethod, Result, TextExtractor};

/// Decodes the bytes as UTF-8 without replacement.
///
/// A leading byte-order mark is dropped. Output that is blank or mostly
/// control characters is rejected so binary data falls through to the
/// next method.
pub struct Utf8TextExtractor;

#[async_trait]
impl TextExtractor for Utf8TextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Utf8Text
    }

    async fn extract(&self, data: &[u8], _filename: &str, _mime_type: &str) -> Result<String> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Extraction(format!("invalid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

        if text.trim().is_empty() {
            return Err(Error::Extraction("decoded text is blank".to_string()));
        }
        if printable_ratio(text) <= PRINTABLE_RATIO_MIN {
            return Err(Error::Extraction(
                "decoded text is mostly non-printable".to_string(),
            ));
        }
        Ok(text.to_string())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "utf8_text"
    }
}
