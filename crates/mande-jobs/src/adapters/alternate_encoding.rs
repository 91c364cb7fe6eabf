//! AlternateEncoding extractor - retries the bytes under other encodings.

use async_trait::async_trait;

use mande_core::defaults::{ALT_ENCODING_MIN_CHARS, PRINTABLE_RATIO_MIN};
use mande_core::{printable_ratio, Error, ExtractionMethod, Result, TextExtractor};

/// Encodings tried, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Latin1,
    Ascii,
    Utf16Le,
}

impl Encoding {
    pub const ORDER: [Encoding; 4] = [
        Encoding::Utf8,
        Encoding::Latin1,
        Encoding::Ascii,
        Encoding::Utf16Le,
    ];

    /// Lossy decode; undecodable input becomes U+FFFD.
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Encoding::Latin1 => data.iter().map(|b| *b as char).collect(),
            Encoding::Ascii => data
                .iter()
                .map(|b| if b.is_ascii() { *b as char } else { '\u{FFFD}' })
                .collect(),
            Encoding::Utf16Le => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16_lossy(&units)
            }
        }
    }
}

/// Whether decoded text is plausibly human-readable.
pub fn looks_like_text(text: &str) -> bool {
    text.trim().chars().count() > ALT_ENCODING_MIN_CHARS && printable_ratio(text) > PRINTABLE_RATIO_MIN
}

pub struct AlternateEncodingExtractor;

#[async_trait]
impl TextExtractor for AlternateEncodingExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::AlternateEncoding
    }

    async fn extract(&self, data: &[u8], _filename: &str, _mime_type: &str) -> Result<String> {
        for encoding in Encoding::ORDER {
            let text = encoding.decode(data);
            if looks_like_text(&text) {
                tracing::debug!(?encoding, "Decoded with alternate encoding");
                return Ok(text.replace('\0', ""));
            }
        }
        Err(Error::Extraction(
            "no encoding produced readable text".to_string(),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "alternate_encoding"
    }
}
