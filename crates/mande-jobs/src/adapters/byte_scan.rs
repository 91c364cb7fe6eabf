//! ByteScan extractor - last-resort printable ASCII scan.

use async_trait::async_trait;

use mande_core::defaults::BYTE_SCAN_MIN_CHARS;
use mande_core::{Error, ExtractionMethod, Result, TextExtractor};

/// Keep printable ASCII plus `\n`, `\r`, `\t`; stop at the first NUL once
/// some text has been collected.
pub fn scan_printable(data: &[u8]) -> String {
    let mut out = String::new();
    for &b in data {
        if b == 0 {
            if !out.trim().is_empty() {
                break;
            }
            continue;
        }
        if matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E) {
            out.push(b as char);
        }
    }
    out
}

pub struct ByteScanExtractor;

#[async_trait]
impl TextExtractor for ByteScanExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ByteScan
    }

    async fn extract(&self, data: &[u8], _filename: &str, _mime_type: &str) -> Result<String> {
        let text = scan_printable(data);
        let len = text.trim().chars().count();
        if len <= BYTE_SCAN_MIN_CHARS {
            return Err(Error::Extraction(format!(
                "byte scan recovered only {} characters",
                len
            )));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "byte_scan"
    }
}
