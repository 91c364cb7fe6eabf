//! LegacyDoc extractor - best-effort text recovery from OLE `.doc` files.
//!
//! Word 97-2003 stores body text either as 8-bit characters or as UTF-16LE
//! inside the `WordDocument` stream. Without a full OLE/FIB parser we scan
//! the whole container for runs of readable characters in both encodings
//! and keep whichever yields more text.

use async_trait::async_trait;

use mande_core::defaults::LEGACY_DOC_MIN_RUN;
use mande_core::{Error, ExtractionMethod, Result, TextExtractor};

/// OLE2 compound document signature.
pub const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Structural names that appear as text inside every OLE container.
const OLE_NOISE: &[&str] = &[
    "Root Entry",
    "WordDocument",
    "SummaryInformation",
    "DocumentSummaryInformation",
    "CompObj",
    "1Table",
    "0Table",
    "Microsoft Word",
    "MSWordDoc",
    "Word.Document",
    "Normal.dot",
];

pub struct LegacyDocExtractor;

fn is_text_char(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t' | ' '..='~') || c.is_alphabetic()
}

/// Keep runs of at least `min_run` readable characters that contain a letter.
fn collect_runs(chars: impl Iterator<Item = char>, min_run: usize) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in chars {
        if is_text_char(c) {
            current.push(c);
        } else {
            push_run(&mut runs, &mut current, min_run);
        }
    }
    push_run(&mut runs, &mut current, min_run);
    runs
}

fn push_run(runs: &mut Vec<String>, current: &mut String, min_run: usize) {
    let run = current.trim();
    if run.chars().count() >= min_run
        && run.chars().any(char::is_alphabetic)
        && !OLE_NOISE.iter().any(|noise| run.contains(noise))
    {
        runs.push(run.to_string());
    }
    current.clear();
}

/// Best-effort text from a `.doc` body.
pub fn scan_doc_text(data: &[u8], min_run: usize) -> String {
    let ascii = collect_runs(data.iter().map(|b| *b as char), min_run);
    let utf16 = collect_runs(
        char::decode_utf16(
            data.chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        )
        .map(|r| r.unwrap_or('\u{FFFD}')),
        min_run,
    );

    let ascii_len: usize = ascii.iter().map(|r| r.chars().count()).sum();
    let utf16_len: usize = utf16.iter().map(|r| r.chars().count()).sum();
    let best = if utf16_len > ascii_len { utf16 } else { ascii };
    best.join("\n").replace('\r', "\n")
}

#[async_trait]
impl TextExtractor for LegacyDocExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::LegacyDoc
    }

    async fn extract(&self, data: &[u8], _filename: &str, _mime_type: &str) -> Result<String> {
        if !data.starts_with(&OLE_MAGIC) {
            return Err(Error::Extraction(
                "not an OLE compound document".to_string(),
            ));
        }
        let text = scan_doc_text(&data[OLE_MAGIC.len()..], LEGACY_DOC_MIN_RUN);
        if text.trim().is_empty() {
            return Err(Error::Extraction(
                "no readable text in .doc container".to_string(),
            ));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "legacy_doc"
    }
}
