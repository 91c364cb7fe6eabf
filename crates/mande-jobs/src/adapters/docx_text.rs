//! DocxText extractor - reads paragraph text from `word/document.xml`.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use mande_core::{Error, ExtractionMethod, Result, TextExtractor};

static PARAGRAPH_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</w:p>|<w:br[^>]*/>|<w:cr[^>]*/>").expect("valid regex"));
static TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab[^>]*/>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Extracts text from an OOXML word-processing document.
pub struct DocxTextExtractor;

/// Turn `document.xml` markup into plain text with one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> String {
    let text = PARAGRAPH_END.replace_all(xml, "\n");
    let text = TAB.replace_all(&text, "\t");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = BLANK_RUNS.replace_all(&text, "\n");
    EXTRA_NEWLINES.replace_all(&text, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[async_trait]
impl TextExtractor for DocxTextExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::DocxText
    }

    async fn extract(&self, data: &[u8], _filename: &str, _mime_type: &str) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::Extraction(format!("invalid DOCX container: {}", e)))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|_| Error::Extraction("no word/document.xml in DOCX".to_string()))?
            .read_to_string(&mut xml)
            .map_err(|e| Error::Extraction(format!("cannot read document.xml: {}", e)))?;

        let text = docx_xml_to_text(&xml);
        if text.is_empty() {
            return Err(Error::Extraction("DOCX contains no text".to_string()));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "docx_text"
    }
}
