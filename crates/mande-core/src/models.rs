//! Domain models for knowledge items, chat documents, and extraction results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// Re-export of the vector type used for stored embeddings.
pub use pgvector::Vector;

// =============================================================================
// KNOWLEDGE ITEMS
// =============================================================================

/// Where a knowledge item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    /// Text extracted from an uploaded file
    #[default]
    FileUpload,
    /// Text entered directly by the user
    Manual,
    /// Text produced by the website scraper
    Scraped,
}

impl std::fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileUpload => write!(f, "file_upload"),
            Self::Manual => write!(f, "manual"),
            Self::Scraped => write!(f, "scraped"),
        }
    }
}

impl std::str::FromStr for KnowledgeSource {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file_upload" | "upload" | "file" => Ok(Self::FileUpload),
            "manual" => Ok(Self::Manual),
            "scraped" => Ok(Self::Scraped),
            _ => Err(format!("Invalid knowledge source: {}", s)),
        }
    }
}

/// A stored, searchable unit of extracted text scoped to one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub source: KnowledgeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Vector attached by the background embedding task.
    #[serde(skip)]
    pub embedding: Option<Vector>,
    /// Producer of `embedding` (remote model name or the hash fallback label).
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeItem {
    /// Whether a vector has been attached.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Request for creating a knowledge item.
#[derive(Debug, Clone)]
pub struct CreateKnowledgeRequest {
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub content: String,
    pub source: KnowledgeSource,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

impl CreateKnowledgeRequest {
    /// Title to store: explicit title, else filename stem, else first content line.
    pub fn resolved_title(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim) {
            if !title.is_empty() {
                return truncate_chars(title, defaults::TITLE_MAX_CHARS);
            }
        }
        if let Some(filename) = self.filename.as_deref() {
            let stem = filename
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(filename)
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(filename)
                .trim();
            if !stem.is_empty() {
                return truncate_chars(stem, defaults::TITLE_MAX_CHARS);
            }
        }
        derive_title(&self.content)
    }
}

/// First non-empty line of `content`, truncated for display.
pub fn derive_title(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled");
    truncate_chars(line, defaults::TITLE_MAX_CHARS)
}

/// Format repair applied to extracted text before it is stored:
/// NUL bytes removed, CRLF/CR line endings normalised, outer whitespace trimmed.
pub fn repair_content(content: &str) -> String {
    content
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Aggregate statistics over one owner's knowledge items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_entries: i64,
    pub total_content_bytes: i64,
    /// Count per MIME category (see [`mime_category`]).
    pub counts_by_type: BTreeMap<String, i64>,
}

/// Collapse a MIME type into the category used by [`KnowledgeStats`].
pub fn mime_category(mime_type: Option<&str>) -> &'static str {
    let Some(mime) = mime_type else {
        return "other";
    };
    match DocumentFormat::from_mime(mime) {
        Some(DocumentFormat::Pdf) => "pdf",
        Some(DocumentFormat::Docx) | Some(DocumentFormat::LegacyDoc) => "word",
        Some(DocumentFormat::PlainText) => "text",
        Some(DocumentFormat::Markdown) => "markdown",
        Some(DocumentFormat::Csv) => "csv",
        Some(DocumentFormat::Json) => "json",
        Some(DocumentFormat::Html) => "html",
        Some(DocumentFormat::Rtf) => "rtf",
        None => "other",
    }
}

// =============================================================================
// CHAT DOCUMENTS
// =============================================================================

/// Processing state of an uploaded chat document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Extraction is still running
    #[default]
    Processing,
    /// Extraction succeeded and `content` is set
    Ready,
    /// Every extraction strategy failed
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" | "pending" => Ok(Self::Processing),
            "ready" | "completed" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// A transient chat attachment that expires automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub embedding: Option<Vector>,
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Request for registering a document whose extraction is about to start.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub owner_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// SCRAPED KNOWLEDGE
// =============================================================================

/// Organisation-wide knowledge produced by the website scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedEntry {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub content: String,
    pub scraped_at: DateTime<Utc>,
}

/// Request for storing a scraped page.
#[derive(Debug, Clone)]
pub struct NewScrapedEntry {
    pub url: String,
    pub title: String,
    pub content: String,
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Upload format, resolved from the declared MIME type or the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    LegacyDoc,
    PlainText,
    Markdown,
    Csv,
    Json,
    Html,
    Rtf,
}

impl DocumentFormat {
    /// Map a MIME type (parameters such as `; charset=` ignored) to a format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let base = mime
            .split(';')
            .next()
            .unwrap_or(mime)
            .trim()
            .to_lowercase();
        match base.as_str() {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/msword" | "application/vnd.ms-word" => Some(Self::LegacyDoc),
            "text/plain" => Some(Self::PlainText),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "text/csv" | "application/csv" => Some(Self::Csv),
            "application/json" | "text/json" => Some(Self::Json),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "application/rtf" | "text/rtf" => Some(Self::Rtf),
            _ => None,
        }
    }

    /// Map a filename extension (case-insensitive, without the dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::LegacyDoc),
            "txt" | "text" | "log" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            "rtf" => Some(Self::Rtf),
            _ => None,
        }
    }

    /// Canonical MIME type for the format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::LegacyDoc => "application/msword",
            Self::PlainText => "text/plain",
            Self::Markdown => "text/markdown",
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Html => "text/html",
            Self::Rtf => "application/rtf",
        }
    }

    /// The method tried first for this format.
    pub fn primary_method(&self) -> ExtractionMethod {
        match self {
            Self::Pdf => ExtractionMethod::PdfText,
            Self::Docx => ExtractionMethod::DocxText,
            Self::LegacyDoc => ExtractionMethod::LegacyDoc,
            Self::PlainText
            | Self::Markdown
            | Self::Csv
            | Self::Json
            | Self::Html
            | Self::Rtf => ExtractionMethod::Utf8Text,
        }
    }
}

/// A text extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// PDF text layer
    PdfText,
    /// OOXML `word/document.xml` runs
    DocxText,
    /// Best-effort text runs from an OLE `.doc` container
    LegacyDoc,
    /// Strict UTF-8 decode
    Utf8Text,
    /// External document-to-text tool (pandoc)
    ExternalTool,
    /// UTF-8 / Latin-1 / ASCII / UTF-16LE with a printable-ratio check
    AlternateEncoding,
    /// Printable ASCII scan of the raw bytes
    ByteScan,
}

impl ExtractionMethod {
    /// Fallback order tried after the primary method fails.
    pub const FALLBACK_CHAIN: [ExtractionMethod; 4] = [
        Self::Utf8Text,
        Self::ExternalTool,
        Self::AlternateEncoding,
        Self::ByteScan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PdfText => "pdf_text",
            Self::DocxText => "docx_text",
            Self::LegacyDoc => "legacy_doc",
            Self::Utf8Text => "utf8_text",
            Self::ExternalTool => "external_tool",
            Self::AlternateEncoding => "alternate_encoding",
            Self::ByteScan => "byte_scan",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionMethod {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf_text" | "pdf" => Ok(Self::PdfText),
            "docx_text" | "docx" => Ok(Self::DocxText),
            "legacy_doc" | "doc" => Ok(Self::LegacyDoc),
            "utf8_text" | "utf8" | "text" => Ok(Self::Utf8Text),
            "external_tool" | "pandoc" => Ok(Self::ExternalTool),
            "alternate_encoding" | "encoding" => Ok(Self::AlternateEncoding),
            "byte_scan" | "raw" => Ok(Self::ByteScan),
            _ => Err(format!("Invalid extraction method: {}", s)),
        }
    }
}

/// One extractor invocation recorded for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of running the extraction engine over one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub text: String,
    pub success: bool,
    pub method_used: Option<ExtractionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: Vec<ExtractionAttempt>,
}

impl ExtractionOutcome {
    /// A failure recorded before any extractor ran.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            success: false,
            method_used: None,
            error: Some(reason.into()),
            attempts: Vec::new(),
        }
    }

    /// Methods attempted, in order.
    pub fn attempted_methods(&self) -> Vec<ExtractionMethod> {
        self.attempts.iter().map(|a| a.method).collect()
    }
}

// =============================================================================
// EMBEDDING & GENERATION
// =============================================================================

/// Where an embedding vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingSource {
    /// The external embedding endpoint
    Remote,
    /// The deterministic local hash approximation
    Fallback,
}

impl std::fmt::Display for EmbeddingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A vector together with its provenance.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub vector: Vector,
    pub source: EmbeddingSource,
    /// Model label stored alongside the vector.
    pub model: String,
}

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A prior chat message supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Sampling parameters for the generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: defaults::GEN_TEMPERATURE,
            max_tokens: defaults::GEN_MAX_TOKENS,
            top_k: defaults::GEN_TOP_K,
            top_p: defaults::GEN_TOP_P,
        }
    }
}

/// A prompt plus sampling parameters.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub options: SamplingOptions,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(title: Option<&str>, filename: Option<&str>, content: &str) -> CreateKnowledgeRequest {
        CreateKnowledgeRequest {
            owner_id: Uuid::nil(),
            title: title.map(String::from),
            content: content.to_string(),
            source: KnowledgeSource::FileUpload,
            filename: filename.map(String::from),
            mime_type: None,
        }
    }

    #[test]
    fn test_title_prefers_explicit() {
        let req = request(Some("  Budget  "), Some("q3.pdf"), "ignored");
        assert_eq!(req.resolved_title(), "Budget");
    }

    #[test]
    fn test_title_falls_back_to_filename_stem() {
        let req = request(Some("   "), Some("reports/q3-summary.final.pdf"), "ignored");
        assert_eq!(req.resolved_title(), "q3-summary.final");
    }

    #[test]
    fn test_title_falls_back_to_first_content_line() {
        let req = request(None, None, "\n\n  Quarterly Budget Review \nbody");
        assert_eq!(req.resolved_title(), "Quarterly Budget Review");
    }

    #[test]
    fn test_derive_title_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), defaults::TITLE_MAX_CHARS);
    }

    #[test]
    fn test_repair_content() {
        assert_eq!(repair_content("  a\r\nb\0c\rd  "), "a\nbc\nd");
        assert_eq!(repair_content("\0\0  "), "");
    }

    #[test]
    fn test_format_from_mime_ignores_parameters() {
        assert_eq!(
            DocumentFormat::from_mime("text/plain; charset=utf-8"),
            Some(DocumentFormat::PlainText)
        );
        assert_eq!(
            DocumentFormat::from_mime("APPLICATION/PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_mime("image/png"), None);
    }

    #[test]
    fn test_primary_methods() {
        assert_eq!(DocumentFormat::Pdf.primary_method(), ExtractionMethod::PdfText);
        assert_eq!(DocumentFormat::Docx.primary_method(), ExtractionMethod::DocxText);
        assert_eq!(
            DocumentFormat::LegacyDoc.primary_method(),
            ExtractionMethod::LegacyDoc
        );
        for format in [
            DocumentFormat::PlainText,
            DocumentFormat::Markdown,
            DocumentFormat::Csv,
            DocumentFormat::Json,
            DocumentFormat::Html,
            DocumentFormat::Rtf,
        ] {
            assert_eq!(format.primary_method(), ExtractionMethod::Utf8Text);
        }
    }

    #[test]
    fn test_extraction_method_roundtrip_names() {
        for method in [
            ExtractionMethod::PdfText,
            ExtractionMethod::DocxText,
            ExtractionMethod::LegacyDoc,
            ExtractionMethod::Utf8Text,
            ExtractionMethod::ExternalTool,
            ExtractionMethod::AlternateEncoding,
            ExtractionMethod::ByteScan,
        ] {
            let parsed: ExtractionMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed, method);
        }
    }

    #[test]
    fn test_mime_category() {
        assert_eq!(mime_category(Some("application/pdf")), "pdf");
        assert_eq!(mime_category(Some("application/msword")), "word");
        assert_eq!(mime_category(Some("text/markdown")), "markdown");
        assert_eq!(mime_category(Some("image/png")), "other");
        assert_eq!(mime_category(None), "other");
    }

    #[test]
    fn test_knowledge_item_serialization_skips_embedding() {
        let item = KnowledgeItem {
            id: Uuid::nil(),
            owner_id: Uuid::nil(),
            title: "t".into(),
            content: "c".into(),
            source: KnowledgeSource::Manual,
            filename: None,
            mime_type: None,
            embedding: Some(Vector::from(vec![0.1, 0.2])),
            embedding_model: Some("hash-fallback".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["source"], "manual");
        assert_eq!(json["embedding_model"], "hash-fallback");
    }
}
