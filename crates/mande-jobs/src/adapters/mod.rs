//! Text extractor implementations, one per extraction method.

pub mod alternate_encoding;
pub mod byte_scan;
pub mod docx_text;
pub mod legacy_doc;
pub mod pandoc;
pub mod pdf_text;
pub mod utf8_text;

pub use alternate_encoding::AlternateEncodingExtractor;
pub use byte_scan::ByteScanExtractor;
pub use docx_text::DocxTextExtractor;
pub use legacy_doc::LegacyDocExtractor;
pub use pandoc::PandocExtractor;
pub use pdf_text::PdfTextExtractor;
pub use utf8_text::Utf8TextExtractor;
