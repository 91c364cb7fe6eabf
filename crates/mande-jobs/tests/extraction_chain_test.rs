//! End-to-end extraction over real sample files.
//!
//! Samples are generated in memory: a one-page PDF with a Helvetica text
//! layer, a DOCX zip container, an OLE-headed legacy DOC, and plain text
//! formats. Pandoc is disabled so results do not depend on the host.

use std::io::{Cursor, Write};

use mande_jobs::{Error, ExtractionConfig, ExtractionEngine, ExtractionMethod};

async fn engine() -> ExtractionEngine {
    ExtractionEngine::initialize(ExtractionConfig::default().with_pandoc(false)).await
}

/// Build a single-page PDF whose content stream draws `text` in Helvetica.
fn sample_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}

fn sample_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn sample_legacy_doc(text: &str) -> Vec<u8> {
    let mut data = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    data.extend(std::iter::repeat(0x00).take(504));
    data.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
    data.extend(std::iter::repeat(0x00).take(64));
    data
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

#[tokio::test]
async fn test_pdf_uses_text_layer() {
    let engine = engine().await;
    let outcome = engine
        .extract(
            &sample_pdf("Quarterly budget review"),
            Some("application/pdf"),
            "budget.pdf",
        )
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.method_used, Some(ExtractionMethod::PdfText));
    assert!(outcome.text.contains("Quarterly"));
}

#[tokio::test]
async fn test_docx_paragraphs() {
    let engine = engine().await;
    let data = sample_docx(&["Annual report", "Targets met in three districts"]);
    let outcome = engine
        .extract(
            &data,
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            "report.docx",
        )
        .await
        .unwrap();

    assert_eq!(outcome.method_used, Some(ExtractionMethod::DocxText));
    assert_eq!(outcome.text, "Annual report\nTargets met in three districts");
}

#[tokio::test]
async fn test_docx_resolved_by_extension() {
    let engine = engine().await;
    let data = sample_docx(&["Resolved without a declared type"]);
    let outcome = engine.extract(&data, None, "minutes.docx").await.unwrap();
    assert_eq!(outcome.method_used, Some(ExtractionMethod::DocxText));
}

#[tokio::test]
async fn test_legacy_doc_scan() {
    let engine = engine().await;
    let data = sample_legacy_doc("Beneficiary survey results for the spring round");
    let outcome = engine
        .extract(&data, Some("application/msword"), "survey.doc")
        .await
        .unwrap();

    assert_eq!(outcome.method_used, Some(ExtractionMethod::LegacyDoc));
    assert!(outcome.text.contains("Beneficiary survey results"));
}

#[tokio::test]
async fn test_text_formats_use_utf8() {
    let engine = engine().await;
    let samples: [(&str, &str, &[u8]); 6] = [
        ("notes.txt", "text/plain", b"Plain notes about the field visit"),
        ("readme.md", "text/markdown", b"# Heading\n\nMarkdown body"),
        ("data.csv", "text/csv", b"district,households\nnorth,120\n"),
        ("data.json", "application/json", br#"{"district": "north"}"#),
        ("page.html", "text/html", b"<html><body><p>Hello</p></body></html>"),
        ("memo.rtf", "application/rtf", br"{\rtf1\ansi Memo text}"),
    ];

    for (filename, mime, data) in samples {
        let outcome = engine.extract(data, Some(mime), filename).await.unwrap();
        assert!(outcome.success, "{} failed: {:?}", filename, outcome.error);
        assert_eq!(
            outcome.method_used,
            Some(ExtractionMethod::Utf8Text),
            "{}",
            filename
        );
        assert!(!outcome.text.trim().is_empty());
    }
}

#[tokio::test]
async fn test_corrupted_pdf_falls_back_to_byte_scan() {
    let engine = engine().await;
    // Even length keeps the UTF-16 decode aligned on the binary tail.
    let mut data = b"%PDF-1.7\nRecovered budget narrative from a damaged export file.\n".to_vec();
    assert_eq!(data.len() % 2, 0);
    for _ in 0..200 {
        data.extend_from_slice(&[0x81, 0x00]);
    }

    let outcome = engine
        .extract(&data, Some("application/pdf"), "damaged.pdf")
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.method_used, Some(ExtractionMethod::ByteScan));
    assert_eq!(
        outcome.attempted_methods(),
        vec![
            ExtractionMethod::PdfText,
            ExtractionMethod::Utf8Text,
            ExtractionMethod::AlternateEncoding,
            ExtractionMethod::ByteScan,
        ]
    );
    assert!(outcome.text.contains("Recovered budget narrative"));
}

#[tokio::test]
async fn test_utf16_text_falls_back_to_alternate_encoding() {
    let engine = engine().await;
    let data = utf16le("Monitoring report for the northern district");

    let outcome = engine
        .extract(&data, Some("text/plain"), "report.txt")
        .await
        .unwrap();

    assert_eq!(outcome.method_used, Some(ExtractionMethod::AlternateEncoding));
    assert_eq!(outcome.text, "Monitoring report for the northern district");
    assert!(!outcome.attempts[0].succeeded);
}

#[tokio::test]
async fn test_unreadable_file_reports_every_attempt() {
    let engine = engine().await;
    let data = vec![0u8; 256];

    let outcome = engine
        .extract(&data, Some("text/plain"), "blank.txt")
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.method_used.is_none());
    let error = outcome.error.unwrap();
    for method in ["utf8_text", "alternate_encoding", "byte_scan"] {
        assert!(error.contains(method), "missing {} in {}", method, error);
    }
}

#[tokio::test]
async fn test_oversized_upload_rejected_before_extraction() {
    let engine = engine().await;
    let data = vec![b'a'; 60 * 1024 * 1024];

    let err = engine
        .extract(&data, Some("text/plain"), "huge.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge(_)));
}

#[tokio::test]
async fn test_readiness_reports_builtin_extractors() {
    let engine = engine().await;
    let readiness = engine.readiness();
    for method in [
        ExtractionMethod::PdfText,
        ExtractionMethod::DocxText,
        ExtractionMethod::LegacyDoc,
        ExtractionMethod::Utf8Text,
        ExtractionMethod::AlternateEncoding,
        ExtractionMethod::ByteScan,
    ] {
        assert!(readiness.is_ready(method), "{} not ready", method);
    }
    assert!(!engine.registry().has_extractor(ExtractionMethod::ExternalTool));
}
