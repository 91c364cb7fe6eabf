//! Upload validation and format resolution.
//!
//! Checks, in order:
//! 1. Empty and oversized payloads
//! 2. Extension blocklist
//! 3. Magic byte detection for executables (an `MZ` prefix only counts when
//!    a `PE\0\0` header sits at `e_lfanew`)
//!
//! Format resolution then tries the declared MIME type, the filename
//! extension, and finally magic bytes via `infer`.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::DocumentFormat;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat / Java Class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "so", "dylib", "jar", "class", "apk", "dmg",
        "docm", "dotm", "xlsm", "pptm", "lnk", "hta",
    ]
    .into_iter()
    .collect()
});

/// Reject uploads that are empty, too large, or executable.
pub fn validate_upload(filename: &str, data: &[u8], max_size_bytes: usize) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidInput(format!("{} is empty", filename)));
    }

    if data.len() > max_size_bytes {
        return Err(Error::PayloadTooLarge(format!(
            "{} bytes exceeds the {} byte limit",
            data.len(),
            max_size_bytes
        )));
    }

    if let Some(ext) = extension(filename) {
        if BLOCKED_EXTENSIONS.contains(ext.as_str()) {
            return Err(Error::UnsupportedType(format!(
                "file extension .{} is not allowed",
                ext
            )));
        }
    }

    if is_pe_executable(data) {
        return Err(Error::UnsupportedType(
            "executable file detected: Windows PE".to_string(),
        ));
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if data.starts_with(magic) {
            return Err(Error::UnsupportedType(format!(
                "executable file detected: {}",
                name
            )));
        }
    }

    Ok(())
}

/// `MZ` DOS stub whose `e_lfanew` offset points at a `PE\0\0` signature.
fn is_pe_executable(data: &[u8]) -> bool {
    const E_LFANEW: usize = 0x3C;
    if !data.starts_with(b"MZ") {
        return false;
    }
    let Some(offset) = data.get(E_LFANEW..E_LFANEW + 4) else {
        return false;
    };
    let pe = u32::from_le_bytes([offset[0], offset[1], offset[2], offset[3]]) as usize;
    pe.checked_add(4)
        .and_then(|end| data.get(pe..end))
        .is_some_and(|sig| sig == b"PE\0\0")
}

/// Resolve the upload format: declared MIME, then extension, then magic bytes.
pub fn resolve_format(
    filename: &str,
    declared_mime: Option<&str>,
    data: &[u8],
) -> Result<DocumentFormat> {
    if let Some(format) = declared_mime.and_then(DocumentFormat::from_mime) {
        return Ok(format);
    }

    if let Some(format) = extension(filename).and_then(|ext| DocumentFormat::from_extension(&ext))
    {
        return Ok(format);
    }

    if let Some(format) = infer::get(data).and_then(|kind| DocumentFormat::from_mime(kind.mime_type()))
    {
        return Ok(format);
    }

    Err(Error::UnsupportedType(format!(
        "{} ({})",
        filename,
        declared_mime.unwrap_or("no declared type")
    )))
}

/// Lowercased extension without the dot, if the filename has one.
fn extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed_file".to_string();
    }

    let max = defaults::FILENAME_MAX_LENGTH;
    if sanitized.chars().count() > max {
        if let Some((stem, ext)) = sanitized.rsplit_once('.') {
            let keep = max.saturating_sub(ext.chars().count() + 1);
            let stem: String = stem.chars().take(keep).collect();
            return format!("{}.{}", stem, ext);
        }
        return sanitized.chars().take(max).collect();
    }

    sanitized.to_string()
}

/// Whether a character counts as readable text for extraction heuristics.
pub fn is_printable(c: char) -> bool {
    c == '\n' || c == '\r' || c == '\t' || (!c.is_control() && c != '\u{FFFD}')
}

/// Share of characters in `text` that are printable. Empty text scores 0.
pub fn printable_ratio(text: &str) -> f32 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        if is_printable(c) {
            printable += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        printable as f32 / total as f32
    }
}
