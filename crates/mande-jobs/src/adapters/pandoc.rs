//! External tool extractor - converts documents to plain text with pandoc.
//!
//! Registered only when `pandoc --version` succeeds at startup.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use mande_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use mande_core::{Error, ExtractionMethod, Result, TextExtractor};

pub struct PandocExtractor {
    binary: String,
    timeout: Duration,
}

impl PandocExtractor {
    pub fn new() -> Self {
        Self {
            binary: "pandoc".to_string(),
            timeout: Duration::from_secs(EXTRACTION_CMD_TIMEOUT_SECS),
        }
    }

    /// Use a specific executable path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PandocExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Determine the pandoc input format from filename extension.
fn pandoc_input_format(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "docx" => Some("docx"),
        "rtf" => Some("rtf"),
        "html" | "htm" => Some("html"),
        "md" | "markdown" => Some("markdown"),
        "csv" => Some("csv"),
        _ => None,
    }
}

/// Determine the pandoc input format from MIME type.
fn pandoc_format_from_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/rtf" | "text/rtf" => Some("rtf"),
        "text/html" => Some("html"),
        "text/markdown" => Some("markdown"),
        "text/csv" => Some("csv"),
        _ => None,
    }
}

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<String> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "external command timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Extraction(format!("failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "command failed ({}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl TextExtractor for PandocExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::ExternalTool
    }

    async fn extract(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String> {
        let format = pandoc_input_format(filename)
            .or_else(|| pandoc_format_from_mime(mime_type))
            .ok_or_else(|| {
                Error::Extraction(format!("no pandoc reader for {} ({})", filename, mime_type))
            })?;

        let suffix = filename
            .rsplit_once('.')
            .map(|(_, e)| format!(".{}", e))
            .unwrap_or_default();
        let mut tmpfile = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
        tmpfile
            .write_all(data)
            .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;

        debug!(filename, format, "Converting with pandoc");

        let text = run_cmd_with_timeout(
            Command::new(&self.binary)
                .arg("-f")
                .arg(format)
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(tmpfile.path()),
            self.timeout,
        )
        .await?;

        if text.trim().is_empty() {
            return Err(Error::Extraction("pandoc produced no text".to_string()));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<bool> {
        match run_cmd_with_timeout(
            Command::new(&self.binary).arg("--version"),
            Duration::from_secs(5),
        )
        .await
        {
            Ok(version) => {
                debug!(
                    version = version.lines().next().unwrap_or_default(),
                    "pandoc available"
                );
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pandoc"
    }
}
