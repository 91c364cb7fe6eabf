//! # mande-jobs
//!
//! Text extraction and background work for the mande pipeline.
//!
//! This crate provides:
//! - The extraction engine: a primary method per format plus an ordered
//!   fallback chain over a registry of [`TextExtractor`] implementations
//! - Fire-and-forget embedding tasks bounded by a hard timeout
//! - Chat document intake with background extraction
//! - A periodic expiry sweeper with an embedding backfill pass
//!
//! ## Example
//!
//! ```ignore
//! use mande_jobs::{ExpirySweeper, ExtractionConfig, ExtractionEngine, SweepConfig};
//!
//! let engine = ExtractionEngine::initialize(ExtractionConfig::from_env()).await;
//! let outcome = engine.extract(&bytes, Some("application/pdf"), "report.pdf").await?;
//!
//! let handle = ExpirySweeper::new(documents, SweepConfig::from_env()).start();
//! handle.shutdown().await?;
//! ```

pub mod adapters;
pub mod documents;
pub mod embedding;
pub mod extraction;
pub mod sweep;

// Re-export core types
pub use mande_core::*;

pub use adapters::{
    AlternateEncodingExtractor, ByteScanExtractor, DocxTextExtractor, LegacyDocExtractor,
    PandocExtractor, PdfTextExtractor, Utf8TextExtractor,
};
pub use documents::{DocumentConfig, DocumentProcessor};
pub use embedding::{EmbeddingTarget, EmbeddingTasks};
pub use extraction::{
    builtin_extractors, ExtractionConfig, ExtractionEngine, ExtractionRegistry,
    ExtractorReadiness,
};
pub use sweep::{ExpirySweeper, SweepConfig, SweepEvent, SweeperHandle};
