//! Centralized default constants for the mande pipeline.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers; most can be overridden by an environment variable read in the
//! owning component's `from_env()`.

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum upload size in bytes (50 MiB).
///
/// Configurable via `MANDE_MAX_UPLOAD_BYTES`.
pub const MAX_UPLOAD_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Maximum filename length kept after sanitisation.
pub const FILENAME_MAX_LENGTH: usize = 255;

/// Maximum characters used when deriving a title from content.
pub const TITLE_MAX_CHARS: usize = 80;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Timeout for each external extraction command (pandoc) in seconds.
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Minimum share of printable characters for an alternate-encoding decode.
pub const PRINTABLE_RATIO_MIN: f32 = 0.5;

/// Minimum character count for an alternate-encoding decode.
pub const ALT_ENCODING_MIN_CHARS: usize = 10;

/// Minimum character count for a raw byte-scan result.
pub const BYTE_SCAN_MIN_CHARS: usize = 50;

/// Minimum run length kept by the legacy `.doc` text scanner.
pub const LEGACY_DOC_MIN_RUN: usize = 4;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Embedding vector dimension, shared by storage, the remote client and the
/// hash fallback. Must match the remote model's output size.
pub const EMBED_DIMENSION: usize = 768;

/// Model label recorded for vectors produced by the local hash fallback.
pub const FALLBACK_EMBED_MODEL: &str = "hash-fallback";

/// Maximum words considered by the hash fallback.
pub const FALLBACK_MAX_WORDS: usize = 100;

/// Scatter iterations per word in the hash fallback.
pub const FALLBACK_SPREAD: u32 = 3;

/// Bucket stride between scatter iterations in the hash fallback.
pub const FALLBACK_STRIDE: u32 = 7;

/// Hard timeout for the background embedding task in seconds.
pub const EMBED_TASK_TIMEOUT_SECS: u64 = 30;

/// Items re-embedded per backfill pass.
pub const EMBED_BACKFILL_BATCH: i64 = 25;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for a single embedding request in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 20;

/// Budget for embedding a search query in milliseconds; past it the search
/// ranks lexically.
pub const QUERY_EMBED_TIMEOUT_MS: u64 = 1500;

/// Timeout for a single generation request in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 60;

/// Maximum retries for transient external failures.
pub const RETRY_MAX: u32 = 3;

/// First backoff delay in milliseconds; doubles per attempt.
pub const RETRY_INITIAL_BACKOFF_MS: u64 = 500;

/// Upper bound on a single backoff delay in milliseconds.
pub const RETRY_MAX_BACKOFF_MS: u64 = 8_000;

/// Default sampling temperature.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Default maximum generated tokens.
pub const GEN_MAX_TOKENS: u32 = 1024;

/// Default top-k sampling.
pub const GEN_TOP_K: u32 = 40;

/// Default top-p sampling.
pub const GEN_TOP_P: f32 = 0.9;

// =============================================================================
// SEARCH
// =============================================================================

/// Default number of knowledge results returned by search.
pub const SEARCH_LIMIT: usize = 10;

/// Results at or below this score are discarded.
pub const SEARCH_MIN_SCORE: f32 = 0.1;

/// Bonus when content contains the whole query.
pub const SCORE_CONTENT_PHRASE: f32 = 0.8;

/// Bonus per whole-word occurrence of a query word.
pub const SCORE_WORD_HIT: f32 = 0.1;

/// Cap on the word-match contribution.
pub const SCORE_WORD_CAP: f32 = 0.3;

/// Bonus when the title contains the query.
pub const SCORE_TITLE: f32 = 0.4;

/// Bonus when the filename contains the query.
pub const SCORE_FILENAME: f32 = 0.2;

/// Weight of the lexical score in hybrid ranking.
pub const LEXICAL_WEIGHT: f32 = 1.0;

/// Weight of cosine similarity in hybrid ranking.
pub const SEMANTIC_WEIGHT: f32 = 0.5;

// =============================================================================
// CONTEXT ASSEMBLY
// =============================================================================

/// Knowledge results placed into the prompt context.
pub const CONTEXT_KNOWLEDGE_LIMIT: usize = 5;

/// Characters kept from each knowledge result.
pub const CONTEXT_KNOWLEDGE_CHARS: usize = 300;

/// Scraped entries placed into the prompt context.
pub const CONTEXT_SCRAPED_LIMIT: usize = 3;

/// Characters kept from each scraped entry.
pub const CONTEXT_SCRAPED_CHARS: usize = 200;

/// Prior chat turns carried into the preamble.
pub const CONTEXT_HISTORY_TURNS: usize = 6;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Lifetime of an uploaded chat document in hours.
pub const DOCUMENT_TTL_HOURS: i64 = 48;

/// Interval between expiry sweeps in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 15 * 60;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default broadcast channel capacity for worker events.
pub const EVENT_BUS_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_cap_is_multiple_of_hit() {
        let hits = (SCORE_WORD_CAP / SCORE_WORD_HIT).round() as u32;
        assert_eq!(hits, 3);
    }

    #[test]
    fn test_upload_ceiling_is_50_mib() {
        assert_eq!(MAX_UPLOAD_SIZE_BYTES, 52_428_800);
    }

    #[test]
    fn test_fallback_spread_fits_dimension() {
        assert!((FALLBACK_SPREAD * FALLBACK_STRIDE) < EMBED_DIMENSION as u32);
    }
}
