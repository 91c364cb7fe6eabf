//! Structured logging schema and field name constants for mande.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (scores, attempts) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → background task.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "search", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "extraction", "embedder", "ollama", "sweeper", "context"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "extract", "embed", "generate", "search", "sweep"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Knowledge item UUID being operated on.
pub const ITEM_ID: &str = "item_id";

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Owning user UUID.
pub const OWNER_ID: &str = "owner_id";

/// Search query text.
pub const QUERY: &str = "query";

/// Uploaded filename.
pub const FILENAME: &str = "filename";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of an uploaded file.
pub const SIZE_BYTES: &str = "size_bytes";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Extraction fields ─────────────────────────────────────────────────────

/// Extraction method that produced (or failed to produce) text.
pub const METHOD: &str = "method";

/// Declared MIME type of an upload.
pub const MIME_TYPE: &str = "mime_type";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Where an embedding came from ("remote", "fallback").
pub const EMBEDDING_SOURCE: &str = "embedding_source";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

/// Every field name above, for log-pipeline schema checks.
pub const ALL_FIELDS: &[&str] = &[
    REQUEST_ID,
    SUBSYSTEM,
    COMPONENT,
    OPERATION,
    ITEM_ID,
    DOCUMENT_ID,
    OWNER_ID,
    QUERY,
    FILENAME,
    DURATION_MS,
    RESULT_COUNT,
    SIZE_BYTES,
    PROMPT_LEN,
    ATTEMPT,
    METHOD,
    MIME_TYPE,
    MODEL,
    EMBEDDING_SOURCE,
    SUCCESS,
    ERROR_MSG,
    SLOW,
];
