//! # mande-core
//!
//! Core types, traits, and abstractions for the mande knowledge pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other mande crates depend on.

pub mod cancel;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use cancel::{CancelHandle, CancelOnDrop, CancellationSignal};
pub use error::{Error, Result};
pub use file_safety::{
    is_printable, printable_ratio, resolve_format, sanitize_filename, validate_upload,
};
pub use models::*;
pub use traits::*;
