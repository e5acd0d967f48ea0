//! Tracing/logging setup shared by the console binaries.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use crate::tracing::LogFormat;
