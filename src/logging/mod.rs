//! Structured logging setup and the audit line format.

mod format;

pub use format::{AuditLine, StructuredLogger};
