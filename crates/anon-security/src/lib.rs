//! Term redaction for anonymized content

pub mod redactor;

pub use redactor::{MASK, RedactionInfo, Redactor};
