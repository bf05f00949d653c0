//! Sitecheck: a correctness-testing crawler
//!
//! This crate crawls a web application or static site from a single seed URL,
//! fetching every same-origin page exactly once and recording protocol- and
//! document-level problems: bad encodings, malformed markup, broken redirects
//! and disallowed requests. It respects robots.txt and bounds the number of
//! requests generated from forms and query strings.

pub mod checker;
pub mod control;
pub mod fetch;
pub mod plugin;
pub mod referrer;
pub mod report;
pub mod request;
pub mod robots;
pub mod spider;

use thiserror::Error;

/// Errors turning a URL into a canonical [`request::Request`]
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Query of URL \"{url}\" contains invalid part \"{part}\"")]
    InvalidQuery { url: String, part: String },

    #[error("Failed to parse URL: {0}")]
    Parse(#[from] url::ParseError),
}

/// Errors constructing a merged control group from individual buttons
#[derive(Debug, Error)]
pub enum ControlGroupError {
    #[error("radio button name \"{other}\" differs from first radio button name \"{first}\"")]
    MixedNames { first: String, other: String },

    #[error("control group must contain at least one button")]
    Empty,
}

/// Errors resolving the text encoding of a document
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unable to determine document encoding")]
    NoViableEncoding,
}

/// Errors unescaping percent-encoded paths in robots.txt rules
#[derive(Debug, Error)]
pub enum EscapeError {
    #[error("incomplete escape, expected 2 characters after \"%\"")]
    IncompleteEscape,

    #[error("incorrect escape: expected 2 hex digits after \"%\", got \"{0}\"")]
    NonHexDigits(String),

    #[error("invalid percent-encoded UTF8: expected 0xC0..0xF7 for first byte, got 0x{0:02X}")]
    InvalidLeadByte(u8),

    #[error("invalid percent-encoded UTF8: expected 0x80..0xBF for non-first byte, got 0x{0:02X}")]
    InvalidContinuationByte(u8),

    #[error("incomplete escaped UTF8 character, expected {0} more escaped bytes")]
    TruncatedSequence(usize),
}

// Re-export commonly used types
pub use checker::{Accept, PageChecker};
pub use referrer::Referrer;
pub use report::{Checked, Report, Scribe};
pub use request::Request;
pub use spider::Spider;
