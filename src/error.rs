//! Typed errors for configuration and pagination.
//!
//! Everything else is carried as `anyhow::Error` with context attached at the
//! point of failure.

use crate::types::RecordKind;
use thiserror::Error;

/// Rejected run parameters. Always raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidFormat { value: String },

    #[error("invalid date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("time window {start} to {end} must span at least one day")]
    WindowTooShort { start: String, end: String },

    #[error("no repositories configured")]
    NoRepositories,

    #[error("MAX_GITHUB_API_PAGES must be at least 1")]
    InvalidPageLimit,
}

/// Protocol violations by a paginated source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("{kind} pagination for {repo} exceeded {max_pages} pages")]
    PageLimitExceeded {
        repo: String,
        kind: RecordKind,
        max_pages: u32,
    },

    #[error("{kind} page {page} for {repo} reported more pages without a cursor")]
    MissingCursor {
        repo: String,
        kind: RecordKind,
        page: u32,
    },
}

/// A record from the API that lacks a field the metrics depend on.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind} record is missing required field '{field}'")]
pub struct RecordError {
    pub kind: RecordKind,
    pub field: &'static str,
}
