use std::time::Duration;
use uuid::Uuid;

use crate::defs::Source;

#[derive(Debug, thiserror::Error)]
#[error("failed to fetch source '{source_name}' ({source_id}): {kind}")]
pub struct SourceFetchError {
    pub source_id: Uuid,
    pub source_name: String,
    #[source]
    pub kind: FetchErrorKind,
}

impl SourceFetchError {
    pub fn new(source: &Source, kind: FetchErrorKind) -> Self {
        Self {
            source_id: source.id,
            source_name: source.name.clone(),
            kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("response exceeds limit: {size_mb}MB")]
    TooLarge { size_mb: usize },

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("adapter panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown source type: {0}")]
pub struct UnknownSourceType(pub String);
