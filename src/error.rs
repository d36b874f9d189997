//! Error taxonomy for the article pipeline.
//!
//! Soft failures (a single source fetch) are logged where they happen and
//! never reach the caller as a [`PipelineError`]; everything else propagates
//! with `?` up to the HTTP handler or CLI, which renders `{success:false, error}`.

use thiserror::Error;

/// Why the structured block in an oracle reply could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No valid JSON in response")]
    NoPayload,

    #[error("Malformed JSON payload: {0}")]
    Malformed(String),

    #[error("Reply is missing required field `{0}`")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Fetch failed for {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("No articles found from any source")]
    NoCandidates,

    #[error("{0}")]
    Configuration(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Store revision advanced since read (expected {expected:?})")]
    ConcurrentModification { expected: Option<String> },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for errors the store merger resolves by re-reading and retrying.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, PipelineError::ConcurrentModification { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_candidates_message() {
        assert_eq!(
            PipelineError::NoCandidates.to_string(),
            "No articles found from any source"
        );
    }

    #[test]
    fn test_parse_error_wraps_transparently() {
        let err: PipelineError = ParseError::NoPayload.into();
        assert_eq!(err.to_string(), "No valid JSON in response");
    }

    #[test]
    fn test_concurrent_modification_detection() {
        let err = PipelineError::ConcurrentModification {
            expected: Some("abc".into()),
        };
        assert!(err.is_concurrent_modification());
        assert!(!PipelineError::NoCandidates.is_concurrent_modification());
    }
}
