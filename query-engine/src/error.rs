//! FILENAME: query-engine/src/error.rs
//! Error taxonomy for the query pipeline.
//!
//! Enrichment-source failures never surface here: an unreachable panels
//! or safety-hub tab degrades the merge to unenriched records. Only the
//! layer primarily requested can fail a query.

use tabular::SourceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// The requested layer id is not registered.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// The layer is registered but no source was attached for it.
    #[error("no source attached for layer '{layer}'")]
    MissingSource { layer: String },

    /// The primary source for the request failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Record serialization failed while assembling the response.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl QueryError {
    /// Stable machine-readable code for response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::UnknownLayer(_) => "unknown_layer",
            QueryError::MissingSource { .. } => "missing_source",
            QueryError::Source(_) => "source_error",
            QueryError::Encoding(_) => "encoding_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(QueryError::UnknownLayer("x".into()).code(), "unknown_layer");
        let err = QueryError::MissingSource { layer: "main".into() };
        assert_eq!(err.code(), "missing_source");
        assert_eq!(err.to_string(), "no source attached for layer 'main'");
    }
}
