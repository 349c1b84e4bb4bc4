use thiserror::Error;

/// Failure of a single suggestion lookup.
///
/// The scheduler decides what to do with each kind: transient failures are
/// retried with backoff, permanent ones fail the node immediately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transient failure fetching '{query}': {reason}")]
    Transient { query: String, reason: String },

    #[error("permanent failure fetching '{query}': {reason}")]
    Permanent { query: String, reason: String },
}

impl FetchError {
    pub fn transient(query: &str, reason: impl Into<String>) -> Self {
        FetchError::Transient {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    pub fn permanent(query: &str, reason: impl Into<String>) -> Self {
        FetchError::Permanent {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify a transport error. Timeouts, connection and body errors are
    /// worth retrying; a request that could not even be built or a body that
    /// could not be decoded will fail the same way next time.
    pub fn from_reqwest(query: &str, err: reqwest::Error) -> Self {
        if err.is_builder() || err.is_decode() {
            FetchError::permanent(query, err.to_string())
        } else {
            FetchError::transient(query, err.to_string())
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            FetchError::Transient { reason, .. } | FetchError::Permanent { reason, .. } => reason,
        }
    }
}

/// Errors raised while building a [`crate::SuggestionClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid pacing: {0}")]
    InvalidPacing(String),

    #[error("HTTP client construction failed: {0}")]
    Build(#[from] reqwest::Error),
}
