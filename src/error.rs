use serde::{Deserialize, Serialize};

/// Why an anti-forgery token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("token is missing")]
    Missing,

    #[error("token is malformed")]
    Malformed,

    #[error("token does not match this action")]
    Mismatch,

    #[error("token has expired")]
    Expired,
}

/// Everything that can go wrong between a submitted query and a rendered result.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("security check failed: {0}")]
    Security(#[from] SecurityError),

    #[error("invalid query: {0}")]
    Validation(String),

    #[error("failed to reach search service")]
    Transport(#[source] reqwest::Error),

    #[error("search service returned status {status}")]
    Upstream { status: u16 },

    #[error("invalid response from search service")]
    MalformedResponse(#[source] serde_json::Error),

    /// The backend answered with an explicit `error` field.
    #[error("search service reported: {0}")]
    Domain(String),
}

/// Copyable tag for a [`SearchError`], used in response envelopes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Security,
    Validation,
    Transport,
    Upstream,
    MalformedResponse,
    Domain,
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Security(_) => ErrorKind::Security,
            SearchError::Validation(_) => ErrorKind::Validation,
            SearchError::Transport(_) => ErrorKind::Transport,
            SearchError::Upstream { .. } => ErrorKind::Upstream,
            SearchError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SearchError::Domain(_) => ErrorKind::Domain,
        }
    }

    /// The one message shown to the user in the results region.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::Security(_) => "Security check failed".to_string(),
            SearchError::Validation(_) => "Search term is required".to_string(),
            SearchError::Transport(_) => {
                "Failed to connect to search service. Please try again.".to_string()
            }
            SearchError::Upstream { status } => {
                format!("Search service returned error: {status}")
            }
            SearchError::MalformedResponse(_) => {
                "Invalid response from search service".to_string()
            }
            SearchError::Domain(message) => message.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WidgetError {
    #[error("result {index} has no image overlay")]
    NoSuchOverlay { index: usize },
}
