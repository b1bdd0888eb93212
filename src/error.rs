use thiserror::Error;

/// Failure of one call to the search capability. Messages are safe to log:
/// they never carry the request URL or credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("request failed with status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SearchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::RateLimited)
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SearchError::Timeout;
        }
        if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                return SearchError::RateLimited;
            }
            return SearchError::Status(status.as_u16());
        }
        if e.is_decode() {
            return SearchError::Malformed(e.without_url().to_string());
        }
        SearchError::Transport(e.without_url().to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}
