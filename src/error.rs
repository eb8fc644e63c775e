use reqwest::StatusCode;
use thiserror::Error;

/// Failure classes for the remote Motion and Slack APIs. The retry loop
/// needs to tell transient transport problems apart from rate limiting and
/// from hard application-level rejections.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(StatusCode),

    #[error("rate limited by remote service")]
    Throttled { retry_after: Option<u64> },

    #[error("Slack API error: {0}")]
    Api(String),
}

impl ApiError {
    /// Whether a retry has any chance of succeeding. Network failures and
    /// 5xx responses qualify; rate limiting is handled separately and
    /// application-level rejections never do.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status(status) => status.is_server_error(),
            ApiError::Throttled { .. } | ApiError::Api(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_transient());
        assert!(ApiError::Status(StatusCode::BAD_GATEWAY).is_transient());
        assert!(!ApiError::Status(StatusCode::NOT_FOUND).is_transient());
        assert!(!ApiError::Status(StatusCode::UNAUTHORIZED).is_transient());
        assert!(!ApiError::Throttled { retry_after: None }.is_transient());
        assert!(!ApiError::Api("channel_not_found".to_string()).is_transient());
    }
}
