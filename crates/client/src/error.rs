//! Client error types.

use marketlane_core::{OrderId, RefundError, SubmitError, UnknownStatusError};
use thiserror::Error;

/// Errors from a single call to the marketplace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-2xx response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status of a non-2xx response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Http(e) if e.is_timeout() => Self::Timeout,
            ApiError::Api { status, message } if status < 500 => {
                Self::Rejected { status, message }
            }
            other => Self::Network(other.to_string()),
        }
    }
}

/// The order detail could not be loaded from either endpoint.
#[derive(Debug, Error)]
pub enum OrderFetchError {
    /// Both response shapes failed; carries the last error's message.
    #[error("could not load order {order_id}: {message}")]
    Unavailable { order_id: OrderId, message: String },

    /// The order loaded but its status is not one this client knows.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatusError),
}

/// Why [`crate::submit_workflow`] did not end in a submitted request.
#[derive(Debug, Error)]
pub enum SubmitWorkflowError {
    /// Local validation failed; nothing was sent.
    #[error(transparent)]
    Invalid(#[from] RefundError),

    /// The request was sent and not created (`request_created()` is false).
    /// The workflow is now failed and can be retried.
    #[error(transparent)]
    Failed(SubmitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Api {
            status: 404,
            message: "order not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 - order not found");
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_submit_error_from_api_error() {
        let rejected = SubmitError::from(ApiError::Api {
            status: 422,
            message: "invalid account number".to_string(),
        });
        assert_eq!(
            rejected,
            SubmitError::Rejected {
                status: 422,
                message: "invalid account number".to_string()
            }
        );

        let server = SubmitError::from(ApiError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert!(matches!(server, SubmitError::Network(_)));
    }

    #[test]
    fn test_order_fetch_error_message() {
        let err = OrderFetchError::Unavailable {
            order_id: OrderId::new("1001"),
            message: "API error: 502 - bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not load order 1001: API error: 502 - bad gateway"
        );
    }
}
