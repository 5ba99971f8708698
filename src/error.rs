//! HTTP API error classification shared by the Discord and Notion clients.
//!
//! Both clients wrap failures in `anyhow`; the typed [`ApiError`] inside can
//! be recovered with `downcast_ref` to tell access failures (fatal for a
//! whole sync) from transient ones.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{service}: unauthorized (check the API token)")]
    Unauthorized { service: &'static str },

    #[error("{service}: forbidden: {body}")]
    Forbidden { service: &'static str, body: String },

    #[error("{service}: not found: {body}")]
    NotFound { service: &'static str, body: String },

    #[error("{service}: rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        service: &'static str,
        retry_after: Option<f64>,
    },

    #[error("{service}: HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service}: {message}")]
    Access {
        service: &'static str,
        message: String,
    },
}

impl ApiError {
    /// Classify a non-success response.
    pub fn from_status(
        service: &'static str,
        status: StatusCode,
        body: String,
        retry_after: Option<f64>,
    ) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { service },
            StatusCode::FORBIDDEN => ApiError::Forbidden { service, body },
            StatusCode::NOT_FOUND => ApiError::NotFound { service, body },
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                service,
                retry_after,
            },
            other => ApiError::Status {
                service,
                status: other.as_u16(),
                body,
            },
        }
    }

    /// True for failures that retrying the same request cannot fix.
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. } | ApiError::Access { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// True if any error in the chain is an access-class [`ApiError`].
pub fn is_access_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_access_denied)
}

/// True if any error in the chain is a transient [`ApiError`]: the next
/// sync is likely to succeed where this one failed.
pub fn is_transient_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_transient)
}

/// Turn a response into an error unless it succeeded.
pub async fn check_response(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok());
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(service, status, body, retry_after))
}
