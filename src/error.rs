//! Error taxonomy for gateway operations.
//!
//! Every failure crossing the gateway boundary is converted into an
//! [`ErrorInfo`]; callers never see transport-level error types.

use thiserror::Error;

/// Classification of a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Local or network fault before a response was received.
    ClientError,
    /// HTTP 401. The stored credential is invalidated when this is produced.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// Request timeout, either local (client timeout) or HTTP 408.
    Timeout,
    /// HTTP 429.
    RateLimit,
    /// HTTP 500 (and unrecognized 5xx).
    ServerError,
    /// HTTP 502.
    BadGateway,
    /// HTTP 503.
    ServiceUnavailable,
    /// HTTP 504.
    GatewayTimeout,
    /// Any other HTTP status.
    Http(u16),
    /// Failure that could not be classified.
    Unknown,
}

impl ErrorCode {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            408 => ErrorCode::Timeout,
            429 => ErrorCode::RateLimit,
            502 => ErrorCode::BadGateway,
            503 => ErrorCode::ServiceUnavailable,
            504 => ErrorCode::GatewayTimeout,
            500..=599 => ErrorCode::ServerError,
            other => ErrorCode::Http(other),
        }
    }

    /// Returns true if this failure class is worth retrying.
    ///
    /// Auth and not-found failures are permanent; network faults, timeouts,
    /// rate limiting and the 5xx family are transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::ClientError
                | ErrorCode::Timeout
                | ErrorCode::RateLimit
                | ErrorCode::ServerError
                | ErrorCode::BadGateway
                | ErrorCode::ServiceUnavailable
                | ErrorCode::GatewayTimeout
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::ClientError => write!(f, "CLIENT_ERROR"),
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::Forbidden => write!(f, "FORBIDDEN"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::Timeout => write!(f, "TIMEOUT"),
            ErrorCode::RateLimit => write!(f, "RATE_LIMIT"),
            ErrorCode::ServerError => write!(f, "SERVER_ERROR"),
            ErrorCode::BadGateway => write!(f, "BAD_GATEWAY"),
            ErrorCode::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            ErrorCode::GatewayTimeout => write!(f, "GATEWAY_TIMEOUT"),
            ErrorCode::Http(status) => write!(f, "HTTP_{}", status),
            ErrorCode::Unknown => write!(f, "UNKNOWN_ERROR"),
        }
    }
}

/// Structured error surfaced by every gateway operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ErrorInfo {
    pub message: String,
    pub code: ErrorCode,
    pub http_status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            http_status: None,
        }
    }

    /// Build an error from an HTTP response status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::from_status(status),
            http_status: Some(status),
        }
    }

    /// Build a client-side (pre-server) error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ClientError, message)
    }

    /// Build a local timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}
