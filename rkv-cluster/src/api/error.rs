//! API error types and ClusterError → HTTP status mapping.

use crate::error::{ClusterError, MembershipError};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// API error with HTTP status code and error code.
#[derive(Debug)]
pub struct ApiError {
    /// Error code (e.g., "E201").
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    pub status: StatusCode,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            status,
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::BAD_REQUEST)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::NOT_FOUND)
    }

    /// Create a 413 Payload Too Large error.
    pub fn payload_too_large(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create a 503 Service Unavailable error.
    pub fn service_unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Convert to HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "status": self.status.as_u16()
            }
        });

        Response::builder()
            .status(self.status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .expect("response builder should not fail")
    }
}

/// Every membership failure is reported as 500 with the error text.
impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        let code = match &err {
            MembershipError::NotLeader { .. } => "E201",
            MembershipError::AlreadyMember { .. } => "E202",
            MembershipError::AddressInUse { .. } => "E203",
            MembershipError::InvalidRequest(_) => "E204",
            MembershipError::Timeout { .. } => "E205",
            MembershipError::Rejected(_) => "E206",
        };
        Self::internal(code, err.to_string())
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        let message = err.to_string();

        match err {
            ClusterError::Membership(e) => e.into(),
            ClusterError::NotLeader { .. } => Self::service_unavailable("E301", message),
            ClusterError::Config(_) => Self::bad_request("E101", message),
            ClusterError::StateCorruption(_) => Self::internal("E401", message),
            ClusterError::Raft(_) => Self::service_unavailable("E302", message),
            _ => Self::internal("E500", message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
