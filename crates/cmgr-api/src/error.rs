use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cmgr_core::error::Fault;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                kind: "bad_request".to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for each fault kind.
pub fn fault_status(fault: &Fault) -> StatusCode {
    match fault {
        Fault::ProfileNotFound { .. } => StatusCode::NOT_FOUND,
        Fault::ProfileNotStarted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Fault::ProfileUnreachable { .. } => StatusCode::BAD_GATEWAY,
        Fault::ProfileMalfunctioning { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        Fault::ProfileBusy { .. } => StatusCode::CONFLICT,
        Fault::Dependency { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Fault::VmManager { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        Fault::StartupTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Fault::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Fault::InvalidProfile { .. } => StatusCode::BAD_REQUEST,
    }
}

impl From<Fault> for ApiError {
    fn from(fault: Fault) -> Self {
        let status = fault_status(&fault);
        Self {
            status,
            body: ErrorResponse {
                error: fault.to_string(),
                kind: fault.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, kind = %self.body.kind, error = %self.body.error, "Request failed");
        } else {
            info!(status = %self.status, kind = %self.body.kind, error = %self.body.error, "Request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_status_mapping() {
        let p = || "dev".to_string();
        let cases = [
            (Fault::ProfileNotFound { profile: p() }, 404),
            (Fault::ProfileNotStarted { profile: p() }, 503),
            (
                Fault::ProfileUnreachable {
                    profile: p(),
                    reason: "x".to_string(),
                },
                502,
            ),
            (
                Fault::ProfileMalfunctioning {
                    profile: p(),
                    reason: "x".to_string(),
                },
                500,
            ),
            (Fault::ProfileBusy { profile: p() }, 409),
            (Fault::dependency("homebrew", "missing"), 503),
            (Fault::vm_manager("start", "dev", "boom"), 500),
            (
                Fault::StartupTimeout {
                    profile: p(),
                    waited_secs: 600,
                },
                504,
            ),
            (
                Fault::Cancelled {
                    operation: "start".to_string(),
                    profile: p(),
                },
                503,
            ),
            (
                Fault::InvalidProfile {
                    profile: "..".to_string(),
                    reason: "x".to_string(),
                },
                400,
            ),
        ];
        for (fault, code) in cases {
            assert_eq!(fault_status(&fault).as_u16(), code, "{fault:?}");
        }
    }

    #[test]
    fn test_error_body_from_fault() {
        let err = ApiError::from(Fault::ProfileBusy {
            profile: "dev".to_string(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.body.kind, "profile_busy");
        assert_eq!(
            err.body.error,
            "profile 'dev' is currently busy with another operation"
        );
    }
}
