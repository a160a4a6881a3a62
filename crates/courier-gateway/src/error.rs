// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from `CourierError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use courier_core::CourierError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<CourierError> for ApiError {
    fn from(e: CourierError) -> Self {
        let status = match &e {
            CourierError::Validation(_) => StatusCode::BAD_REQUEST,
            CourierError::NotFound(_) => StatusCode::NOT_FOUND,
            CourierError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CourierError::SessionNotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CourierError::Transport { .. } | CourierError::Timeout { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "request failed");
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        let cases = [
            (CourierError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CourierError::NotFound("job".into()), StatusCode::NOT_FOUND),
            (
                CourierError::SessionNotReady {
                    tenant_id: "u1".into(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (CourierError::transport("rejected"), StatusCode::BAD_GATEWAY),
            (
                CourierError::Timeout {
                    duration: Duration::from_secs(30),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                CourierError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }
}
