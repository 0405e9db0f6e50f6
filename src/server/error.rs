use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ScanError;

/// Maps operation errors onto `{success: false, error}` responses.
#[derive(Debug)]
pub struct ApiError(pub ScanError);

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ScanError::InvalidDomain { .. } => StatusCode::BAD_REQUEST,
            ScanError::NotFound(_) => StatusCode::NOT_FOUND,
            ScanError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ScanError::StoreUnavailable(_)
            | ScanError::OrchestrationFailure { .. }
            | ScanError::DuplicateProbe(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ScanError::InvalidDomain {
                    domain: "x".into(),
                    reason: "too short".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ScanError::NotFound("abc".into()), StatusCode::NOT_FOUND),
            (
                ScanError::StoreUnavailable(StoreError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }
}
