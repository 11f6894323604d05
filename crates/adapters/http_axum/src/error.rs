//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hrmail_domain::error::{HrMailError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`HrMailError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(HrMailError);

impl From<HrMailError> for ApiError {
    fn from(err: HrMailError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HrMailError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            HrMailError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            HrMailError::Resolution(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            HrMailError::Render(err) | HrMailError::Transport(err) | HrMailError::Storage(err) => {
                tracing::error!(error = %err, kind = %self.0, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrmail_domain::error::{NotFoundError, ResolutionError};

    fn status(err: HrMailError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn should_map_error_kinds_to_status_codes() {
        assert_eq!(
            ApiError::from(ValidationError::EmptyTitle)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(
                NotFoundError {
                    entity: "AutomationRule",
                    id: "x".to_string(),
                }
                .into()
            ),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(ResolutionError::UnknownModel("a.B".to_string()).into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(HrMailError::Storage("locked".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
