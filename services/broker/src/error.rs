use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use realtime_voice_types::BrokerErrorBody;

/// Failures of the session route, rendered as `{ error, details? }` bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The provider answered but refused. `details` carries its response body.
    #[error("Failed to create realtime session.")]
    Upstream { details: String },
    #[error("Unexpected error while creating realtime session.")]
    Unexpected,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Upstream { details } => {
                BrokerErrorBody::new(&self.to_string()).with_details(details)
            }
            ApiError::Unexpected => BrokerErrorBody::new(&self.to_string()),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
