//! Error responses shaped like the server's: `{"Error": "..."}`.
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub(crate) type HttpResult<T, E = HttpError> = core::result::Result<T, E>;

#[derive(Debug, Clone)]
pub(crate) struct HttpError {
    status: StatusCode,
    detail: String,
}

impl HttpError {
    pub fn new(status: StatusCode, detail: impl ToString) -> HttpError {
        Self {
            status,
            detail: detail.to_string(),
        }
    }

    pub fn not_found(what: &str) -> HttpError {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    pub fn bad_request(message: impl ToString) -> HttpError {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> HttpError {
        Self::new(StatusCode::UNAUTHORIZED, "Authentication required")
    }

    pub fn starting_up() -> HttpError {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Starting up")
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "Error": self.detail }))).into_response()
    }
}
