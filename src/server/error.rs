use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{Error, Kind};

pub(crate) fn status_for(kind: Kind) -> StatusCode {
    match kind {
        Kind::NotEnabled | Kind::MissingParameters | Kind::Validation => StatusCode::BAD_REQUEST,
        Kind::Unauthorized => StatusCode::UNAUTHORIZED,
        Kind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        Kind::NotFound => StatusCode::NOT_FOUND,
        Kind::RemoteRequestFailed => StatusCode::BAD_GATEWAY,
        Kind::InvalidMethod | Kind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Renders the error as a short plain-text body with the matching status.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());

        #[cfg(feature = "tracing")]
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "request failed");
        }

        (status, self.message()).into_response()
    }
}
