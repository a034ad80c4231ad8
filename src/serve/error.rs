use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt::Debug;
use thiserror::Error;
use tracing::error;

use crate::DecodingError;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Unable to find user requested data")]
    NotFound,

    #[error("Users request/query was malformed: {0}")]
    MalformedRequest(String),

    #[error("indexer error: {0}")]
    Indexer(#[from] crate::error::Error),
}

impl ServeError {
    pub fn malformed_request(str: impl ToString) -> Self {
        ServeError::MalformedRequest(str.to_string())
    }

    pub fn internal(str: impl ToString) -> Self {
        ServeError::Internal(str.to_string())
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let (status, string) = match self {
            ServeError::NotFound => (
                StatusCode::NOT_FOUND,
                "unable to find requested data".to_string(),
            ),
            ServeError::MalformedRequest(e) => (
                StatusCode::BAD_REQUEST,
                format!("unable to parse request parameters: {e}"),
            ),
            _ => {
                error!("internal server error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": string
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(
            ServeError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServeError::malformed_request("bad address")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServeError::internal("boom").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
