use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use freefood_db::DbError;
use freefood_types::api::{ErrorBody, MissingField};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request() -> Self {
        Self::BadRequest("Bad request".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserNotFound(_) => ApiError::NotFound("User not found".into()),
            DbError::PostNotFound(_) => ApiError::NotFound("Post not found".into()),
            other => {
                error!("Database error: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<MissingField> for ApiError {
    fn from(e: MissingField) -> Self {
        warn!("Rejected request: {}", e);
        ApiError::bad_request()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", e.body_text());
        ApiError::bad_request()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        warn!("Rejected query string: {}", e.body_text());
        ApiError::bad_request()
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        warn!("Rejected path parameter: {}", e.body_text());
        ApiError::bad_request()
    }
}

/// Replace the default not-found message with one specific to a route.
pub(crate) fn not_found_as(message: &'static str) -> impl FnOnce(ApiError) -> ApiError {
    move |e| match e {
        ApiError::NotFound(_) => ApiError::NotFound(message.into()),
        other => other,
    }
}
