use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use freefood_types::api::{CreateUserRequest, UpdateUserRequest, UserList, UserResponse};

use crate::error::ApiError;
use crate::state::{AppState, blocking};
use crate::views::user_full;

type UserId = WithRejection<Path<i64>, ApiError>;

/// GET /api/users/
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserList>, ApiError> {
    let users = blocking(&state, |s| Ok(s.db.list_users()?)).await?;
    Ok(Json(UserList {
        users: users.into_iter().map(user_full).collect(),
    }))
}

/// GET /api/users/{id}/
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |s| Ok(s.db.get_user(id)?)).await?;
    Ok(Json(user_full(user)))
}

/// POST /api/users/: A missing name falls back to "anonymous".
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |s| Ok(s.db.create_user(req.name.as_deref())?)).await?;
    Ok((StatusCode::CREATED, Json(user_full(user))))
}

/// POST /api/users/{id}/: Overwrite the user's name.
pub async fn update_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserRequest>, ApiError>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |s| {
        let Some(name) = req.name else {
            // An unknown user takes precedence over the missing name.
            s.db.get_user(id)?;
            return Err(ApiError::bad_request());
        };
        Ok(s.db.update_user(id, &name)?)
    })
    .await?;
    Ok(Json(user_full(user)))
}

/// DELETE /api/users/{id}/: Removes the user and every post they own.
pub async fn delete_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): UserId,
) -> Result<Json<UserResponse>, ApiError> {
    let user = blocking(&state, move |s| Ok(s.db.delete_user(id)?)).await?;
    Ok(Json(user_full(user)))
}
