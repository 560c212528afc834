use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use freefood_db::DbError;
use freefood_types::api::{FilterQuery, FilterResponse, PostList, PostRequest, PostResponse};
use freefood_types::parse_filter;

use crate::error::{ApiError, not_found_as};
use crate::state::{AppState, blocking};
use crate::views::{post_full, post_simple};

type PostId = WithRejection<Path<i64>, ApiError>;
type PostBody = WithRejection<Json<PostRequest>, ApiError>;

/// GET /api/posts/
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<PostList>, ApiError> {
    let posts = blocking(&state, |s| Ok(s.db.list_posts()?)).await?;
    Ok(Json(PostList {
        posts: posts.into_iter().map(post_full).collect(),
    }))
}

/// GET /api/posts/{id}/
pub async fn get_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PostId,
) -> Result<Json<PostResponse>, ApiError> {
    let post = blocking(&state, move |s| Ok(s.db.get_post(id)?))
        .await
        .map_err(not_found_as("Invalid ID"))?;
    Ok(Json(post_full(post)))
}

/// POST /api/posts/: Create a post and its tag set. An attached image is
/// uploaded first; if that fails the post is created without one.
pub async fn create_post(
    State(state): State<AppState>,
    WithRejection(Json(req), _): PostBody,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.validate()?;
    let image_data = req.image_data;

    let post = blocking(&state, move |s| {
        let asset = match image_data.as_deref() {
            Some(data) => {
                // Don't leave an orphaned object behind for an unknown user.
                s.db.get_user(new.user_id)?;
                s.uploader.upload(data)
            }
            None => None,
        };
        Ok(s.db.create_post(&new, asset.as_ref())?)
    })
    .await
    .map_err(not_found_as("User does not exist"))?;

    Ok((StatusCode::CREATED, Json(post_full(post))))
}

/// POST /api/posts/{id}/: Overwrite the post's fields and replace its tags.
pub async fn update_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PostId,
    WithRejection(Json(req), _): PostBody,
) -> Result<Json<PostResponse>, ApiError> {
    let new = req.validate()?;

    let post = blocking(&state, move |s| {
        s.db.update_post(id, &new, s.update_mapping).map_err(|e| match e {
            DbError::PostNotFound(_) => ApiError::NotFound("Invalid Post ID".into()),
            other => other.into(),
        })
    })
    .await?;
    Ok(Json(post_full(post)))
}

/// DELETE /api/posts/{id}/: Returns the post as it was before deletion.
pub async fn delete_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): PostId,
) -> Result<Json<PostResponse>, ApiError> {
    let post = blocking(&state, move |s| Ok(s.db.delete_post(id)?)).await?;
    Ok(Json(post_full(post)))
}

/// GET /api/posts/filter/?filter=vegan,nut_free
///
/// Each requested flag must be true; unknown names are ignored. The
/// response holds one list of posts per matching tag set.
pub async fn filter_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<FilterQuery>, ApiError>,
) -> Result<Json<FilterResponse>, ApiError> {
    let raw = query.filter.ok_or_else(ApiError::bad_request)?;
    let flags = parse_filter(&raw);
    info!(filter = %raw, "Filter request");

    let groups = blocking(&state, move |s| Ok(s.db.filter_posts(&flags)?)).await?;
    Ok(Json(FilterResponse {
        posts: groups
            .into_iter()
            .map(|group| group.into_iter().map(post_simple).collect())
            .collect(),
    }))
}
