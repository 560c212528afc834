pub mod assets;
pub mod error;
pub mod posts;
pub mod state;
pub mod users;
pub mod views;

use axum::{Router, routing::get};

pub use state::{AppState, AppStateInner};

/// All API routes. Layers (tracing, CORS, body limits) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/posts/", get(posts::list_posts).post(posts::create_post))
        .route("/api/posts/filter/", get(posts::filter_posts))
        .route(
            "/api/posts/{id}/",
            get(posts::get_post)
                .post(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/users/", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}/",
            get(users::get_user)
                .post(users::update_user)
                .delete(users::delete_user),
        )
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
