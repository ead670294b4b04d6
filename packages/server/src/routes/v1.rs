use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/iterations", iteration_routes())
        .route("/user/assignments", post(handlers::iterations::submit))
}

fn iteration_routes() -> Router<AppState> {
    Router::new()
        .route("/latest", get(handlers::iterations::latest))
        .route(
            "/{language}/{slug}/skip",
            post(handlers::iterations::skip),
        )
}
