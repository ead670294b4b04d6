mod v1;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::submissions;
use crate::state::AppState;

/// Action suffixes of old submission links that only redirect back.
const LEGACY_ACTIONS: &[&str] = &["nitpick", "+like", "+unlike", "+mute", "+unmute"];

pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/v1", v1::routes())
}

/// Session surface: submission pages and the actions on them.
pub fn submission_routes() -> Router<AppState> {
    let mut router = Router::new()
        .route(
            "/submissions/{key}",
            get(submissions::show).delete(submissions::delete),
        )
        .route(
            "/submissions/{key}/like",
            post(submissions::like).get(submissions::legacy_redirect),
        )
        .route(
            "/submissions/{key}/unlike",
            post(submissions::unlike).get(submissions::legacy_redirect),
        )
        .route(
            "/submissions/{key}/mute",
            post(submissions::mute).get(submissions::legacy_redirect),
        )
        .route(
            "/submissions/{key}/unmute",
            post(submissions::unmute).get(submissions::legacy_redirect),
        )
        .route("/submissions/{key}/done", post(submissions::done))
        .route("/submissions/{key}/reopen", post(submissions::reopen))
        .route("/submissions/{key}/hibernate", post(submissions::hibernate))
        .route("/submissions/{key}/wakeup", post(submissions::wakeup));

    for action in LEGACY_ACTIONS {
        router = router.route(
            &format!("/submissions/{{key}}/{action}"),
            get(submissions::legacy_redirect),
        );
    }
    router
}
