use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use tracing::{info, instrument};

use crate::attempt;
use crate::catalog;
use crate::entity::user;
use crate::error::{AppError, ErrorBody};
use crate::models::iteration::*;
use crate::state::AppState;
use crate::store::Store;

pub const BAD_API_KEY: &str = "Please double-check your exercism API key.";

/// Resolve a non-guest user from an API key.
async fn require_key(store: &dyn Store, key: Option<&str>) -> Result<user::Model, AppError> {
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return Err(AppError::Authentication(BAD_API_KEY.into()));
    };
    match store.user_by_key(key).await? {
        Some(user) if !user.guest => Ok(user),
        _ => Err(AppError::Authentication(BAD_API_KEY.into())),
    }
}

/// `{scheme}://{host}` of the current request.
fn base_url(headers: &HeaderMap, state: &AppState) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{}:{}",
                state.config.server.host, state.config.server.port
            )
        });
    format!("{scheme}://{host}")
}

#[utoipa::path(
    post,
    path = "/api/v1/iterations/{language}/{slug}/skip",
    tag = "Iterations",
    operation_id = "skipExercise",
    summary = "Skip an exercise",
    description = "Marks the exercise skipped for the key's owner, creating the progress record if needed.",
    params(
        ("language" = String, Path, description = "Track id"),
        ("slug" = String, Path, description = "Exercise slug"),
        KeyQuery,
    ),
    responses(
        (status = 204, description = "Exercise skipped"),
        (status = 401, description = "Missing, unknown or guest API key", body = ErrorBody),
        (status = 404, description = "Unknown exercise", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn skip(
    State(state): State<AppState>,
    Path((language, slug)): Path<(String, String)>,
    Query(query): Query<KeyQuery>,
) -> Result<StatusCode, AppError> {
    let user = require_key(state.store.as_ref(), query.key.as_deref()).await?;

    if !state.store.exercise_exists(&language, &slug).await? {
        return Err(AppError::NotFound(format!(
            "Exercise '{slug}' in language '{language}' doesn't exist. Maybe you misspelled it?"
        )));
    }

    state.store.skip_exercise(user.id, &language, &slug).await?;
    info!(user_id = user.id, "Exercise skipped");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/user/assignments",
    tag = "Iterations",
    operation_id = "submitIteration",
    summary = "Submit an iteration",
    description = "Accepts a new iteration from the command-line client. Older clients that send only `path` and `code` have the track and exercise read from the path.",
    request_body = AssignmentPayload,
    responses(
        (status = 201, description = "Iteration accepted", body = AttemptResponse),
        (status = 400, description = "Invalid payload, unknown problem or duplicate", body = ErrorBody),
        (status = 401, description = "Unknown API key", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload = attempt::parse_body(&body)?;
    let accepted =
        attempt::process(state.store.as_ref(), state.fanout.as_ref(), payload).await?;

    let submission = accepted.submission;
    let response = AttemptResponse {
        url: format!(
            "{}/submissions/{}",
            base_url(&headers, &state),
            submission.key
        ),
        language: common::language::of(&submission.track),
        name: catalog::problem_name(Some(&accepted.exercise), &submission.slug),
        id: submission.key,
        track_id: submission.track,
        slug: submission.slug,
        iteration: submission.version,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/iterations/latest",
    tag = "Iterations",
    operation_id = "latestIterations",
    summary = "Latest iteration of every exercise",
    description = "Returns the most recent submission of each exercise the key's owner has worked on, ordered by track then slug.",
    params(KeyQuery),
    responses(
        (status = 200, description = "Latest iterations", body = LatestIterationsResponse),
        (status = 401, description = "Missing, unknown or guest API key", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn latest(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<LatestIterationsResponse>, AppError> {
    let user = require_key(state.store.as_ref(), query.key.as_deref()).await?;

    let mut assignments = Vec::new();
    for exercise in state.store.user_exercises(user.id).await? {
        if let Some(head) = state
            .store
            .head(user.id, &exercise.track, &exercise.slug)
            .await?
        {
            assignments.push(LatestIteration::from(head));
        }
    }

    Ok(Json(LatestIterationsResponse { assignments }))
}
