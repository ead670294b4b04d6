//! Session surface for a single submission. Apart from the show page every
//! outcome is a redirect carrying a flash message.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use tracing::{info, instrument, warn};

use crate::catalog;
use crate::entity::{submission, user};
use crate::error::{AppError, ErrorBody};
use crate::fanout::EventKind;
use crate::flash::{Flash, FlashRedirect};
use crate::lifecycle::{self, LifecycleOutcome};
use crate::models::submission::{SubmissionPage, SubmissionView};
use crate::state::AppState;
use crate::store::{ReactionKind, Store, StoreError};
use crate::workload::{self, Viewer};

pub const LOGIN_REQUIRED: &str = "You have to be logged in to do that.";
pub const NO_SUCH_SUBMISSION: &str = "No such submission";

fn submission_path(key: &str) -> String {
    format!("/submissions/{key}")
}

fn login_required() -> FlashRedirect {
    FlashRedirect::with(Flash::notice(LOGIN_REQUIRED), "/")
}

fn no_such_submission() -> FlashRedirect {
    FlashRedirect::with(Flash::notice(NO_SUCH_SUBMISSION), "/")
}

/// Catalog name of the submission's exercise.
async fn exercise_name(
    store: &dyn Store,
    submission: &submission::Model,
) -> Result<String, StoreError> {
    let exercise = store.exercise(&submission.track, &submission.slug).await?;
    Ok(catalog::problem_name(exercise.as_ref(), &submission.slug))
}

#[utoipa::path(
    get,
    path = "/submissions/{key}",
    tag = "Submissions",
    operation_id = "showSubmission",
    summary = "Show a submission",
    description = "Returns the submission and, for signed-in viewers, the next submission of the same exercise to review. Viewing records the view and marks the viewer's notifications about it read. Unknown keys redirect home with an error flash.",
    params(("key" = String, Path, description = "Submission key")),
    responses(
        (status = 200, description = "Submission page", body = SubmissionPage),
        (status = 303, description = "Unknown submission"),
        (status = 500, description = "Internal error", body = ErrorBody),
    ),
)]
#[instrument(skip(state, viewer))]
pub async fn show(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let Some(submission) = store.submission_by_key(&key).await? else {
        let redirect = FlashRedirect::with(Flash::error("We can't find that submission."), "/");
        return Ok(redirect.into_response());
    };

    let next = workload::next_submission(store, &viewer, &submission).await?;
    let author = store
        .user_by_id(submission.user_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_default();
    let title = format!(
        "{} by {} in {}",
        exercise_name(store, &submission).await?,
        author,
        common::language::of(&submission.track)
    );

    Ok(Json(SubmissionPage {
        title,
        submission: submission.into(),
        next_submission: next.map(SubmissionView::from),
    })
    .into_response())
}

/// Per-viewer toggles on a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Unlike,
    Mute,
    Unmute,
}

impl Reaction {
    fn kind(self) -> ReactionKind {
        match self {
            Self::Like | Self::Unlike => ReactionKind::Like,
            Self::Mute | Self::Unmute => ReactionKind::Mute,
        }
    }

    fn on(self) -> bool {
        matches!(self, Self::Like | Self::Mute)
    }

    pub fn confirmation(self) -> &'static str {
        match self {
            Self::Like => "The submission has been liked.",
            Self::Unlike => "The submission has been unliked.",
            Self::Mute => {
                "The submission has been muted. It will reappear when there has been some activity."
            }
            Self::Unmute => "The submission has been unmuted.",
        }
    }
}

#[instrument(skip(state, viewer))]
async fn react(
    state: AppState,
    viewer: Viewer,
    key: String,
    reaction: Reaction,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };
    let Some(submission) = state.store.submission_by_key(&key).await? else {
        return Ok(FlashRedirect::with(Flash::notice("No such exercise found"), "/"));
    };

    state
        .store
        .set_reaction(submission.id, actor.id, reaction.kind(), reaction.on())
        .await?;

    if reaction == Reaction::Like {
        notify_like(&state, &submission, actor).await;
    }

    Ok(FlashRedirect::with(
        Flash::notice(reaction.confirmation()),
        submission_path(&key),
    ))
}

async fn notify_like(state: &AppState, submission: &submission::Model, actor: &user::Model) {
    if let Err(e) = state
        .fanout
        .notify(submission, EventKind::Like, actor)
        .await
    {
        warn!(submission_key = %submission.key, error = %e, "Like notification failed");
    }
}

pub async fn like(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    react(state, viewer, key, Reaction::Like).await
}

pub async fn unlike(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    react(state, viewer, key, Reaction::Unlike).await
}

pub async fn mute(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    react(state, viewer, key, Reaction::Mute).await
}

pub async fn unmute(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    react(state, viewer, key, Reaction::Unmute).await
}

/// Stale action links land back on the submission.
pub async fn legacy_redirect(Path(key): Path<String>) -> FlashRedirect {
    FlashRedirect::to(submission_path(&key))
}

#[instrument(skip(state, viewer))]
pub async fn done(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };

    let redirect = match lifecycle::complete(state.store.as_ref(), actor, &key).await? {
        LifecycleOutcome::Applied(done) => {
            let name = exercise_name(state.store.as_ref(), &done).await?;
            FlashRedirect::with(
                Flash::success(format!(
                    "{name} in {} will no longer appear in the nitpick lists.",
                    done.track
                )),
                "/",
            )
        }
        LifecycleOutcome::NotOwner => FlashRedirect::with(
            Flash::notice("Only the author may complete the exercise."),
            submission_path(&key),
        ),
        _ => no_such_submission(),
    };
    Ok(redirect)
}

#[instrument(skip(state, viewer))]
pub async fn reopen(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };

    let redirect = match lifecycle::reopen(state.store.as_ref(), actor, &key).await? {
        LifecycleOutcome::Applied(reopened) => FlashRedirect::to(submission_path(&reopened.key)),
        LifecycleOutcome::NotOwner => FlashRedirect::with(
            Flash::notice("Only the current author may reopen the exercise"),
            "/",
        ),
        _ => no_such_submission(),
    };
    Ok(redirect)
}

#[instrument(skip(state, viewer))]
pub async fn hibernate(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };

    let redirect = match lifecycle::hibernate(state.store.as_ref(), actor, &key).await? {
        LifecycleOutcome::Applied(hibernating) => {
            let name = exercise_name(state.store.as_ref(), &hibernating).await?;
            FlashRedirect::with(
                Flash::success(format!(
                    "{name} in {} is now hibernating.",
                    hibernating.track
                )),
                "/",
            )
        }
        LifecycleOutcome::NotOwner => FlashRedirect::with(
            Flash::notice("Only the author may hibernate this exercise."),
            submission_path(&key),
        ),
        _ => no_such_submission(),
    };
    Ok(redirect)
}

#[instrument(skip(state, viewer))]
pub async fn wakeup(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };

    let redirect = match lifecycle::wakeup(state.store.as_ref(), actor, &key).await? {
        LifecycleOutcome::Applied(head) => {
            let name = exercise_name(state.store.as_ref(), &head).await?;
            FlashRedirect::with(
                Flash::success(format!("{name} in {} is now active.", head.track)),
                "/",
            )
        }
        LifecycleOutcome::NotOwner => FlashRedirect::with(
            Flash::notice("Only the author may reactivate the exercise."),
            submission_path(&key),
        ),
        _ => no_such_submission(),
    };
    Ok(redirect)
}

#[instrument(skip(state, viewer))]
pub async fn delete(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> Result<FlashRedirect, AppError> {
    let Some(actor) = viewer.user() else {
        return Ok(login_required());
    };

    let redirect = match lifecycle::delete(state.store.as_ref(), actor, &key).await? {
        LifecycleOutcome::Deleted { next_head } => {
            info!(next_head = ?next_head.map(|h| h.version), "Chain head removed");
            FlashRedirect::to("/")
        }
        LifecycleOutcome::NotOwner => FlashRedirect::with(
            Flash::notice("Only the author may delete the exercise."),
            "/",
        ),
        LifecycleOutcome::NotHead => FlashRedirect::with(
            Flash::notice("Only the most recent iteration may be deleted."),
            submission_path(&key),
        ),
        _ => no_such_submission(),
    };
    Ok(redirect)
}
