//! Picks what a reviewer should look at after the submission in front of them.

use tracing::instrument;

use crate::entity::{submission, user};
use crate::store::{Store, StoreError};

/// Whoever is making a request on the session surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Guest,
    User(user::Model),
}

impl Viewer {
    /// Guest-flagged accounts browse as guests.
    pub fn from_user(user: Option<user::Model>) -> Self {
        match user {
            Some(user) if !user.guest => Self::User(user),
            _ => Self::Guest,
        }
    }

    pub fn user(&self) -> Option<&user::Model> {
        match self {
            Self::User(user) => Some(user),
            Self::Guest => None,
        }
    }
}

/// First queue entry after `current_id`, wrapping around. Never `current_id`
/// itself. `queue` must be ordered by id ascending.
pub fn pick_next(queue: &[submission::Model], current_id: i32) -> Option<&submission::Model> {
    queue
        .iter()
        .find(|s| s.id > current_id)
        .or_else(|| queue.iter().find(|s| s.id != current_id))
}

/// Record the view, then choose the next submission of the same exercise
/// for `viewer` to review.
#[instrument(skip_all, fields(submission_key = %submission.key))]
pub async fn next_submission(
    store: &dyn Store,
    viewer: &Viewer,
    submission: &submission::Model,
) -> Result<Option<submission::Model>, StoreError> {
    let Some(user) = viewer.user() else {
        return Ok(None);
    };

    store.record_view(submission.id, user.id).await?;
    store.check_look(submission.user_exercise_id, user.id).await?;
    store
        .mark_notifications_read(submission.id, user.id)
        .await?;

    let queue = store
        .review_queue(user.id, &submission.track, &submission.slug)
        .await?;
    Ok(pick_next(&queue, submission.id).cloned())
}
