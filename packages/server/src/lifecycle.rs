//! Owner-gated state transitions of an existing submission.
//!
//! Refusals are outcomes, not errors: a non-owner or an unknown key leaves the
//! store untouched and the caller decides how to tell the user. Every applied
//! transition ends by reconciling the exercise aggregate.

use common::SubmissionState;
use tracing::{info, instrument};

use crate::entity::{submission, user};
use crate::store::{Store, StoreError};

pub const COMPLETED_EVENT: &str = "completed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition ran; carries the submission it changed.
    Applied(submission::Model),
    /// The head was removed; carries the new head, if any.
    Deleted {
        next_head: Option<submission::Model>,
    },
    NotOwner,
    NotFound,
    /// Only the head of a chain may be deleted.
    NotHead,
}

async fn owned(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<Result<submission::Model, LifecycleOutcome>, StoreError> {
    let Some(submission) = store.submission_by_key(key).await? else {
        return Ok(Err(LifecycleOutcome::NotFound));
    };
    if !submission.is_owned_by(actor.id) {
        return Ok(Err(LifecycleOutcome::NotOwner));
    }
    Ok(Ok(submission))
}

async fn reconcile(store: &dyn Store, submission: &submission::Model) -> Result<(), StoreError> {
    store
        .reconcile(submission.user_id, &submission.track, &submission.slug)
        .await?;
    Ok(())
}

/// Mark the head of the submission's chain done.
#[instrument(skip(store, actor), fields(actor_id = actor.id))]
pub async fn complete(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<LifecycleOutcome, StoreError> {
    let submission = match owned(store, actor, key).await? {
        Ok(s) => s,
        Err(outcome) => return Ok(outcome),
    };
    let Some(head) = store
        .head(submission.user_id, &submission.track, &submission.slug)
        .await?
    else {
        return Ok(LifecycleOutcome::NotFound);
    };

    let done = store.set_state(head.id, SubmissionState::Done).await?;
    store
        .record_lifecycle_event(actor.id, COMPLETED_EVENT)
        .await?;
    reconcile(store, &done).await?;

    info!(key = %done.key, "Exercise completed");
    Ok(LifecycleOutcome::Applied(done))
}

/// Put the done submission of the exercise back into review.
#[instrument(skip(store, actor), fields(actor_id = actor.id))]
pub async fn reopen(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<LifecycleOutcome, StoreError> {
    let submission = match owned(store, actor, key).await? {
        Ok(s) => s,
        Err(outcome) => return Ok(outcome),
    };
    let Some(done) = store
        .find_done(submission.user_id, &submission.track, &submission.slug)
        .await?
    else {
        return Ok(LifecycleOutcome::NotFound);
    };

    let reopened = store.set_state(done.id, SubmissionState::Pending).await?;
    reconcile(store, &reopened).await?;

    info!(key = %reopened.key, "Exercise reopened");
    Ok(LifecycleOutcome::Applied(reopened))
}

/// Pause the exercise. Acts on the last submission of the chain, whichever
/// version `key` names.
#[instrument(skip(store, actor), fields(actor_id = actor.id))]
pub async fn hibernate(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<LifecycleOutcome, StoreError> {
    let Some(submission) = store.submission_by_key(key).await? else {
        return Ok(LifecycleOutcome::NotFound);
    };
    let Some(last) = store
        .chain(submission.user_id, &submission.track, &submission.slug)
        .await?
        .pop()
    else {
        return Ok(LifecycleOutcome::NotFound);
    };
    if !last.is_owned_by(actor.id) {
        return Ok(LifecycleOutcome::NotOwner);
    }

    let hibernating = store
        .set_state(last.id, SubmissionState::Hibernating)
        .await?;
    reconcile(store, &hibernating).await?;

    info!(key = %hibernating.key, "Exercise hibernating");
    Ok(LifecycleOutcome::Applied(hibernating))
}

/// Put the head of the chain back into the review queue, whatever its state.
#[instrument(skip(store, actor), fields(actor_id = actor.id))]
pub async fn wakeup(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<LifecycleOutcome, StoreError> {
    let submission = match owned(store, actor, key).await? {
        Ok(s) => s,
        Err(outcome) => return Ok(outcome),
    };
    let Some(head) = store
        .head(submission.user_id, &submission.track, &submission.slug)
        .await?
    else {
        return Ok(LifecycleOutcome::NotFound);
    };

    // A superseded head remains after deleting a done head; it wakes up too.
    let head = if head.state == SubmissionState::Pending {
        head
    } else {
        store.set_state(head.id, SubmissionState::Pending).await?
    };
    reconcile(store, &head).await?;

    info!(key = %head.key, "Exercise active");
    Ok(LifecycleOutcome::Applied(head))
}

/// Remove the head of the chain, restoring its prior when it was pending.
#[instrument(skip(store, actor), fields(actor_id = actor.id))]
pub async fn delete(
    store: &dyn Store,
    actor: &user::Model,
    key: &str,
) -> Result<LifecycleOutcome, StoreError> {
    let submission = match owned(store, actor, key).await? {
        Ok(s) => s,
        Err(outcome) => return Ok(outcome),
    };

    let next_head = match store.remove_head(submission.id).await {
        Ok(next_head) => next_head,
        Err(StoreError::NotHead(_)) => return Ok(LifecycleOutcome::NotHead),
        Err(e) => return Err(e),
    };
    reconcile(store, &submission).await?;

    info!(key = %submission.key, version = submission.version, "Submission deleted");
    Ok(LifecycleOutcome::Deleted { next_head })
}
