//! Repository traits over the persistence engine.
//!
//! Every mutating method is one atomic unit against the store: the database
//! implementation wraps it in a transaction, the in-memory implementation holds
//! a single lock for its duration.

pub mod database;
pub mod memory;

use async_trait::async_trait;
use common::SubmissionState;
use sea_orm::DbErr;
use thiserror::Error;

use crate::entity::submission::Solution;
use crate::entity::{exercise, submission, user, user_exercise};

pub use database::DbStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),

    #[error("submission {0} is not the head of its chain")]
    NotHead(String),

    #[error("duplicate of previous iteration")]
    Duplicate,

    #[error("{0} not found")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

/// A validated iteration ready to be appended to its chain.
#[derive(Clone, Debug)]
pub struct NewIteration {
    pub user_id: i32,
    pub track: String,
    pub slug: String,
    pub code: Solution,
    pub comment: Option<String>,
}

/// Per-viewer flag on a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReactionKind {
    Like,
    Mute,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => crate::entity::reaction::LIKE,
            Self::Mute => crate::entity::reaction::MUTE,
        }
    }
}

/// Reference data: which exercises exist.
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    async fn exercise(&self, track: &str, slug: &str)
    -> Result<Option<exercise::Model>, StoreError>;

    async fn exercise_exists(&self, track: &str, slug: &str) -> Result<bool, StoreError> {
        Ok(self.exercise(track, slug).await?.is_some())
    }

    /// Add an exercise unless it is already known. Returns true if it was added.
    async fn register_exercise(
        &self,
        track: &str,
        slug: &str,
        name: &str,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait Accounts: Send + Sync {
    async fn user_by_key(&self, key: &str) -> Result<Option<user::Model>, StoreError>;
    async fn user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError>;
}

/// Ordered history of submissions per (user, track, slug).
#[async_trait]
pub trait VersionChain: Send + Sync {
    /// The latest version of the chain.
    async fn head(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError>;

    /// All versions, ascending.
    async fn chain(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError>;

    async fn submission_by_key(&self, key: &str) -> Result<Option<submission::Model>, StoreError>;

    /// Append a new pending head. The previous head becomes superseded and the
    /// aggregate's `iteration_count` is set to the new version.
    ///
    /// Fails with [`StoreError::Duplicate`] when the code repeats the head; the
    /// comparison happens under the same lock that assigns the version.
    async fn append(&self, iteration: NewIteration) -> Result<submission::Model, StoreError>;

    /// Remove the head of a chain and return the new head.
    ///
    /// Fails with [`StoreError::NotHead`] for any other version. When the removed
    /// head was pending, its prior becomes pending again.
    async fn remove_head(
        &self,
        submission_id: i32,
    ) -> Result<Option<submission::Model>, StoreError>;
}

/// The per-(user, exercise) aggregate and state transitions that feed it.
#[async_trait]
pub trait Progress: Send + Sync {
    async fn user_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError>;

    /// All aggregates of a user, ordered by track then slug.
    async fn user_exercises(&self, user_id: i32) -> Result<Vec<user_exercise::Model>, StoreError>;

    /// Find or create the aggregate and stamp `skipped_at`.
    async fn skip_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<user_exercise::Model, StoreError>;

    /// Set a submission's state. `done` stamps `done_at`; every other state clears it.
    async fn set_state(
        &self,
        submission_id: i32,
        state: SubmissionState,
    ) -> Result<submission::Model, StoreError>;

    async fn find_done(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError>;

    /// Recompute the aggregate from the chain's current shape. Idempotent.
    async fn reconcile(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError>;

    async fn record_lifecycle_event(&self, user_id: i32, key: &str) -> Result<(), StoreError>;
}

/// Viewer-scoped bookkeeping around reviewing.
#[async_trait]
pub trait Reviews: Send + Sync {
    async fn set_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
        on: bool,
    ) -> Result<(), StoreError>;

    async fn has_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
    ) -> Result<bool, StoreError>;

    async fn record_view(&self, submission_id: i32, user_id: i32) -> Result<(), StoreError>;

    /// Upsert the presence marker of `user_id` on an exercise.
    async fn check_look(&self, user_exercise_id: i32, user_id: i32) -> Result<(), StoreError>;

    /// Mark the viewer's notifications about a submission read. Returns how many changed.
    async fn mark_notifications_read(
        &self,
        submission_id: i32,
        user_id: i32,
    ) -> Result<u64, StoreError>;

    /// Pending submissions of an exercise that `viewer_id` could review, oldest first.
    /// Excludes the viewer's own and those the viewer muted.
    async fn review_queue(
        &self,
        viewer_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError>;
}

/// Records written on behalf of the event fan-out.
#[async_trait]
pub trait Social: Send + Sync {
    async fn grant_access(&self, user_id: i32, track: &str, slug: &str) -> Result<(), StoreError>;

    async fn subscribe(&self, user_id: i32, user_exercise_id: i32) -> Result<(), StoreError>;

    async fn subscribers(&self, user_exercise_id: i32) -> Result<Vec<i32>, StoreError>;

    async fn add_notification(
        &self,
        user_id: i32,
        submission_id: i32,
        regarding: &str,
        actor_id: i32,
    ) -> Result<(), StoreError>;
}

/// Everything the pipeline needs from persistence.
pub trait Store: ExerciseCatalog + Accounts + VersionChain + Progress + Reviews + Social {}

impl<T> Store for T where T: ExerciseCatalog + Accounts + VersionChain + Progress + Reviews + Social {}

/// Fresh opaque submission key.
pub(crate) fn new_submission_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
