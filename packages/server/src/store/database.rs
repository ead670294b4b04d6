use async_trait::async_trait;
use chrono::Utc;
use common::{ExerciseState, SubmissionState};
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, instrument};

use super::{
    Accounts, ExerciseCatalog, NewIteration, Progress, ReactionKind, Reviews, Social, StoreError,
    VersionChain, new_submission_key,
};
use crate::chain;
use crate::entity::{
    acl, conversation_subscription, exercise, lifecycle_event, look, notification, reaction,
    submission, submission_view, user, user_exercise,
};

/// Postgres-backed store.
#[derive(Clone)]
pub struct DbStore {
    db: DatabaseConnection,
}

impl DbStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Insert the aggregate row if missing. Relies on the unique
/// (user_id, track, slug) index created by `seed::ensure_indexes`.
async fn ensure_user_exercise<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    track: &str,
    slug: &str,
) -> Result<(), DbErr> {
    let model = user_exercise::ActiveModel {
        user_id: Set(user_id),
        track: Set(track.to_string()),
        slug: Set(slug.to_string()),
        iteration_count: Set(0),
        state: Set(ExerciseState::Unstarted),
        skipped_at: Set(None),
        last_iteration_at: Set(None),
        completed_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let result = user_exercise::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([
                user_exercise::Column::UserId,
                user_exercise::Column::Track,
                user_exercise::Column::Slug,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await;

    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Lock and return the aggregate row for the rest of the transaction.
async fn lock_user_exercise<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    track: &str,
    slug: &str,
) -> Result<user_exercise::Model, StoreError> {
    user_exercise::Entity::find()
        .filter(user_exercise::Column::UserId.eq(user_id))
        .filter(user_exercise::Column::Track.eq(track))
        .filter(user_exercise::Column::Slug.eq(slug))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("exercise {track}/{slug} of user {user_id}")))
}

async fn find_head<C: ConnectionTrait>(
    conn: &C,
    user_exercise_id: i32,
) -> Result<Option<submission::Model>, DbErr> {
    submission::Entity::find()
        .filter(submission::Column::UserExerciseId.eq(user_exercise_id))
        .order_by_desc(submission::Column::Version)
        .one(conn)
        .await
}

async fn find_user_exercise<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    track: &str,
    slug: &str,
) -> Result<Option<user_exercise::Model>, DbErr> {
    user_exercise::Entity::find()
        .filter(user_exercise::Column::UserId.eq(user_id))
        .filter(user_exercise::Column::Track.eq(track))
        .filter(user_exercise::Column::Slug.eq(slug))
        .one(conn)
        .await
}

#[async_trait]
impl ExerciseCatalog for DbStore {
    async fn exercise(
        &self,
        track: &str,
        slug: &str,
    ) -> Result<Option<exercise::Model>, StoreError> {
        Ok(exercise::Entity::find()
            .filter(exercise::Column::Track.eq(track))
            .filter(exercise::Column::Slug.eq(slug))
            .one(&self.db)
            .await?)
    }

    async fn register_exercise(
        &self,
        track: &str,
        slug: &str,
        name: &str,
    ) -> Result<bool, StoreError> {
        let model = exercise::ActiveModel {
            track: Set(track.to_string()),
            slug: Set(slug.to_string()),
            name: Set(name.to_string()),
            ..Default::default()
        };

        let result = exercise::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([exercise::Column::Track, exercise::Column::Slug])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Accounts for DbStore {
    async fn user_by_key(&self, key: &str) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::Key.eq(key))
            .one(&self.db)
            .await?)
    }

    async fn user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }
}

#[async_trait]
impl VersionChain for DbStore {
    async fn head(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError> {
        Ok(submission::Entity::find()
            .filter(submission::Column::UserId.eq(user_id))
            .filter(submission::Column::Track.eq(track))
            .filter(submission::Column::Slug.eq(slug))
            .order_by_desc(submission::Column::Version)
            .one(&self.db)
            .await?)
    }

    async fn chain(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError> {
        Ok(submission::Entity::find()
            .filter(submission::Column::UserId.eq(user_id))
            .filter(submission::Column::Track.eq(track))
            .filter(submission::Column::Slug.eq(slug))
            .order_by_asc(submission::Column::Version)
            .all(&self.db)
            .await?)
    }

    async fn submission_by_key(&self, key: &str) -> Result<Option<submission::Model>, StoreError> {
        Ok(submission::Entity::find()
            .filter(submission::Column::Key.eq(key))
            .one(&self.db)
            .await?)
    }

    #[instrument(skip(self, iteration), fields(user_id = iteration.user_id, track = %iteration.track, slug = %iteration.slug))]
    async fn append(&self, iteration: NewIteration) -> Result<submission::Model, StoreError> {
        let code = serde_json::to_value(&iteration.code)?;
        let now = Utc::now();

        let txn = self.db.begin().await?;

        ensure_user_exercise(&txn, iteration.user_id, &iteration.track, &iteration.slug).await?;
        // Serialises concurrent appends to the same chain.
        let exercise =
            lock_user_exercise(&txn, iteration.user_id, &iteration.track, &iteration.slug).await?;

        let head = find_head(&txn, exercise.id).await?;
        if chain::duplicate(head.as_ref(), &iteration.code) {
            return Err(StoreError::Duplicate);
        }
        let version = head.as_ref().map_or(0, |h| h.version) + 1;

        if let Some(ref head) = head
            && head.state != SubmissionState::Superseded
        {
            submission::ActiveModel {
                id: Set(head.id),
                state: Set(SubmissionState::Superseded),
                ..Default::default()
            }
            .update(&txn)
            .await?;
        }

        let model = submission::ActiveModel {
            key: Set(new_submission_key()),
            user_id: Set(iteration.user_id),
            user_exercise_id: Set(exercise.id),
            track: Set(iteration.track),
            slug: Set(iteration.slug),
            code: Set(code),
            comment: Set(iteration.comment),
            version: Set(version),
            state: Set(SubmissionState::Pending),
            prior_id: Set(head.as_ref().map(|h| h.id)),
            created_at: Set(now),
            done_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        user_exercise::ActiveModel {
            id: Set(exercise.id),
            iteration_count: Set(version),
            state: Set(ExerciseState::Active),
            last_iteration_at: Set(Some(now)),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        txn.commit().await?;

        debug!(version, key = %model.key, "Appended submission");
        Ok(model)
    }

    #[instrument(skip(self))]
    async fn remove_head(
        &self,
        submission_id: i32,
    ) -> Result<Option<submission::Model>, StoreError> {
        let txn = self.db.begin().await?;

        let target = submission::Entity::find_by_id(submission_id)
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("submission {submission_id}")))?;

        let exercise = user_exercise::Entity::find_by_id(target.user_exercise_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                StoreError::NotFound(format!("user exercise {}", target.user_exercise_id))
            })?;

        let head = find_head(&txn, exercise.id).await?;
        if head.map(|h| h.id) != Some(target.id) {
            return Err(StoreError::NotHead(target.key));
        }

        reaction::Entity::delete_many()
            .filter(reaction::Column::SubmissionId.eq(target.id))
            .exec(&txn)
            .await?;
        submission_view::Entity::delete_many()
            .filter(submission_view::Column::SubmissionId.eq(target.id))
            .exec(&txn)
            .await?;
        notification::Entity::delete_many()
            .filter(notification::Column::SubmissionId.eq(target.id))
            .exec(&txn)
            .await?;
        submission::Entity::delete_by_id(target.id).exec(&txn).await?;

        let prior = match target.prior_id {
            Some(prior_id) => submission::Entity::find_by_id(prior_id).one(&txn).await?,
            None => None,
        };

        let prior = match prior {
            Some(prior) if target.state == SubmissionState::Pending => Some(
                submission::ActiveModel {
                    id: Set(prior.id),
                    state: Set(SubmissionState::Pending),
                    done_at: Set(None),
                    ..Default::default()
                }
                .update(&txn)
                .await?,
            ),
            other => other,
        };

        user_exercise::ActiveModel {
            id: Set(exercise.id),
            iteration_count: Set(prior.as_ref().map_or(0, |p| p.version)),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        txn.commit().await?;

        debug!(key = %target.key, version = target.version, "Removed chain head");
        Ok(prior)
    }
}

#[async_trait]
impl Progress for DbStore {
    async fn user_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError> {
        Ok(find_user_exercise(&self.db, user_id, track, slug).await?)
    }

    async fn user_exercises(&self, user_id: i32) -> Result<Vec<user_exercise::Model>, StoreError> {
        Ok(user_exercise::Entity::find()
            .filter(user_exercise::Column::UserId.eq(user_id))
            .order_by_asc(user_exercise::Column::Track)
            .order_by_asc(user_exercise::Column::Slug)
            .all(&self.db)
            .await?)
    }

    async fn skip_exercise(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<user_exercise::Model, StoreError> {
        let txn = self.db.begin().await?;
        ensure_user_exercise(&txn, user_id, track, slug).await?;
        let exercise = lock_user_exercise(&txn, user_id, track, slug).await?;

        let updated = user_exercise::ActiveModel {
            id: Set(exercise.id),
            skipped_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        txn.commit().await?;
        Ok(updated)
    }

    async fn set_state(
        &self,
        submission_id: i32,
        state: SubmissionState,
    ) -> Result<submission::Model, StoreError> {
        let done_at = (state == SubmissionState::Done).then(Utc::now);
        let result = submission::ActiveModel {
            id: Set(submission_id),
            state: Set(state),
            done_at: Set(done_at),
            ..Default::default()
        }
        .update(&self.db)
        .await;

        match result {
            Ok(model) => Ok(model),
            Err(DbErr::RecordNotUpdated) => {
                Err(StoreError::NotFound(format!("submission {submission_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_done(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<submission::Model>, StoreError> {
        Ok(submission::Entity::find()
            .filter(submission::Column::UserId.eq(user_id))
            .filter(submission::Column::Track.eq(track))
            .filter(submission::Column::Slug.eq(slug))
            .filter(submission::Column::State.eq(SubmissionState::Done))
            .order_by_desc(submission::Column::Version)
            .one(&self.db)
            .await?)
    }

    async fn reconcile(
        &self,
        user_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Option<user_exercise::Model>, StoreError> {
        let txn = self.db.begin().await?;
        let Some(exercise) = find_user_exercise(&txn, user_id, track, slug).await? else {
            return Ok(None);
        };
        let head = find_head(&txn, exercise.id).await?;

        let updated = user_exercise::ActiveModel {
            id: Set(exercise.id),
            iteration_count: Set(head.as_ref().map_or(0, |h| h.version)),
            state: Set(ExerciseState::from_head(head.as_ref().map(|h| h.state))),
            last_iteration_at: Set(head.as_ref().map(|h| h.created_at)),
            completed_at: Set(head.as_ref().and_then(|h| h.done_at)),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        txn.commit().await?;
        Ok(Some(updated))
    }

    async fn record_lifecycle_event(&self, user_id: i32, key: &str) -> Result<(), StoreError> {
        lifecycle_event::ActiveModel {
            user_id: Set(user_id),
            key: Set(key.to_string()),
            happened_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Reviews for DbStore {
    async fn set_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
        on: bool,
    ) -> Result<(), StoreError> {
        if !on {
            reaction::Entity::delete_many()
                .filter(reaction::Column::SubmissionId.eq(submission_id))
                .filter(reaction::Column::UserId.eq(user_id))
                .filter(reaction::Column::Kind.eq(kind.as_str()))
                .exec(&self.db)
                .await?;
            return Ok(());
        }

        let model = reaction::ActiveModel {
            submission_id: Set(submission_id),
            user_id: Set(user_id),
            kind: Set(kind.as_str().to_string()),
            created_at: Set(Utc::now()),
        };
        let result = reaction::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    reaction::Column::SubmissionId,
                    reaction::Column::UserId,
                    reaction::Column::Kind,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_reaction(
        &self,
        submission_id: i32,
        user_id: i32,
        kind: ReactionKind,
    ) -> Result<bool, StoreError> {
        Ok(reaction::Entity::find()
            .filter(reaction::Column::SubmissionId.eq(submission_id))
            .filter(reaction::Column::UserId.eq(user_id))
            .filter(reaction::Column::Kind.eq(kind.as_str()))
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn record_view(&self, submission_id: i32, user_id: i32) -> Result<(), StoreError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let existing = submission_view::Entity::find()
            .filter(submission_view::Column::SubmissionId.eq(submission_id))
            .filter(submission_view::Column::UserId.eq(user_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        match existing {
            Some(view) => {
                submission_view::ActiveModel {
                    submission_id: Set(view.submission_id),
                    user_id: Set(view.user_id),
                    count: Set(view.count + 1),
                    last_viewed_at: Set(now),
                }
                .update(&txn)
                .await?;
            }
            None => {
                submission_view::ActiveModel {
                    submission_id: Set(submission_id),
                    user_id: Set(user_id),
                    count: Set(1),
                    last_viewed_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn check_look(&self, user_exercise_id: i32, user_id: i32) -> Result<(), StoreError> {
        let now = Utc::now();
        let existing = look::Entity::find_by_id((user_exercise_id, user_id))
            .one(&self.db)
            .await?;

        if existing.is_some() {
            look::ActiveModel {
                user_exercise_id: Set(user_exercise_id),
                user_id: Set(user_id),
                looked_at: Set(now),
            }
            .update(&self.db)
            .await?;
            return Ok(());
        }

        let result = look::Entity::insert(look::ActiveModel {
            user_exercise_id: Set(user_exercise_id),
            user_id: Set(user_id),
            looked_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([look::Column::UserExerciseId, look::Column::UserId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_notifications_read(
        &self,
        submission_id: i32,
        user_id: i32,
    ) -> Result<u64, StoreError> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::Read, Expr::value(true))
            .filter(notification::Column::SubmissionId.eq(submission_id))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn review_queue(
        &self,
        viewer_id: i32,
        track: &str,
        slug: &str,
    ) -> Result<Vec<submission::Model>, StoreError> {
        let muted: Vec<i32> = reaction::Entity::find()
            .filter(reaction::Column::UserId.eq(viewer_id))
            .filter(reaction::Column::Kind.eq(reaction::MUTE))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| r.submission_id)
            .collect();

        let mut query = submission::Entity::find()
            .filter(submission::Column::Track.eq(track))
            .filter(submission::Column::Slug.eq(slug))
            .filter(submission::Column::State.eq(SubmissionState::Pending))
            .filter(submission::Column::UserId.ne(viewer_id));
        if !muted.is_empty() {
            query = query.filter(submission::Column::Id.is_not_in(muted));
        }

        Ok(query
            .order_by_asc(submission::Column::Id)
            .all(&self.db)
            .await?)
    }
}

#[async_trait]
impl Social for DbStore {
    async fn grant_access(&self, user_id: i32, track: &str, slug: &str) -> Result<(), StoreError> {
        let model = acl::ActiveModel {
            user_id: Set(user_id),
            track: Set(track.to_string()),
            slug: Set(slug.to_string()),
            created_at: Set(Utc::now()),
        };
        let result = acl::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([acl::Column::UserId, acl::Column::Track, acl::Column::Slug])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribe(&self, user_id: i32, user_exercise_id: i32) -> Result<(), StoreError> {
        let model = conversation_subscription::ActiveModel {
            user_id: Set(user_id),
            user_exercise_id: Set(user_exercise_id),
            created_at: Set(Utc::now()),
        };
        let result = conversation_subscription::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    conversation_subscription::Column::UserId,
                    conversation_subscription::Column::UserExerciseId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscribers(&self, user_exercise_id: i32) -> Result<Vec<i32>, StoreError> {
        Ok(conversation_subscription::Entity::find()
            .filter(conversation_subscription::Column::UserExerciseId.eq(user_exercise_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| s.user_id)
            .collect())
    }

    async fn add_notification(
        &self,
        user_id: i32,
        submission_id: i32,
        regarding: &str,
        actor_id: i32,
    ) -> Result<(), StoreError> {
        notification::ActiveModel {
            user_id: Set(user_id),
            submission_id: Set(submission_id),
            regarding: Set(regarding.to_string()),
            actor_id: Set(actor_id),
            read: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
