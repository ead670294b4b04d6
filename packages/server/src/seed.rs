use sea_orm::sea_query::{
    Index, IndexCreateStatement, PostgresQueryBuilder, SchemaStatementBuilder,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{error, info, warn};

use crate::config::CatalogConfig;
use crate::entity::{exercise, submission, user_exercise};
use crate::store::{Store, StoreError};

/// Register every configured exercise the catalog does not know yet.
pub async fn seed_catalog(store: &dyn Store, catalog: &CatalogConfig) -> Result<(), StoreError> {
    let mut inserted = 0u32;
    for seed in &catalog.exercises {
        let name = seed
            .name
            .clone()
            .unwrap_or_else(|| common::language::problem_name(&seed.slug));
        if store
            .register_exercise(&seed.track, &seed.slug, &name)
            .await?
        {
            inserted += 1;
        }
    }

    if inserted > 0 {
        info!("Seeded {} new exercises", inserted);
    }
    Ok(())
}

/// Performance index: a failure is logged and startup continues.
async fn create_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    let sql = stmt.to_string(PostgresQueryBuilder);
    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}

/// Constraint index: the store relies on it, so a failure aborts.
async fn create_unique_index(
    db: &DatabaseConnection,
    name: &str,
    stmt: IndexCreateStatement,
) -> Result<(), DbErr> {
    let sql = stmt.to_string(PostgresQueryBuilder);
    db.execute_unprepared(&sql).await.inspect_err(|e| {
        error!("Failed to create unique index {}: {}", name, e);
    })?;
    info!("Ensured index {} exists", name);
    Ok(())
}

/// Ensure the composite indexes schema-sync cannot express.
///
/// The unique ones back the upserts in the store and reject concurrent
/// appends that would assign the same version twice; failing to build one is
/// an error.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_unique_index(
        db,
        "idx_exercise_track_slug",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_exercise_track_slug")
            .table(exercise::Entity)
            .col(exercise::Column::Track)
            .col(exercise::Column::Slug)
            .to_owned(),
    )
    .await?;

    create_unique_index(
        db,
        "idx_user_exercise_user_track_slug",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_user_exercise_user_track_slug")
            .table(user_exercise::Entity)
            .col(user_exercise::Column::UserId)
            .col(user_exercise::Column::Track)
            .col(user_exercise::Column::Slug)
            .to_owned(),
    )
    .await?;

    create_unique_index(
        db,
        "idx_submission_chain_version",
        Index::create()
            .if_not_exists()
            .unique()
            .name("idx_submission_chain_version")
            .table(submission::Entity)
            .col(submission::Column::UserExerciseId)
            .col(submission::Column::Version)
            .to_owned(),
    )
    .await?;

    // Review queue: pending submissions of one exercise.
    create_index(
        db,
        "idx_submission_track_slug_state",
        Index::create()
            .if_not_exists()
            .name("idx_submission_track_slug_state")
            .table(submission::Entity)
            .col(submission::Column::Track)
            .col(submission::Column::Slug)
            .col(submission::Column::State)
            .to_owned(),
    )
    .await;

    Ok(())
}
