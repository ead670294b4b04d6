use common::ExerciseState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Progress aggregate for one (user, track, slug). Created lazily, never deleted.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_exercise")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub user_id: i32,
    pub track: String,
    pub slug: String,

    /// Version of the chain head; 0 when the chain is empty.
    pub iteration_count: i32,
    pub state: ExerciseState,

    pub skipped_at: Option<DateTimeUtc>,
    pub last_iteration_at: Option<DateTimeUtc>,
    pub completed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
