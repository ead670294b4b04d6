use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Presence marker: someone is looking at this exercise.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "look")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_exercise_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,

    pub looked_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
