use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const LIKE: &str = "like";
pub const MUTE: &str = "mute";

/// A per-viewer flag on a submission (liked, muted).
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reaction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub submission_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,
    /// `like` or `mute`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub kind: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
