use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog entry. Unique on (track, slug), see `seed::ensure_indexes`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exercise")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub track: String,
    pub slug: String,
    pub name: String,
}

impl ActiveModelBehavior for ActiveModel {}
