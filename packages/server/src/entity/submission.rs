use std::collections::BTreeMap;

use common::SubmissionState;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Relative file path to file contents.
pub type Solution = BTreeMap<String, String>;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Opaque public identifier.
    #[sea_orm(unique)]
    pub key: String,

    #[sea_orm(indexed)]
    pub user_id: i32,
    /// Chain this version belongs to. (user_exercise_id, version) is unique.
    #[sea_orm(indexed)]
    pub user_exercise_id: i32,

    pub track: String,
    pub slug: String,

    /// Submitted files stored as a JSON object of path => contents.
    #[sea_orm(column_type = "JsonBinary")]
    pub code: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub version: i32,
    pub state: SubmissionState,

    /// The version this one replaced, if any.
    pub prior_id: Option<i32>,

    pub created_at: DateTimeUtc,
    pub done_at: Option<DateTimeUtc>,
}

impl Model {
    /// Decode the stored files. Malformed rows decode as empty.
    pub fn solution(&self) -> Solution {
        serde_json::from_value(self.code.clone()).unwrap_or_default()
    }

    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.user_id == user_id
    }
}

impl ActiveModelBehavior for ActiveModel {}
