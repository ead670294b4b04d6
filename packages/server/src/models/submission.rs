use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::SubmissionState;
use serde::Serialize;

use crate::entity::submission;

/// A submission as shown on its page.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmissionView {
    #[schema(example = "8d1f3ac1c2b94e0b9f6e7f37a0a6a4d2")]
    pub key: String,
    #[schema(example = "ruby")]
    pub track_id: String,
    #[schema(example = "Ruby")]
    pub language: String,
    #[schema(example = "two-fer")]
    pub slug: String,
    #[schema(example = 2)]
    pub version: i32,
    pub state: SubmissionState,
    pub solution: BTreeMap<String, String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
}

impl From<submission::Model> for SubmissionView {
    fn from(model: submission::Model) -> Self {
        Self {
            solution: model.solution(),
            language: common::language::of(&model.track),
            key: model.key,
            track_id: model.track,
            slug: model.slug,
            version: model.version,
            state: model.state,
            comment: model.comment,
            created_at: model.created_at,
            done_at: model.done_at,
        }
    }
}

/// Body of `GET /submissions/{key}`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SubmissionPage {
    /// `"{Problem} by {username} in {Language}"`.
    #[schema(example = "Two Fer by alice in Ruby")]
    pub title: String,
    pub submission: SubmissionView,
    /// Next submission of the same exercise to review, for signed-in viewers.
    pub next_submission: Option<SubmissionView>,
}
