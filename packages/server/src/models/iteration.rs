use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::submission;

/// Body of `POST /user/assignments`.
///
/// Current clients send `solution`, `language` and `problem`. Older clients
/// send a single `path`/`code` pair where `path` also encodes the track and
/// the exercise.
#[derive(Clone, Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct AssignmentPayload {
    /// API key of the submitting user.
    #[schema(example = "2c6f0a1e9d7b4e59a4f4c1a3d8e6b7f0")]
    pub key: Option<String>,
    /// Relative file path to file contents.
    pub solution: Option<BTreeMap<String, String>>,
    /// Track id.
    #[schema(example = "ruby")]
    pub language: Option<String>,
    /// Exercise slug.
    #[schema(example = "two-fer")]
    pub problem: Option<String>,
    /// Legacy single-file path, e.g. `ruby/two-fer/two_fer.rb`.
    pub path: Option<String>,
    /// Legacy single-file contents.
    pub code: Option<String>,
    pub comment: Option<String>,
}

/// Query string carrying the API key.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct KeyQuery {
    pub key: Option<String>,
}

/// Representation of a newly accepted iteration.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptResponse {
    /// Submission key.
    #[schema(example = "8d1f3ac1c2b94e0b9f6e7f37a0a6a4d2")]
    pub id: String,
    /// Absolute URL of the submission page.
    #[schema(example = "http://localhost:3000/submissions/8d1f3ac1c2b94e0b9f6e7f37a0a6a4d2")]
    pub url: String,
    #[schema(example = "ruby")]
    pub track_id: String,
    /// Display name of the track.
    #[schema(example = "Ruby")]
    pub language: String,
    #[schema(example = "two-fer")]
    pub slug: String,
    /// Display name of the exercise.
    #[schema(example = "Two Fer")]
    pub name: String,
    /// Version of the submission within its chain.
    #[schema(example = 1)]
    pub iteration: i32,
}

/// Latest version of one exercise.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LatestIteration {
    pub id: String,
    pub track_id: String,
    pub language: String,
    pub slug: String,
    pub iteration: i32,
    pub solution: BTreeMap<String, String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<submission::Model> for LatestIteration {
    fn from(model: submission::Model) -> Self {
        Self {
            solution: model.solution(),
            language: common::language::of(&model.track),
            id: model.key,
            track_id: model.track,
            slug: model.slug,
            iteration: model.version,
            comment: model.comment,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LatestIterationsResponse {
    pub assignments: Vec<LatestIteration>,
}
