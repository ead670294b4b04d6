//! The write path: a raw assignment payload becomes a persisted submission.

use axum::body::Bytes;
use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::{self, UPGRADE_CLIENT};
use crate::entity::submission::Solution;
use crate::entity::{exercise, submission, user};
use crate::fanout::{self, EventFanout};
use crate::models::iteration::AssignmentPayload;
use crate::store::{NewIteration, Store, StoreError};

pub const MISSING_BODY: &str = "must send key and code as json";

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("unknown api key '{0}', please check your account settings and reconfigure")]
    UnknownKey(String),

    #[error("unknown problem (track: {track}, slug: {slug}, path: {path})")]
    UnknownProblem {
        track: String,
        slug: String,
        path: String,
    },

    #[error("duplicate of previous iteration")]
    Duplicate,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A solution with the exercise it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Iteration {
    pub track: String,
    pub slug: String,
    /// Path reported back in diagnostics.
    pub path: String,
    pub solution: Solution,
    pub comment: Option<String>,
}

impl Iteration {
    /// Build an iteration from either the structured or the legacy payload shape.
    pub fn from_payload(payload: AssignmentPayload) -> Result<Self, AttemptError> {
        let AssignmentPayload {
            solution,
            language,
            problem,
            path,
            code,
            comment,
            ..
        } = payload;

        let solution = match (solution, &path, code) {
            (Some(solution), _, _) => solution,
            (None, Some(path), Some(code)) => Solution::from([(path.clone(), code)]),
            _ => return Err(AttemptError::InvalidPayload(MISSING_BODY.into())),
        };

        let path = path
            .or_else(|| solution.keys().next().cloned())
            .unwrap_or_default();

        let Some(track) = language else {
            let legacy = catalog::resolve_legacy_path(&path)
                .ok_or_else(|| AttemptError::InvalidPayload(UPGRADE_CLIENT.into()))?;
            // Files under the same exercise are keyed by their relative path,
            // whichever legacy shape carried them.
            let solution = solution
                .into_iter()
                .map(|(file, contents)| match catalog::resolve_legacy_path(&file) {
                    Some(l) if l.track == legacy.track && l.slug == legacy.slug => {
                        (l.path, contents)
                    }
                    _ => (file, contents),
                })
                .collect();
            return Ok(Self {
                track: legacy.track,
                slug: legacy.slug,
                path: legacy.path,
                solution,
                comment,
            });
        };

        Ok(Self {
            track,
            slug: problem.unwrap_or_default(),
            path,
            solution,
            comment,
        })
    }
}

/// An accepted iteration.
#[derive(Debug)]
pub struct Accepted {
    pub user: user::Model,
    pub exercise: exercise::Model,
    pub submission: submission::Model,
}

/// Decode a request body. Empty and malformed bodies are rejected alike.
pub fn parse_body(body: &Bytes) -> Result<AssignmentPayload, AttemptError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AttemptError::InvalidPayload(MISSING_BODY.into()));
    }
    serde_json::from_slice(body).map_err(|_| AttemptError::InvalidPayload(MISSING_BODY.into()))
}

/// Validate, deduplicate and persist an iteration, then run its side effects.
#[instrument(skip_all)]
pub async fn process(
    store: &dyn Store,
    fanout: &dyn EventFanout,
    payload: AssignmentPayload,
) -> Result<Accepted, AttemptError> {
    let key = payload.key.clone().unwrap_or_default();
    let user = store
        .user_by_key(&key)
        .await?
        .ok_or(AttemptError::UnknownKey(key))?;

    let iteration = Iteration::from_payload(payload)?;

    let exercise = store
        .exercise(&iteration.track, &iteration.slug)
        .await?
        .ok_or_else(|| AttemptError::UnknownProblem {
            track: iteration.track.clone(),
            slug: iteration.slug.clone(),
            path: iteration.path.clone(),
        })?;

    let submission = store
        .append(NewIteration {
            user_id: user.id,
            track: iteration.track,
            slug: iteration.slug,
            code: iteration.solution,
            comment: iteration.comment,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => AttemptError::Duplicate,
            e => e.into(),
        })?;

    info!(
        user_id = user.id,
        track = %submission.track,
        slug = %submission.slug,
        version = submission.version,
        "Iteration accepted"
    );

    fanout::after_iteration(fanout, &user, &submission).await;

    Ok(Accepted {
        user,
        exercise,
        submission,
    })
}
