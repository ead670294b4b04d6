#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a single submission version.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    /// The current version of a chain, visible in review queues.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Replaced by a newer version of the same chain.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "superseded"))]
    Superseded,
    /// Completed by its author.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "done"))]
    Done,
    /// Paused by its author.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "hibernating"))]
    Hibernating,
}

impl SubmissionState {
    pub const ALL: &'static [SubmissionState] =
        &[Self::Pending, Self::Superseded, Self::Done, Self::Hibernating];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Superseded => "superseded",
            Self::Done => "done",
            Self::Hibernating => "hibernating",
        }
    }

    /// Returns true if reviewers should see this submission in their queues.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError {
    invalid: String,
}

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid state '{}'. Valid values: {}",
            self.invalid,
            SubmissionState::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStateError {}

impl FromStr for SubmissionState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "superseded" => Ok(Self::Superseded),
            "done" => Ok(Self::Done),
            "hibernating" => Ok(Self::Hibernating),
            _ => Err(ParseStateError {
                invalid: s.to_string(),
            }),
        }
    }
}

/// Derived status of a (user, exercise) aggregate, following its chain head.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseState {
    /// No iteration has been submitted (possibly skipped).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "unstarted"))]
    Unstarted,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "done"))]
    Done,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "hibernating"))]
    Hibernating,
}

impl ExerciseState {
    /// The aggregate state implied by the chain head, if any.
    ///
    /// A superseded head is left behind when a done head is deleted. Nothing
    /// of the exercise is under review then, so it counts as hibernating until
    /// woken up.
    pub fn from_head(head: Option<SubmissionState>) -> Self {
        match head {
            None => Self::Unstarted,
            Some(SubmissionState::Pending) => Self::Active,
            Some(SubmissionState::Done) => Self::Done,
            Some(SubmissionState::Hibernating | SubmissionState::Superseded) => Self::Hibernating,
        }
    }
}

impl Default for ExerciseState {
    fn default() -> Self {
        Self::Unstarted
    }
}
