pub mod config;
pub mod jobs;
pub mod language;
pub mod submission_state;

pub use submission_state::{ExerciseState, SubmissionState};
