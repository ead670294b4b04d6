use serde::{Deserialize, Serialize};

/// A message published to a background job queue.
pub trait JobMessage: Serialize + Clone + Send + Sync {
    fn message_type() -> &'static str
    where
        Self: Sized;

    /// Idempotency key. Consumers must treat repeated ids as the same job.
    fn message_id(&self) -> String;
}

/// Run static analysis on a freshly submitted iteration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeJob {
    /// Opaque key of the submission to analyze.
    pub submission_key: String,
    /// Version of the submission within its chain.
    pub version: i32,
}

/// Greet a learner who just submitted their first exercise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloJob {
    pub submission_key: String,
    pub version: i32,
}

impl JobMessage for AnalyzeJob {
    fn message_type() -> &'static str {
        "analyze"
    }

    fn message_id(&self) -> String {
        job_id(&self.submission_key, self.version)
    }
}

impl JobMessage for HelloJob {
    fn message_type() -> &'static str {
        "hello"
    }

    fn message_id(&self) -> String {
        job_id(&self.submission_key, self.version)
    }
}

/// Build the idempotency key for a job about one submission version.
pub fn job_id(submission_key: &str, version: i32) -> String {
    format!("{submission_key}:{version}")
}
