//! Side effects of pipeline events: notifications, ACL grants, conversation
//! subscriptions and background jobs.
//!
//! Every operation is best effort. Callers log failures and carry on; a lost
//! notification or job never undoes a committed submission.

use std::sync::Arc;

use async_trait::async_trait;
use common::config::MqAppConfig;
use common::jobs::{AnalyzeJob, HelloJob};
use mq::{Mq, MqError};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::entity::{submission, user};
use crate::store::{Store, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A new iteration was appended to a chain.
    Iteration,
    /// Someone liked a submission.
    Like,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iteration => "iteration",
            Self::Like => "like",
        }
    }
}

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("queue: {0}")]
    Queue(#[from] MqError),
}

#[async_trait]
pub trait EventFanout: Send + Sync {
    async fn notify(
        &self,
        submission: &submission::Model,
        kind: EventKind,
        actor: &user::Model,
    ) -> Result<(), FanoutError>;

    /// Let `user` see other solutions of the exercise.
    async fn authorize(&self, user: &user::Model, track: &str, slug: &str)
    -> Result<(), FanoutError>;

    /// Subscribe `user` to the conversation around `submission`.
    async fn subscribe(
        &self,
        user: &user::Model,
        submission: &submission::Model,
    ) -> Result<(), FanoutError>;

    async fn enqueue_analyze(&self, submission_key: &str, version: i32)
    -> Result<(), FanoutError>;

    async fn enqueue_hello(&self, submission_key: &str, version: i32) -> Result<(), FanoutError>;
}

/// Background job triggered by a new iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    Analyze,
    Hello,
}

/// Jobs a new iteration of (track, slug) triggers.
pub fn jobs_for(track: &str, slug: &str) -> Vec<Job> {
    let mut jobs = Vec::new();
    if (track == "ruby" && slug == "hamming") || track == "go" {
        jobs.push(Job::Analyze);
    }
    if slug == "hello-world" {
        jobs.push(Job::Hello);
    }
    jobs
}

fn log_failure(operation: &'static str, key: &str, result: Result<(), FanoutError>) {
    if let Err(e) = result {
        warn!(operation, submission_key = %key, error = %e, "Fan-out failed");
    }
}

/// Run every side effect of a freshly appended iteration.
#[instrument(skip_all, fields(submission_key = %submission.key, version = submission.version))]
pub async fn after_iteration(
    fanout: &dyn EventFanout,
    author: &user::Model,
    submission: &submission::Model,
) {
    let key = submission.key.as_str();

    log_failure(
        "authorize",
        key,
        fanout
            .authorize(author, &submission.track, &submission.slug)
            .await,
    );
    log_failure(
        "notify",
        key,
        fanout
            .notify(submission, EventKind::Iteration, author)
            .await,
    );
    log_failure("subscribe", key, fanout.subscribe(author, submission).await);

    for job in jobs_for(&submission.track, &submission.slug) {
        let result = match job {
            Job::Analyze => fanout.enqueue_analyze(key, submission.version).await,
            Job::Hello => fanout.enqueue_hello(key, submission.version).await,
        };
        log_failure("enqueue", key, result);
    }
}

/// Fan-out backed by the store for records and by the message queue for jobs.
pub struct StoreFanout {
    store: Arc<dyn Store>,
    mq: Option<Arc<Mq>>,
    config: MqAppConfig,
}

impl StoreFanout {
    pub fn new(store: Arc<dyn Store>, mq: Option<Arc<Mq>>, config: MqAppConfig) -> Self {
        Self { store, mq, config }
    }

    fn queue(&self) -> Option<&Mq> {
        if !self.config.enabled {
            return None;
        }
        self.mq.as_deref()
    }

    /// Notify `user_id` unless it is a guest or no longer exists.
    async fn notify_user(
        &self,
        user_id: i32,
        submission: &submission::Model,
        kind: EventKind,
        actor: &user::Model,
    ) -> Result<(), FanoutError> {
        match self.store.user_by_id(user_id).await? {
            Some(recipient) if !recipient.guest => {
                self.store
                    .add_notification(recipient.id, submission.id, kind.as_str(), actor.id)
                    .await?;
            }
            _ => debug!(user_id, "Skipping notification for guest or missing user"),
        }
        Ok(())
    }
}

#[async_trait]
impl EventFanout for StoreFanout {
    async fn notify(
        &self,
        submission: &submission::Model,
        kind: EventKind,
        actor: &user::Model,
    ) -> Result<(), FanoutError> {
        match kind {
            EventKind::Iteration => {
                let subscribers = self.store.subscribers(submission.user_exercise_id).await?;
                for user_id in subscribers.into_iter().filter(|id| *id != actor.id) {
                    self.notify_user(user_id, submission, kind, actor).await?;
                }
            }
            EventKind::Like => {
                if submission.user_id != actor.id {
                    self.notify_user(submission.user_id, submission, kind, actor)
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn authorize(
        &self,
        user: &user::Model,
        track: &str,
        slug: &str,
    ) -> Result<(), FanoutError> {
        self.store.grant_access(user.id, track, slug).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        user: &user::Model,
        submission: &submission::Model,
    ) -> Result<(), FanoutError> {
        self.store
            .subscribe(user.id, submission.user_exercise_id)
            .await?;
        Ok(())
    }

    async fn enqueue_analyze(
        &self,
        submission_key: &str,
        version: i32,
    ) -> Result<(), FanoutError> {
        let Some(queue) = self.queue() else {
            debug!(submission_key, "MQ unavailable, skipping analyze job");
            return Ok(());
        };
        let job = AnalyzeJob {
            submission_key: submission_key.to_string(),
            version,
        };
        mq::publish_job(queue, &self.config.analyze_queue_name, &job).await?;
        Ok(())
    }

    async fn enqueue_hello(&self, submission_key: &str, version: i32) -> Result<(), FanoutError> {
        let Some(queue) = self.queue() else {
            debug!(submission_key, "MQ unavailable, skipping hello job");
            return Ok(());
        };
        let job = HelloJob {
            submission_key: submission_key.to_string(),
            version,
        };
        mq::publish_job(queue, &self.config.hello_queue_name, &job).await?;
        Ok(())
    }
}
