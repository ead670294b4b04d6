use broccoli_queue::queue::BroccoliQueue;
use common::jobs::JobMessage;
use tracing::debug;

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}

/// Publish a job to `queue_name`. Delivery is at-least-once; the job carries its own
/// idempotency key.
pub async fn publish_job<J>(queue: &MqQueue, queue_name: &str, job: &J) -> Result<(), MqError>
where
    J: JobMessage + serde::de::DeserializeOwned,
{
    let message_id = job.message_id();
    queue
        .publish(queue_name, None, job, None)
        .await
        .map_err(|e| MqError::Publish {
            message_type: J::message_type(),
            message_id: message_id.clone(),
            detail: e.to_string(),
        })?;

    debug!(
        queue = queue_name,
        message_type = J::message_type(),
        message_id = %message_id,
        "Job published"
    );
    Ok(())
}
