pub mod error;
pub mod models;

pub use error::MqError;
pub use models::{MqConfig, MqQueue, init_mq, publish_job};

pub type Mq = MqQueue;
