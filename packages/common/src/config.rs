use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Whether MQ is enabled. Default: true.
    /// When disabled, job enqueues are skipped and logged.
    #[serde(default = "default_mq_enabled")]
    pub enabled: bool,
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue name for analysis jobs. Default: "analyze_jobs".
    #[serde(default = "default_analyze_queue_name")]
    pub analyze_queue_name: String,
    /// Queue name for hello-world greeting jobs. Default: "hello_jobs".
    #[serde(default = "default_hello_queue_name")]
    pub hello_queue_name: String,
}

fn default_mq_enabled() -> bool {
    true
}
fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_analyze_queue_name() -> String {
    "analyze_jobs".into()
}
fn default_hello_queue_name() -> String {
    "hello_jobs".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            enabled: default_mq_enabled(),
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            analyze_queue_name: default_analyze_queue_name(),
            hello_queue_name: default_hello_queue_name(),
        }
    }
}
