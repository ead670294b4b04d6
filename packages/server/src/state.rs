use std::sync::Arc;

use crate::config::AppConfig;
use crate::fanout::EventFanout;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub fanout: Arc<dyn EventFanout>,
    pub config: AppConfig,
}
