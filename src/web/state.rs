use std::sync::Arc;

use crate::config::Config;
use crate::payload_store::PayloadStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub payloads: PayloadStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let payloads = PayloadStore::new(config.payloads.ttl_secs, config.payloads.max_entries);
        Self {
            config: Arc::new(config),
            payloads,
        }
    }
}
