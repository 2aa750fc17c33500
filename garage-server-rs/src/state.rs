use crate::config::AppConfig;
use crate::store::DocumentStore;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: AppConfig,
    /// Held for the whole of a backup or restore job so the two never
    /// interleave on the same collections.
    pub job_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        Self {
            store,
            config,
            job_lock: Arc::new(Mutex::new(())),
        }
    }
}
