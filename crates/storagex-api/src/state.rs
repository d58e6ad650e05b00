//! Application state.

use std::sync::Arc;

use storagex_db::JobStore;
use storagex_queue::WorkQueue;
use storagex_storage::ObjectStore;
use storagex_summary::SummaryPipeline;

use crate::config::ApiConfig;
use crate::notifications::ConnectionRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub summaries: Arc<SummaryPipeline>,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn JobStore>,
        objects: Arc<dyn ObjectStore>,
        queue: Arc<dyn WorkQueue>,
        summaries: SummaryPipeline,
    ) -> Self {
        Self {
            config,
            store,
            objects,
            queue,
            summaries: Arc::new(summaries),
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }
}
