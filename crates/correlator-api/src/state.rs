use std::sync::Arc;

use correlator_config::Config;
use correlator_core::{LineageReader, LineageStore, TestResultStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LineageStore>,
    pub test_store: Arc<dyn TestResultStore>,
    pub reader: Arc<dyn LineageReader>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LineageStore>,
        test_store: Arc<dyn TestResultStore>,
        reader: Arc<dyn LineageReader>,
        config: Arc<Config>,
    ) -> Self {
        Self { store, test_store, reader, config }
    }
}
