use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::dispatch::{Dispatcher, QueryService};
use crate::queue::DispatchQueue;
use crate::store::MessageStore;

/// Shared handler state. Backends are chosen by the caller so that tests can
/// inject memory implementations.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub queue: Arc<dyn DispatchQueue>,
    pub store: Arc<dyn MessageStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub query_service: Arc<QueryService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        queue: Arc<dyn DispatchQueue>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(queue.clone()));
        let query_service = Arc::new(QueryService::new(store.clone()));

        Self {
            settings: Arc::new(settings),
            queue,
            store,
            dispatcher,
            query_service,
            start_time: Instant::now(),
        }
    }
}
