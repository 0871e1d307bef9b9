pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod validation;

use std::sync::{atomic::AtomicU64, Arc};
use std::time::Instant;

use tts_core::{Dispatcher, PresetRegistry};

use crate::metrics::AppMetrics;

pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: AppMetrics,
    pub request_count: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            metrics: AppMetrics::new(),
            request_count: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn presets(&self) -> &PresetRegistry {
        self.dispatcher.presets()
    }
}
