pub mod error;
pub mod utils;
pub mod stats;
pub mod models;
pub mod db;
pub mod pipeline;
pub mod api;

use std::sync::Arc;

use crate::pipeline::Recognizer;
use crate::utils::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub config: Config,
    pub stats: Arc<stats::Stats>,
    pub recognizer: Arc<Recognizer>,
}

impl AppState {
    pub fn new(config: Config, recognizer: Arc<Recognizer>, stats: Arc<stats::Stats>) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            config,
            stats,
            recognizer,
        }
    }
}
