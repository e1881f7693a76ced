use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::DatabaseProxy;
use crate::engine::EngineConfig;
use crate::services::recommendation::RecommendationService;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    proxy: Arc<DatabaseProxy>,
    recommender: Arc<RecommendationService>,
}

impl AppState {
    pub fn new(proxy: Arc<DatabaseProxy>, engine_config: EngineConfig) -> Self {
        let recommender = Arc::new(RecommendationService::new(
            Arc::clone(&proxy),
            engine_config,
        ));
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            proxy,
            recommender,
        }
    }

    pub fn proxy(&self) -> &DatabaseProxy {
        &self.proxy
    }

    pub fn recommender(&self) -> &RecommendationService {
        &self.recommender
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }
}
