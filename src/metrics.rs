use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

#[derive(Debug, Default)]
pub struct Metrics {
    requests_created: AtomicU64,
    recommendations_computed: AtomicU64,
    recommendations_served: AtomicU64,
    attempts_recorded: AtomicU64,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

impl Metrics {
    pub fn global() -> &'static Metrics {
        METRICS.get_or_init(Metrics::default)
    }

    pub fn incr_requests_created(&self) {
        self.requests_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_recommendations_computed(&self) {
        self.recommendations_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_recommendations_served(&self) {
        self.recommendations_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_attempts_recorded(&self) {
        self.attempts_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_created(&self) -> u64 {
        self.requests_created.load(Ordering::Relaxed)
    }

    pub fn recommendations_computed(&self) -> u64 {
        self.recommendations_computed.load(Ordering::Relaxed)
    }

    pub fn recommendations_served(&self) -> u64 {
        self.recommendations_served.load(Ordering::Relaxed)
    }

    pub fn attempts_recorded(&self) -> u64 {
        self.attempts_recorded.load(Ordering::Relaxed)
    }
}
