//! Recommendation request manager.
//!
//! Owns the request state machine ({pending, completed}, one transition)
//! and guarantees at-most-once computation per request: an in-process
//! per-request guard collapses concurrent fetches onto one computation, and
//! the status compare-and-swap in the store guarantees a single persisted
//! list across processes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::db::operations::recommendations::CompleteOutcome;
use crate::db::{operations, DatabaseProxy};
use crate::engine::types::{RequestStatus, ScoredItem, StrategyKind};
use crate::engine::{select_strategy, EngineConfig, HeuristicRanker, SequenceRanker};
use crate::metrics::Metrics;

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("strategy produced no candidates")]
    EmptyResult,
    #[error("invalid request state: {0}")]
    InvalidState(String),
    #[error("computation failed: {0}")]
    Computation(String),
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRequest {
    pub request_id: String,
    pub strategy: StrategyKind,
}

pub struct RecommendationService {
    proxy: Arc<DatabaseProxy>,
    config: EngineConfig,
    heuristic: HeuristicRanker,
    model: OnceCell<Arc<SequenceRanker>>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecommendationService {
    pub fn new(proxy: Arc<DatabaseProxy>, config: EngineConfig) -> Self {
        let heuristic = HeuristicRanker::new(config.heuristic_warmup_threshold);
        Self {
            proxy,
            config,
            heuristic,
            model: OnceCell::new(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a pending request for the learner. The strategy is decided
    /// here from the current history length and never re-derived afterwards.
    pub async fn create_request(&self, learner_id: &str) -> Result<CreatedRequest, RecommendError> {
        let pool = self.proxy.pool();

        retry_once("load learner", || {
            operations::learners::find_by_id(pool, learner_id)
        })
        .await?
        .ok_or_else(|| RecommendError::NotFound(format!("learner {learner_id}")))?;

        let history_len = retry_once("count history", || {
            operations::attempts::count_for_learner(pool, learner_id)
        })
        .await?;

        let strategy = select_strategy(history_len as usize, self.config.model_history_threshold);
        let request_id = Uuid::new_v4().to_string();

        retry_once("insert request", || {
            operations::recommendations::insert_request(pool, &request_id, learner_id, strategy)
        })
        .await?;

        Metrics::global().incr_requests_created();
        tracing::info!(
            learner = learner_id,
            request = %request_id,
            strategy = strategy.as_str(),
            history_len,
            "recommendation request created"
        );

        Ok(CreatedRequest {
            request_id,
            strategy,
        })
    }

    /// Returns the ordered item list for the request, computing and
    /// persisting it on the first successful call. Idempotent: later calls
    /// return the stored list unchanged.
    pub async fn fetch_recommendation(&self, request_id: &str) -> Result<Vec<i64>, RecommendError> {
        let pool = self.proxy.pool();

        let request = retry_once("load request", || {
            operations::recommendations::find_request(pool, request_id)
        })
        .await?
        .ok_or_else(|| RecommendError::NotFound(format!("recommendation request {request_id}")))?;

        if request.status == RequestStatus::Completed {
            return self.load_completed(request_id).await;
        }

        let guard = self.request_guard(request_id);
        let result = {
            let _permit = guard.lock().await;
            self.fetch_pending(request_id).await
        };
        self.inflight.lock().remove(request_id);
        result
    }

    /// Pending path, entered with the per-request guard held.
    async fn fetch_pending(&self, request_id: &str) -> Result<Vec<i64>, RecommendError> {
        let pool = self.proxy.pool();

        // Another caller may have completed the request while this one was
        // waiting on the guard.
        let request = retry_once("load request", || {
            operations::recommendations::find_request(pool, request_id)
        })
        .await?
        .ok_or_else(|| RecommendError::NotFound(format!("recommendation request {request_id}")))?;

        if request.status == RequestStatus::Completed {
            return self.load_completed(request_id).await;
        }

        let ranked = self.compute(&request.learner_id, request.strategy).await?;
        if ranked.is_empty() {
            // Never persist an empty list; the request stays pending.
            return Err(RecommendError::EmptyResult);
        }
        Metrics::global().incr_recommendations_computed();

        let outcome = retry_once("persist recommendation", || {
            operations::recommendations::complete_request(pool, request_id, &ranked)
        })
        .await?;

        match outcome {
            CompleteOutcome::Persisted => {
                tracing::info!(
                    request = request_id,
                    items = ranked.len(),
                    strategy = request.strategy.as_str(),
                    "recommendation computed and persisted"
                );
                Ok(ranked.iter().map(|item| item.question_id).collect())
            }
            CompleteOutcome::AlreadyCompleted => self.load_completed(request_id).await,
        }
    }

    async fn compute(
        &self,
        learner_id: &str,
        strategy: StrategyKind,
    ) -> Result<Vec<ScoredItem>, RecommendError> {
        let pool = self.proxy.pool();

        let history = retry_once("load history", || {
            operations::attempts::list_for_learner_asc(pool, learner_id)
        })
        .await?;
        let catalog = retry_once("load catalog", || {
            operations::catalog::active_items(pool)
        })
        .await?;

        if catalog.is_empty() {
            return Err(RecommendError::EmptyResult);
        }

        match strategy {
            StrategyKind::Heuristic => {
                let level = retry_once("load study level", || {
                    operations::learners::study_level(pool, learner_id)
                })
                .await?
                .ok_or_else(|| RecommendError::NotFound(format!("learner {learner_id}")))?;

                Ok(self
                    .heuristic
                    .rank(&history, &catalog, level, self.config.heuristic_top_k))
            }
            StrategyKind::Model => {
                let ranker = self.ranker().await?;
                let sequence: Vec<i64> = history.iter().map(|a| a.question_id).collect();
                let candidates: Vec<i64> = catalog.iter().map(|item| item.id).collect();
                let top_k = self.config.model_top_k;

                let task = tokio::task::spawn_blocking(move || {
                    ranker.recommend(&sequence, top_k, &candidates)
                });
                match tokio::time::timeout(self.config.inference_timeout, task).await {
                    Err(_) => Err(RecommendError::Computation(
                        "model inference timed out".to_string(),
                    )),
                    Ok(Err(join_err)) => Err(RecommendError::Computation(format!(
                        "model inference task failed: {join_err}"
                    ))),
                    Ok(Ok(ranked)) => Ok(ranked),
                }
            }
        }
    }

    async fn load_completed(&self, request_id: &str) -> Result<Vec<i64>, RecommendError> {
        let pool = self.proxy.pool();
        let items = retry_once("load recommendation items", || {
            operations::recommendations::list_items(pool, request_id)
        })
        .await?;

        if items.is_empty() {
            // A completed request must have a non-empty list; this is
            // corruption, not a cache miss.
            return Err(RecommendError::InvalidState(format!(
                "completed request {request_id} has no persisted items"
            )));
        }
        Ok(items)
    }

    /// Lazily builds the sequence model exactly once; concurrent first
    /// callers wait on the cell rather than racing into duplicate
    /// initialization.
    async fn ranker(&self) -> Result<Arc<SequenceRanker>, RecommendError> {
        let pool = self.proxy.pool();
        self.model
            .get_or_try_init(|| async {
                let capacity = operations::catalog::max_question_id(pool)
                    .await
                    .map_err(|err| {
                        RecommendError::Computation(format!("model init failed: {err}"))
                    })?;
                if capacity <= 0 {
                    return Err(RecommendError::EmptyResult);
                }
                tracing::info!(num_items = capacity, "initializing sequence ranking model");
                Ok(Arc::new(SequenceRanker::new(
                    capacity as usize,
                    self.config.model.clone(),
                    self.config.model_seed,
                )))
            })
            .await
            .map(Arc::clone)
    }

    fn request_guard(&self, request_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock();
        Arc::clone(
            inflight
                .entry(request_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// Persistence calls are retried once before surfacing as a computation
/// failure, per the error-handling contract.
async fn retry_once<T, F, Fut>(op: &str, mut run: F) -> Result<T, RecommendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    match run().await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, op, "database operation failed, retrying once");
            run().await.map_err(|err| {
                RecommendError::Computation(format!("{op} failed after retry: {err}"))
            })
        }
    }
}
