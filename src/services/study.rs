//! Attempt logging and the study-level classifier.
//!
//! The classifier is the only writer of `learners.studyLevel`; the
//! recommendation engine reads the level but never changes it.

use chrono::Utc;

use crate::db::{operations, DatabaseProxy};
use crate::engine::types::AttemptRecord;
use crate::metrics::Metrics;

pub const DEFAULT_STUDY_LEVEL: i64 = 2;
const ADVANCING_STUDY_LEVEL: i64 = 3;
const MASTERY_STUDY_LEVEL: i64 = 5;

/// Classification looks at most this many recent attempts.
const CLASSIFIER_WINDOW: i64 = 30;
/// Below this many attempts the learner keeps the default level.
const MIN_ATTEMPTS_FOR_CLASSIFICATION: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub explanation: String,
    pub study_level: i64,
}

pub async fn record_attempt(
    proxy: &DatabaseProxy,
    learner_id: &str,
    question_id: i64,
    correct: bool,
    response_seconds: f64,
) -> Result<AttemptOutcome, StudyError> {
    let pool = proxy.pool();

    let learner = operations::learners::find_by_id(pool, learner_id)
        .await?
        .ok_or_else(|| StudyError::NotFound(format!("learner {learner_id}")))?;

    let question = operations::catalog::find_question(pool, question_id)
        .await?
        .filter(|q| q.is_active)
        .ok_or_else(|| StudyError::NotFound(format!("question {question_id}")))?;

    operations::attempts::insert(
        pool,
        learner_id,
        question_id,
        correct,
        response_seconds,
        Utc::now(),
    )
    .await?;
    Metrics::global().incr_attempts_recorded();

    let recent =
        operations::attempts::recent_for_learner(pool, learner_id, CLASSIFIER_WINDOW).await?;
    let level = classify_study_level(&recent);
    if level != learner.study_level {
        operations::learners::update_study_level(pool, learner_id, level).await?;
        tracing::info!(learner = learner_id, level, "study level updated");
    }

    Ok(AttemptOutcome {
        explanation: question.explanation,
        study_level: level,
    })
}

/// Accuracy and pace over the recent window decide the tier. Thresholds
/// match the level migration that introduced the field: 80%/3s for mastery,
/// 60%/5s for advancing, default otherwise.
fn classify_study_level(recent: &[AttemptRecord]) -> i64 {
    if recent.len() < MIN_ATTEMPTS_FOR_CLASSIFICATION {
        return DEFAULT_STUDY_LEVEL;
    }

    let total = recent.len() as f64;
    let correct = recent.iter().filter(|a| a.correct).count() as f64;
    let accuracy = correct / total;
    let avg_seconds = recent.iter().map(|a| a.response_seconds).sum::<f64>() / total;

    if accuracy >= 0.8 && avg_seconds <= 3.0 {
        MASTERY_STUDY_LEVEL
    } else if accuracy >= 0.6 && avg_seconds <= 5.0 {
        ADVANCING_STUDY_LEVEL
    } else {
        DEFAULT_STUDY_LEVEL
    }
}
