#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use drillflow_backend::db::operations::catalog::NewQuestion;
use drillflow_backend::db::{operations, DatabaseProxy};

pub struct TestDb {
    pub proxy: Arc<DatabaseProxy>,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let proxy = DatabaseProxy::connect(&url)
        .await
        .expect("failed to connect test database");
    TestDb { proxy, _dir: dir }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub async fn seed_learner(proxy: &DatabaseProxy, id: &str) {
    operations::learners::insert(proxy.pool(), id, "Test learner", 2)
        .await
        .expect("failed to insert learner");
}

/// Seeds `categories` topics with `per_category` questions each, difficulty
/// cycling 1..=5. Returns the question ids in insertion order.
pub async fn seed_catalog(proxy: &DatabaseProxy, categories: i64, per_category: i64) -> Vec<i64> {
    let pool = proxy.pool();
    let mut ids = Vec::new();

    for c in 0..categories {
        let category_id = operations::catalog::insert_category(
            pool,
            &format!("Topic {}", c + 1),
            "seeded for tests",
        )
        .await
        .expect("failed to insert category");

        let items: Vec<NewQuestion> = (0..per_category)
            .map(|i| NewQuestion {
                category_id,
                prompt: format!("Prompt {}-{}", c + 1, i + 1),
                answer: "answer".to_string(),
                explanation: format!("Explanation {}-{}", c + 1, i + 1),
                difficulty_level: (i % 5) + 1,
            })
            .collect();

        let batch = operations::catalog::insert_questions_batch(pool, &items)
            .await
            .expect("failed to insert questions");
        ids.extend(batch);
    }

    ids
}

/// Inserts one attempt per entry, one minute apart starting at `base_time`.
pub async fn seed_attempts(proxy: &DatabaseProxy, learner_id: &str, entries: &[(i64, bool)]) {
    let base = base_time();
    for (i, (question_id, correct)) in entries.iter().enumerate() {
        operations::attempts::insert(
            proxy.pool(),
            learner_id,
            *question_id,
            *correct,
            2.0,
            base + Duration::minutes(i as i64),
        )
        .await
        .expect("failed to insert attempt");
    }
}
