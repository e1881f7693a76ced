mod common;

use std::sync::Arc;

use chrono::Utc;

use drillflow_backend::db::operations;
use drillflow_backend::engine::types::{RequestStatus, StrategyKind};
use drillflow_backend::engine::EngineConfig;
use drillflow_backend::services::recommendation::{RecommendError, RecommendationService};

use common::{seed_attempts, seed_catalog, seed_learner, test_db};

fn service(db: &common::TestDb) -> RecommendationService {
    RecommendationService::new(Arc::clone(&db.proxy), EngineConfig::default())
}

#[tokio::test]
async fn strategy_is_heuristic_below_30_and_model_at_30() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 3, 20).await;
    let svc = service(&db);

    seed_learner(&db.proxy, "short").await;
    let history: Vec<(i64, bool)> = ids.iter().take(29).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "short", &history).await;
    let created = svc.create_request("short").await.expect("create request");
    assert_eq!(created.strategy, StrategyKind::Heuristic);

    seed_learner(&db.proxy, "long").await;
    let history: Vec<(i64, bool)> = ids.iter().take(30).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "long", &history).await;
    let created = svc.create_request("long").await.expect("create request");
    assert_eq!(created.strategy, StrategyKind::Model);

    // The stored strategy matches what the service reported.
    let row = operations::recommendations::find_request(db.proxy.pool(), &created.request_id)
        .await
        .expect("find request")
        .expect("request row");
    assert_eq!(row.strategy, StrategyKind::Model);
    assert_eq!(row.status, RequestStatus::Pending);
}

#[tokio::test]
async fn unknown_learner_and_unknown_request_are_not_found() {
    let db = test_db().await;
    let svc = service(&db);

    let err = svc.create_request("ghost").await.unwrap_err();
    assert!(matches!(err, RecommendError::NotFound(_)));

    let err = svc.fetch_recommendation("no-such-request").await.unwrap_err();
    assert!(matches!(err, RecommendError::NotFound(_)));
}

#[tokio::test]
async fn first_fetch_completes_and_later_fetches_are_idempotent() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 2, 10).await;
    seed_learner(&db.proxy, "learner-a").await;
    let history: Vec<(i64, bool)> = ids.iter().take(5).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "learner-a", &history).await;

    let svc = service(&db);
    let created = svc.create_request("learner-a").await.expect("create request");
    assert_eq!(created.strategy, StrategyKind::Heuristic);

    let first = svc
        .fetch_recommendation(&created.request_id)
        .await
        .expect("first fetch");
    assert_eq!(first.len(), 5);

    let row = operations::recommendations::find_request(db.proxy.pool(), &created.request_id)
        .await
        .expect("find request")
        .expect("request row");
    assert_eq!(row.status, RequestStatus::Completed);

    let second = svc
        .fetch_recommendation(&created.request_id)
        .await
        .expect("second fetch");
    assert_eq!(first, second);

    // Exactly one persisted list with contiguous ranks from 0.
    let ranks: Vec<i64> = sqlx::query_scalar(
        r#"SELECT "rank" FROM "recommendation_items" WHERE "requestId" = $1 ORDER BY "rank" ASC"#,
    )
    .bind(&created.request_id)
    .fetch_all(db.proxy.pool())
    .await
    .expect("list ranks");
    assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn empty_catalog_is_reported_and_request_stays_pending() {
    let db = test_db().await;
    seed_learner(&db.proxy, "learner-b").await;

    let svc = service(&db);
    let created = svc.create_request("learner-b").await.expect("create request");

    let err = svc.fetch_recommendation(&created.request_id).await.unwrap_err();
    assert!(matches!(err, RecommendError::EmptyResult));

    let row = operations::recommendations::find_request(db.proxy.pool(), &created.request_id)
        .await
        .expect("find request")
        .expect("request row");
    assert_eq!(row.status, RequestStatus::Pending);
}

#[tokio::test]
async fn model_path_excludes_all_seen_items_and_is_idempotent() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 3, 20).await;
    seed_learner(&db.proxy, "learner-c").await;

    // 35 attempts across the three topics and all five difficulty levels.
    let history: Vec<(i64, bool)> = ids
        .iter()
        .take(35)
        .enumerate()
        .map(|(i, id)| (*id, i % 3 != 0))
        .collect();
    seed_attempts(&db.proxy, "learner-c", &history).await;

    let svc = service(&db);
    let created = svc.create_request("learner-c").await.expect("create request");
    assert_eq!(created.strategy, StrategyKind::Model);

    let first = svc
        .fetch_recommendation(&created.request_id)
        .await
        .expect("first fetch");
    assert_eq!(first.len(), 10);

    let seen: Vec<i64> = history.iter().map(|(id, _)| *id).collect();
    for item_id in &first {
        assert!(!seen.contains(item_id));
    }

    let second = svc
        .fetch_recommendation(&created.request_id)
        .await
        .expect("second fetch");
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_fetches_agree_on_one_persisted_list() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 2, 15).await;
    seed_learner(&db.proxy, "learner-d").await;
    let history: Vec<(i64, bool)> = ids.iter().take(8).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "learner-d", &history).await;

    let svc = Arc::new(service(&db));
    let created = svc.create_request("learner-d").await.expect("create request");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = Arc::clone(&svc);
        let request_id = created.request_id.clone();
        handles.push(tokio::spawn(async move {
            svc.fetch_recommendation(&request_id).await.expect("fetch")
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task join"));
    }

    let first = &results[0];
    assert_eq!(first.len(), 5);
    for other in &results[1..] {
        assert_eq!(first, other);
    }

    let item_count: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "recommendation_items" WHERE "requestId" = $1"#,
    )
    .bind(&created.request_id)
    .fetch_one(db.proxy.pool())
    .await
    .expect("count items");
    assert_eq!(item_count, 5);
}

#[tokio::test]
async fn completed_request_with_no_items_is_invalid_state() {
    let db = test_db().await;
    seed_learner(&db.proxy, "learner-e").await;

    // Corrupt state: completed on disk with no persisted items.
    sqlx::query(
        r#"
        INSERT INTO "recommendation_requests" ("id", "learnerId", "strategy", "status", "createdAt")
        VALUES ('corrupt-request', 'learner-e', 'heuristic', 'completed', $1)
        "#,
    )
    .bind(Utc::now())
    .execute(db.proxy.pool())
    .await
    .expect("insert corrupt request");

    let svc = service(&db);
    let err = svc.fetch_recommendation("corrupt-request").await.unwrap_err();
    assert!(matches!(err, RecommendError::InvalidState(_)));
}

#[tokio::test]
async fn heuristic_fetch_never_ranks_seen_items_over_fresh_ones() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 1, 6).await;
    seed_learner(&db.proxy, "learner-f").await;
    // Five of six items already attempted; the fresh one must come first.
    let history: Vec<(i64, bool)> = ids.iter().take(5).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "learner-f", &history).await;

    let svc = service(&db);
    let created = svc.create_request("learner-f").await.expect("create request");
    let result = svc
        .fetch_recommendation(&created.request_id)
        .await
        .expect("fetch");

    assert_eq!(result[0], ids[5]);
}
