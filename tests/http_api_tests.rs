mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use drillflow_backend::db::DatabaseProxy;
use drillflow_backend::engine::EngineConfig;
use drillflow_backend::routes;
use drillflow_backend::state::AppState;

use common::{seed_attempts, seed_catalog, seed_learner, test_db};

fn app(proxy: Arc<DatabaseProxy>) -> Router {
    let state = AppState::new(proxy, EngineConfig::default());
    routes::router(state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}

#[tokio::test]
async fn health_reports_connected_database() {
    let db = test_db().await;
    let app = app(Arc::clone(&db.proxy));

    let response = app.oneshot(get_request("/health")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn catalog_crud_and_listing() {
    let db = test_db().await;
    let app = app(Arc::clone(&db.proxy));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categories",
            json!({"name": "Conditionals", "description": "If-clauses"}),
        ))
        .await
        .expect("create category");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let category_id = body["category"]["categoryId"].as_i64().expect("category id");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/questions/batch",
            json!({"questions": [
                {"categoryId": category_id, "prompt": "If I ___ rich...", "answer": "were", "difficultyLevel": 3},
                {"categoryId": category_id, "prompt": "Unless you ___...", "answer": "hurry", "difficultyLevel": 2}
            ]}),
        ))
        .await
        .expect("batch create");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["questionIds"].as_array().expect("ids").len(), 2);

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/questions?categoryId={category_id}&limit=10"
        )))
        .await
        .expect("list questions");
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);

    // Deactivated questions disappear from the recommendation catalog but
    // stay readable.
    let first_id = body["questions"][0]["questionId"].as_i64().expect("id");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/questions/{first_id}"))
                .body(Body::empty())
                .expect("build delete"),
        )
        .await
        .expect("deactivate");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/questions/{first_id}")))
        .await
        .expect("get question");
    let body = body_json(response).await;
    assert_eq!(body["question"]["isActive"], false);
}

#[tokio::test]
async fn recommendation_flow_over_http_is_idempotent() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 2, 10).await;
    seed_learner(&db.proxy, "http-learner").await;
    let history: Vec<(i64, bool)> = ids.iter().take(4).map(|id| (*id, true)).collect();
    seed_attempts(&db.proxy, "http-learner", &history).await;

    let app = app(Arc::clone(&db.proxy));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/recommendations",
            json!({"learnerId": "http-learner"}),
        ))
        .await
        .expect("create recommendation");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["strategy"], "heuristic");
    let request_id = body["requestId"].as_str().expect("request id").to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/recommendations/{request_id}/result"),
            json!({}),
        ))
        .await
        .expect("first result");
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    let first_ids: Vec<i64> = first["recommendation"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item["questionId"].as_i64().expect("question id"))
        .collect();
    assert_eq!(first_ids.len(), 5);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/recommendations/{request_id}/result"),
            json!({}),
        ))
        .await
        .expect("second result");
    let second = body_json(response).await;
    let second_ids: Vec<i64> = second["recommendation"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item["questionId"].as_i64().expect("question id"))
        .collect();
    assert_eq!(first_ids, second_ids);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/recommendations/{request_id}")))
        .await
        .expect("detail");
    let body = body_json(response).await;
    assert_eq!(body["recommendation"]["status"], "completed");

    let response = app
        .clone()
        .oneshot(get_request("/api/recommendations?learnerId=http-learner"))
        .await
        .expect("list");
    let body = body_json(response).await;
    assert_eq!(
        body["recommendations"].as_array().expect("list").len(),
        1
    );
}

#[tokio::test]
async fn attempts_update_study_level_and_history() {
    let db = test_db().await;
    let ids = seed_catalog(&db.proxy, 1, 15).await;
    seed_learner(&db.proxy, "studious").await;

    let app = app(Arc::clone(&db.proxy));

    // Twelve fast correct answers push the learner to the top tier.
    let mut last_level = 0;
    for id in ids.iter().take(12) {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/study/attempts",
                json!({
                    "learnerId": "studious",
                    "questionId": id,
                    "correct": true,
                    "responseSeconds": 1.5
                }),
            ))
            .await
            .expect("submit attempt");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        last_level = body["studyLevel"].as_i64().expect("level");
    }
    assert_eq!(last_level, 5);

    let response = app
        .clone()
        .oneshot(get_request("/api/study/studious/history?limit=5"))
        .await
        .expect("history");
    let body = body_json(response).await;
    assert_eq!(body["recentHistory"].as_array().expect("entries").len(), 5);

    let response = app
        .clone()
        .oneshot(get_request("/api/study/studious/stats"))
        .await
        .expect("stats");
    let body = body_json(response).await;
    assert_eq!(body["categoryStats"][0]["total"], 12);
    assert_eq!(body["categoryStats"][0]["correct"], 12);
}

#[tokio::test]
async fn unknown_ids_map_to_404() {
    let db = test_db().await;
    let app = app(Arc::clone(&db.proxy));

    let response = app
        .clone()
        .oneshot(get_request("/api/learners/ghost"))
        .await
        .expect("get learner");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/recommendations/missing/result",
            json!({}),
        ))
        .await
        .expect("missing request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/recommendations",
            json!({"learnerId": "ghost"}),
        ))
        .await
        .expect("ghost learner");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn learner_creation_round_trip() {
    let db = test_db().await;
    let app = app(Arc::clone(&db.proxy));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/learners",
            json!({"id": "alex", "displayName": "Alex"}),
        ))
        .await
        .expect("create learner");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["studyLevel"], 2);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/learners",
            json!({"id": "alex"}),
        ))
        .await
        .expect("duplicate learner");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(get_request("/api/learners/alex"))
        .await
        .expect("get learner");
    let body = body_json(response).await;
    assert_eq!(body["displayName"], "Alex");
}
