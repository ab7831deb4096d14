//! HTTP surface tests: routing, auth headers, error body shape.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use stardrop_api::{app, AppState};
use stardrop_common::{
    Config, MemoryStore, MockVerifier, NewTask, NewUser, NullNotifier, Store, TaskKind,
};
use stardrop_engine::Engine;

const ADMIN_TG_ID: i64 = 999;

struct Harness {
    router: Router,
    store: Arc<MemoryStore>,
    verifier: Arc<MockVerifier>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let verifier = Arc::new(MockVerifier::new());
    let config = Config {
        admin_ids: vec![ADMIN_TG_ID],
        ..Config::default()
    };
    let engine = Engine::new(
        Arc::clone(&store) as Arc<dyn Store>,
        verifier.clone(),
        Arc::new(NullNotifier),
        &config,
    );
    let state = Arc::new(AppState::new(engine, config));
    Harness {
        router: app(state),
        store,
        verifier,
    }
}

async fn seed_user(store: &MemoryStore, telegram_id: i64) -> i64 {
    store
        .create_user(NewUser {
            telegram_id,
            username: Some(format!("user{}", telegram_id)),
            first_name: "Test".into(),
            last_name: None,
            avatar_url: None,
            referrer_id: None,
        })
        .await
        .unwrap()
        .id
}

async fn seed_channel_task(store: &MemoryStore, reward: i64, target: &str) -> i64 {
    store
        .create_task(NewTask {
            kind: TaskKind::Channel,
            title: format!("Join @{}", target),
            description: None,
            reward,
            target: target.into(),
            avatar_url: None,
        })
        .await
        .unwrap()
        .id
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as_user(uri: &str, user_id: i64) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .body(Body::empty())
        .unwrap()
}

fn post_as_user(uri: &str, user_id: i64, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_req(method: &str, uri: &str, telegram_id: i64, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-telegram-id", telegram_id.to_string())
        .header("content-type", "application/json");
    match body {
        Some(v) => builder.body(Body::from(v.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let h = harness();
    let resp = h.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn tasks_require_identity_header() {
    let h = harness();
    let resp = h.router.oneshot(get("/api/tasks")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_list_and_verify_flow() {
    let h = harness();
    let user_id = seed_user(&h.store, 100).await;
    let task_id = seed_channel_task(&h.store, 50, "news").await;
    h.verifier.set_member(100, "news", true);

    let resp = h
        .router
        .clone()
        .oneshot(get_as_user("/api/tasks", user_id))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["completed"], false);

    let resp = h
        .router
        .clone()
        .oneshot(post_as_user(
            &format!("/api/tasks/{}/verify", task_id),
            user_id,
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["reward"], 50);

    // second attempt: error body has the uniform shape
    let resp = h
        .router
        .clone()
        .oneshot(post_as_user(
            &format!("/api/tasks/{}/verify", task_id),
            user_id,
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["message"], "task already completed");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn profile_returns_user_and_transaction_history() {
    let h = harness();
    let user_id = seed_user(&h.store, 100).await;
    let task_id = seed_channel_task(&h.store, 50, "news").await;
    h.verifier.set_member(100, "news", true);

    // identity header is required
    let resp = h.router.clone().oneshot(get("/api/user/profile")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    h.router
        .clone()
        .oneshot(post_as_user(
            &format!("/api/tasks/{}/verify", task_id),
            user_id,
            json!({}),
        ))
        .await
        .unwrap();

    let resp = h
        .router
        .clone()
        .oneshot(get_as_user("/api/user/profile", user_id))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["balance"], 50);
    let txs = body["transactions"].as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["kind"], "task");
    assert_eq!(txs[0]["amount"], 50);
}

#[tokio::test]
async fn verify_unknown_task_is_404() {
    let h = harness();
    let user_id = seed_user(&h.store, 100).await;
    let resp = h
        .router
        .oneshot(post_as_user("/api/tasks/424242/verify", user_id, json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn withdrawal_below_minimum_reports_the_reason() {
    let h = harness();
    let user_id = seed_user(&h.store, 100).await;
    let resp = h
        .router
        .oneshot(post_as_user("/api/withdrawals", user_id, json!({"amount": 99})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Minimum withdrawal amount is 100 stars");
}

#[tokio::test]
async fn admin_routes_check_the_principal_set() {
    let h = harness();

    // no header
    let resp = h
        .router
        .clone()
        .oneshot(get("/api/admin/stats"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // not in the set
    let resp = h
        .router
        .clone()
        .oneshot(admin_req("GET", "/api/admin/stats", 123, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // in the set
    let resp = h
        .router
        .clone()
        .oneshot(admin_req("GET", "/api/admin/stats", ADMIN_TG_ID, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["total_users"], 0);
}

#[tokio::test]
async fn admin_task_lifecycle_over_http() {
    let h = harness();

    let resp = h
        .router
        .clone()
        .oneshot(admin_req(
            "POST",
            "/api/admin/tasks",
            ADMIN_TG_ID,
            Some(json!({
                "kind": "channel",
                "title": "Join @news",
                "reward": 50,
                "target": "news",
                "description": null,
                "avatar_url": null
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let task = json_body(resp).await;
    let task_id = task["id"].as_i64().unwrap();
    assert_eq!(task["status"], "active");

    let resp = h
        .router
        .clone()
        .oneshot(admin_req(
            "PUT",
            &format!("/api/admin/tasks/{}", task_id),
            ADMIN_TG_ID,
            Some(json!({"reward": 75})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["reward"], 75);

    let resp = h
        .router
        .clone()
        .oneshot(admin_req(
            "POST",
            &format!("/api/admin/tasks/{}/close", task_id),
            ADMIN_TG_ID,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "inactive");
}

#[tokio::test]
async fn admin_banner_lifecycle_over_http() {
    let h = harness();

    let resp = h
        .router
        .clone()
        .oneshot(admin_req(
            "POST",
            "/api/admin/banners",
            ADMIN_TG_ID,
            Some(json!({
                "image_url": "https://cdn.example/banner.png",
                "link": "https://t.me/news",
                "order_index": 1
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let banner_id = json_body(resp).await["id"].as_i64().unwrap();

    // deactivate through a partial update
    let resp = h
        .router
        .clone()
        .oneshot(admin_req(
            "PUT",
            &format!("/api/admin/banners/{}", banner_id),
            ADMIN_TG_ID,
            Some(json!({"active": false})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["active"], false);
    assert_eq!(body["image_url"], "https://cdn.example/banner.png");

    // gone from the public carousel, still listed for admins
    let resp = h.router.clone().oneshot(get("/api/banners")).await.unwrap();
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 0);

    let resp = h
        .router
        .clone()
        .oneshot(admin_req("GET", "/api/admin/banners", ADMIN_TG_ID, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn adjudicating_a_processed_withdrawal_is_409() {
    let h = harness();
    let user_id = seed_user(&h.store, 100).await;
    let task_id = seed_channel_task(&h.store, 200, "news").await;
    h.verifier.set_member(100, "news", true);

    h.router
        .clone()
        .oneshot(post_as_user(
            &format!("/api/tasks/{}/verify", task_id),
            user_id,
            json!({}),
        ))
        .await
        .unwrap();
    let resp = h
        .router
        .clone()
        .oneshot(post_as_user("/api/withdrawals", user_id, json!({"amount": 150})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let withdrawal_id = json_body(resp).await["id"].as_i64().unwrap();

    let approve = format!("/api/admin/withdrawals/{}/approve", withdrawal_id);
    let resp = h
        .router
        .clone()
        .oneshot(admin_req("POST", &approve, ADMIN_TG_ID, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = h
        .router
        .clone()
        .oneshot(admin_req("POST", &approve, ADMIN_TG_ID, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
