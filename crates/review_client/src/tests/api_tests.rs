use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::domain::SearchField;
use tokio::{net::TcpListener, sync::Mutex};

use super::*;
use crate::query::ListFilter;

const KNOWN_SUMMARY: &str = "6f1c1a52-6a4c-4a1e-9a55-1f1d8d0f3c11";

#[derive(Clone, Default)]
struct ServerState {
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    diagnose_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    feedback_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

fn summary_json(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "patient_id": "p-1",
        "file_name": "notes.txt",
        "summary": "Fever and cough.",
        "keywords": ["fever", "cough"],
        "created_at": "2025-01-02T03:04:05Z"
    })
}

async fn list_summaries(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    state.list_queries.lock().await.push(params);
    Json(serde_json::json!({
        "summaries": [summary_json(KNOWN_SUMMARY)],
        "total": 31
    }))
}

async fn get_summary(Path(id): Path<String>) -> impl IntoResponse {
    if id == KNOWN_SUMMARY {
        (StatusCode::OK, Json(summary_json(&id)))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "detail": "Summary not found" })),
        )
    }
}

async fn current_diagnosis(Path(_id): Path<String>) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "detail": "No diagnosis yet" })),
    )
}

async fn history(Path(_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!([
        { "id": "0b7a4c2e-9f59-4d55-8a0e-2c1a7c4d9e01", "result": "older", "created_at": "2025-01-01T00:00:00" },
        { "id": "0b7a4c2e-9f59-4d55-8a0e-2c1a7c4d9e02", "result": "newer", "created_at": "2025-01-03T00:00:00" }
    ]))
}

async fn feedback(Path(_id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::Value::Null)
}

async fn diagnose(
    State(state): State<ServerState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state.diagnose_bodies.lock().await.push(body);
    Json(serde_json::json!({ "diagnosis": "Possible viral infection." }))
}

async fn submit_feedback(
    State(state): State<ServerState>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    state.feedback_bodies.lock().await.push(body.clone());
    Json(serde_json::json!({
        "id": "5a9f7f0e-3c3b-4b9e-8f5e-6d8a2b1c0d11",
        "summary_id": body["summary_id"],
        "helpful": body["helpful"],
        "comment": body["comment"],
        "created_at": "2025-01-04T00:00:00Z"
    }))
}

async fn login(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    if body["password"] == "secret" {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "access_token": "tok-123", "token_type": "bearer" })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Invalid credentials" })),
        )
    }
}

async fn account(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer tok-123");
    if authorized {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "username": "drhouse", "email": "house@example.org" })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Invalid token" })),
        )
    }
}

async fn slow_patients() -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(serde_json::json!([]))
}

async fn spawn_collaborator() -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::default();
    let app = Router::new()
        .route("/summaries", get(list_summaries))
        .route("/summaries/:id", get(get_summary))
        .route("/diagnosis/:id", get(current_diagnosis))
        .route("/diagnoses/:id", get(history))
        .route("/feedback/:id", get(feedback))
        .route("/diagnose", post(diagnose))
        .route("/feedback", post(submit_feedback))
        .route("/login", post(login))
        .route("/account", get(account))
        .route("/patients", get(slow_patients))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn client(server_url: &str) -> HttpReviewClient {
    HttpReviewClient::new(server_url, Duration::from_millis(500), AuthStore::new())
        .expect("client")
}

#[tokio::test]
async fn list_sends_pagination_and_single_filter() {
    let (server_url, state) = spawn_collaborator().await;
    let api = client(&server_url);

    let page = api
        .list_summaries(&ListRequest {
            page: 2,
            per_page: 10,
            filter: Some(ListFilter {
                field: SearchField::FileName,
                term: "notes".into(),
            }),
        })
        .await
        .expect("list");
    assert_eq!(page.total, 31);
    assert_eq!(page.summaries.len(), 1);

    let queries = state.list_queries.lock().await;
    let query = &queries[0];
    assert_eq!(query.get("page").map(String::as_str), Some("2"));
    assert_eq!(query.get("per_page").map(String::as_str), Some("10"));
    assert_eq!(query.get("file_name").map(String::as_str), Some("notes"));
    assert!(!query.contains_key("keyword"));
    assert!(!query.contains_key("patient_id"));
}

#[tokio::test]
async fn missing_resources_map_to_not_found() {
    let (server_url, _state) = spawn_collaborator().await;
    let api = client(&server_url);
    let summary_id: SummaryId = KNOWN_SUMMARY.parse().expect("id");

    let err = api
        .get_summary(SummaryId::new_v4())
        .await
        .expect_err("unknown summary");
    assert_eq!(err, ClientError::NotFound("Summary not found".into()));

    assert!(api
        .current_diagnosis(summary_id)
        .await
        .expect_err("no diagnosis")
        .is_not_found());
    assert!(api
        .feedback(summary_id)
        .await
        .expect_err("null feedback")
        .is_not_found());
}

#[tokio::test]
async fn diagnosis_roundtrip_uses_summary_text_and_id() {
    let (server_url, state) = spawn_collaborator().await;
    let api = client(&server_url);
    let summary = api
        .get_summary(KNOWN_SUMMARY.parse().expect("id"))
        .await
        .expect("summary");

    let generated = api
        .generate_diagnosis(&GenerateDiagnosisRequest {
            summary: summary.body.clone(),
            summary_id: summary.id,
        })
        .await
        .expect("generate");
    assert_eq!(generated.diagnosis, "Possible viral infection.");

    let bodies = state.diagnose_bodies.lock().await;
    assert_eq!(bodies[0]["summary"], "Fever and cough.");
    assert_eq!(bodies[0]["summary_id"], KNOWN_SUMMARY);

    let history = api.diagnosis_history(summary.id).await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|entry| entry.id.is_some()));
}

#[tokio::test]
async fn feedback_submission_posts_expected_body() {
    let (server_url, state) = spawn_collaborator().await;
    let api = client(&server_url);
    let summary_id: SummaryId = KNOWN_SUMMARY.parse().expect("id");

    let created = api
        .submit_feedback(&FeedbackRequest {
            summary_id,
            helpful: true,
            comment: "helped a lot".into(),
        })
        .await
        .expect("submit");
    assert!(created.helpful);
    assert_eq!(created.comment.as_deref(), Some("helped a lot"));

    let bodies = state.feedback_bodies.lock().await;
    assert_eq!(bodies[0]["helpful"], true);
    assert_eq!(bodies[0]["summary_id"], KNOWN_SUMMARY);
}

#[tokio::test]
async fn bearer_token_follows_auth_store() {
    let (server_url, _state) = spawn_collaborator().await;
    let api = client(&server_url);

    assert!(matches!(
        api.account().await,
        Err(ClientError::Unauthorized(_))
    ));

    let err = api
        .auth()
        .login(&api, "house@example.org", "wrong")
        .await
        .expect_err("bad password");
    assert_eq!(err, ClientError::Unauthorized("Invalid credentials".into()));
    assert!(!api.auth().current().is_signed_in());

    api.auth()
        .login(&api, "house@example.org", "secret")
        .await
        .expect("login");
    let account = api.account().await.expect("account");
    assert_eq!(account.username, "drhouse");

    api.auth().logout();
    assert!(api.account().await.is_err());
}

#[tokio::test]
async fn slow_responses_surface_as_timeout() {
    let (server_url, _state) = spawn_collaborator().await;
    let api = client(&server_url);

    let err = api.list_patients().await.expect_err("timeout");
    assert_eq!(err, ClientError::Timeout(Duration::from_millis(500)));
    assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
}

#[tokio::test]
async fn unreachable_server_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = client(&format!("http://{addr}"));
    let err = api
        .get_summary(SummaryId::new_v4())
        .await
        .expect_err("refused");
    assert!(matches!(err, ClientError::Transport(_)), "{err:?}");
}

#[test]
fn endpoint_keeps_base_path_and_escapes_segments() {
    let api = HttpReviewClient::new(
        "http://example.org/api",
        DEFAULT_REQUEST_TIMEOUT,
        AuthStore::new(),
    )
    .expect("client");
    assert_eq!(
        api.endpoint(&["patients", "a/b"]).as_str(),
        "http://example.org/api/patients/a%2Fb"
    );

    let api = HttpReviewClient::new("http://example.org/", DEFAULT_REQUEST_TIMEOUT, AuthStore::new())
        .expect("client");
    assert_eq!(
        api.endpoint(&["summaries"]).as_str(),
        "http://example.org/summaries"
    );
}

#[test]
fn rejects_unusable_server_urls() {
    for raw in ["", "   ", "not a url", "mailto:someone@example.org"] {
        let result = HttpReviewClient::new(raw, DEFAULT_REQUEST_TIMEOUT, AuthStore::new());
        assert!(
            matches!(result, Err(ClientError::Validation(_))),
            "{raw} should be rejected"
        );
    }
}
