use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request},
    response::Response,
};
use server_api::session::mint_token;
use shared::domain::AttendeeId;
use storage::InMemoryStore;
use tower::ServiceExt;

const USER_ID: &str = "87aa1ce5-a727-4044-b00c-4014a23e8912";

fn session() -> SessionConfig {
    SessionConfig {
        secret: "test-secret".to_string(),
        issuer: "gighub".to_string(),
        ttl_seconds: 60,
    }
}

fn test_app(store: InMemoryStore) -> Router {
    build_router(Arc::new(AppState {
        api: ApiContext::new(store),
        session: session(),
    }))
}

fn bearer(user_id: &str) -> String {
    let token = mint_token(&session(), &AttendeeId::new(user_id)).expect("token");
    format!("Bearer {token}")
}

fn attend_request(user_id: &str, body: &str) -> Request<Body> {
    Request::post("/api/attendances")
        .header(header::AUTHORIZATION, bearer(user_id))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn delete_request(user_id: &str, gig_id: i64) -> Request<Body> {
    Request::delete(format!("/api/attendances/{gig_id}"))
        .header(header::AUTHORIZATION, bearer(user_id))
        .body(Body::empty())
        .expect("request")
}

async fn body_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec()
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app(InMemoryStore::new());
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn attend_valid_request_returns_empty_ok() {
    let store = InMemoryStore::new();
    let app = test_app(store.clone());

    let response = app
        .oneshot(attend_request(USER_ID, r#"{"GigId":1}"#))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(
        store.snapshot().await,
        vec![Attendance::new(GigId(1), AttendeeId::new(USER_ID))]
    );
}

#[tokio::test]
async fn attend_existing_attendance_returns_bad_request() {
    let store =
        InMemoryStore::with_attendances([Attendance::new(GigId(1), AttendeeId::new(USER_ID))]);
    let app = test_app(store.clone());

    let response = app
        .oneshot(attend_request(USER_ID, r#"{"gigId":1}"#))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(error.code, ErrorCode::DuplicateAttendance);
    assert_eq!(error.message, "The attendance already exists.");
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn delete_without_attendance_returns_not_found() {
    let store = InMemoryStore::new();
    let app = test_app(store.clone());

    let response = app
        .oneshot(delete_request(USER_ID, 1))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ApiError = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(error.code, ErrorCode::NotFound);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn delete_valid_request_returns_deleted_gig_id() {
    let store =
        InMemoryStore::with_attendances([Attendance::new(GigId(1), AttendeeId::new(USER_ID))]);
    let app = test_app(store.clone());

    let response = app
        .oneshot(delete_request(USER_ID, 1))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let gig_id: i64 = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(gig_id, 1);
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn attendance_routes_require_a_valid_session() {
    let app = test_app(InMemoryStore::new());

    let missing = Request::post("/api/attendances")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"gigId":1}"#))
        .expect("request");
    let response = app.clone().oneshot(missing).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let garbage = Request::delete("/api/attendances/1")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(garbage).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error: ApiError = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(error.code, ErrorCode::Unauthorized);

    let wrong_scheme = Request::get("/api/attendances")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(wrong_scheme).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn attendee_comes_from_session_not_payload() {
    let store = InMemoryStore::new();
    let app = test_app(store.clone());

    let response = app
        .oneshot(attend_request(
            USER_ID,
            r#"{"gigId":4,"attendeeId":"someone-else"}"#,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        store.snapshot().await,
        vec![Attendance::new(GigId(4), AttendeeId::new(USER_ID))]
    );
}

#[tokio::test]
async fn attend_delete_round_trip_through_routes() {
    let store = InMemoryStore::new();
    let app = test_app(store.clone());

    let response = app
        .clone()
        .oneshot(attend_request(USER_ID, r#"{"gigId":1}"#))
        .await
        .expect("attend");
    assert_eq!(response.status(), StatusCode::OK);

    let list = Request::get("/api/attendances")
        .header(header::AUTHORIZATION, bearer(USER_ID))
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(list).await.expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Vec<Attendance> =
        serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(
        listed,
        vec![Attendance::new(GigId(1), AttendeeId::new(USER_ID))]
    );

    let response = app
        .clone()
        .oneshot(delete_request(USER_ID, 1))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(delete_request(USER_ID, 1))
        .await
        .expect("delete again");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn malformed_attend_body_is_rejected_without_mutation() {
    let store = InMemoryStore::new();
    let app = test_app(store.clone());

    let response = app
        .oneshot(attend_request(USER_ID, r#"{"gigId":"one"}"#))
        .await
        .expect("response");

    assert!(response.status().is_client_error());
    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn routes_work_against_sqlite_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let app = build_router(Arc::new(AppState {
        api: ApiContext::new(storage),
        session: session(),
    }));

    let response = app
        .clone()
        .oneshot(attend_request(USER_ID, r#"{"gigId":1}"#))
        .await
        .expect("attend");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(attend_request(USER_ID, r#"{"gigId":1}"#))
        .await
        .expect("attend again");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(delete_request(USER_ID, 1))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn storage_failures_do_not_leak_their_cause() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.pool().close().await;
    let app = build_router(Arc::new(AppState {
        api: ApiContext::new(storage),
        session: session(),
    }));

    let response = app
        .clone()
        .oneshot(attend_request(USER_ID, r#"{"gigId":1}"#))
        .await
        .expect("attend");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: ApiError = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(error.code, ErrorCode::Internal);
    assert_eq!(error.message, "internal error");

    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("healthz");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error: ApiError = serde_json::from_slice(&body_bytes(response).await).expect("json");
    assert_eq!(error.message, "storage unavailable");
}

#[tokio::test]
async fn tokens_outliving_the_session_ttl_are_unauthorized() {
    let app = test_app(InMemoryStore::new());
    let long_lived = mint_token(
        &SessionConfig {
            ttl_seconds: 3600,
            ..session()
        },
        &AttendeeId::new(USER_ID),
    )
    .expect("token");

    let request = Request::get("/api/attendances")
        .header(header::AUTHORIZATION, format!("Bearer {long_lived}"))
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
