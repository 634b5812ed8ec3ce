use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use server_api::{
    attend, delete_attendance, list_attendances, session::SessionConfig, ApiContext,
    AttendanceError,
};
use shared::{
    domain::{Attendance, GigId},
    error::{ApiError, ErrorCode},
    protocol::AttendanceDto,
};
use storage::Storage;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod auth;
mod config;

use app_state::AppState;
use auth::CurrentUser;
use config::{load_settings, normalize_database_url};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext::new(storage),
        session: SessionConfig {
            secret: settings.auth_secret,
            issuer: settings.auth_issuer,
            ttl_seconds: settings.token_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/attendances",
            get(http_list_attendances).post(http_attend),
        )
        .route("/api/attendances/:gig_id", delete(http_delete_attendance))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::DuplicateAttendance => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn attendance_error(err: AttendanceError) -> (StatusCode, Json<ApiError>) {
    if let AttendanceError::Storage(cause) = &err {
        error!(error = %cause, "attendance storage failure");
    }
    let body = ApiError::from(err);
    (status_for(body.code), Json(body))
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.api.store.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, "storage unavailable")),
        )
    })?;
    Ok("ok")
}

async fn http_attend(
    State(state): State<Arc<AppState>>,
    CurrentUser(attendee_id): CurrentUser,
    Json(dto): Json<AttendanceDto>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    attend(&state.api, &attendee_id, &dto)
        .await
        .map_err(attendance_error)?;
    Ok(StatusCode::OK)
}

async fn http_delete_attendance(
    State(state): State<Arc<AppState>>,
    CurrentUser(attendee_id): CurrentUser,
    Path(gig_id): Path<i64>,
) -> Result<Json<GigId>, (StatusCode, Json<ApiError>)> {
    let deleted = delete_attendance(&state.api, &attendee_id, GigId(gig_id))
        .await
        .map_err(attendance_error)?;
    Ok(Json(deleted))
}

async fn http_list_attendances(
    State(state): State<Arc<AppState>>,
    CurrentUser(attendee_id): CurrentUser,
) -> Result<Json<Vec<Attendance>>, (StatusCode, Json<ApiError>)> {
    let attendances = list_attendances(&state.api, &attendee_id)
        .await
        .map_err(attendance_error)?;
    Ok(Json(attendances))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
