//! Management HTTP API: user administration and a view of live sessions.
//! Runs on its own port, JSON in and out; this surface is for operators,
//! not AIM clients.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use causerie_store::{ident_of, ScreenName, StoreError, User, UserStore};

use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionRegistry>,
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("User already exists")]
    DupUser,

    #[error("User does not exist")]
    NoUser,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DupUser => ApiError::DupUser,
            StoreError::NoUser => ApiError::NoUser,
            other => ApiError::Store(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::DupUser => StatusCode::CONFLICT,
            ApiError::NoUser => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/user", get(list_users).post(create_user))
        .route("/user/{screen_name}", axum::routing::delete(delete_user))
        .route("/user/{screen_name}/password", put(set_password))
        .route("/session", get(list_sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct UserResponse {
    screen_name: String,
    ident: String,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    screen_name: String,
    password: String,
}

#[derive(Deserialize)]
struct SetPasswordRequest {
    password: String,
}

#[derive(Serialize)]
struct SessionResponse {
    screen_name: String,
    signon_time: chrono::DateTime<chrono::Utc>,
    remote_addr: Option<std::net::SocketAddr>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state
        .users
        .all_users()?
        .into_iter()
        .map(|u| UserResponse {
            screen_name: u.display,
            ident: u.ident,
        })
        .collect();
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if request.screen_name.trim().is_empty() {
        return Err(ApiError::BadRequest("screen_name must not be empty".into()));
    }
    if request.password.len() < 4 {
        return Err(ApiError::BadRequest(
            "password must be at least 4 characters".into(),
        ));
    }

    let screen_name = ScreenName::new(request.screen_name.trim());
    let mut user = User::new(&screen_name);
    user.set_password(&request.password);
    state.users.insert_user(&user)?;

    info!(screen_name = %screen_name, "user created via management api");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            screen_name: user.display,
            ident: user.ident,
        }),
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(screen_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.users.delete_user(&ident_of(&screen_name))?;
    info!(screen_name = %screen_name, "user deleted via management api");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_password(
    State(state): State<AppState>,
    Path(screen_name): Path<String>,
    Json(request): Json<SetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if request.password.len() < 4 {
        return Err(ApiError::BadRequest(
            "password must be at least 4 characters".into(),
        ));
    }
    let ident = ident_of(&screen_name);
    let mut user = state.users.user(&ident)?.ok_or(ApiError::NoUser)?;
    user.set_password(&request.password);
    state.users.set_password(&user)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionResponse>> {
    let sessions = state
        .sessions
        .all()
        .into_iter()
        .filter(|s| s.is_ready())
        .map(|s| SessionResponse {
            screen_name: s.display().to_owned(),
            signon_time: s.signon_time(),
            remote_addr: s.remote_addr(),
        })
        .collect();
    Json(sessions)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    info!(addr = %addr, "management API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
