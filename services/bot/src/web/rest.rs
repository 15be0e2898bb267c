//! services/bot/src/web/rest.rs
//!
//! Contains the Axum handlers for the admin REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use lead_bot_core::domain::{ConversationState, Session, SessionStats};
use lead_bot_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::inbound::inbound_message_handler,
        list_users_handler,
        list_users_by_state_handler,
        list_completed_handler,
        stats_handler,
        delete_user_handler,
        health_handler,
    ),
    components(
        schemas(
            crate::web::inbound::InboundPayload,
            crate::web::inbound::InboundResponse,
            crate::web::inbound::ReplyView,
            SessionView,
            UsersResponse,
            RegistrationsResponse,
            StatsView,
            StateCount,
            StatsResponse,
            DeleteResponse,
            ErrorResponse,
            HealthResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Lead Registration Bot", description = "Inbound message webhook and admin query endpoints.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the admin paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

//=========================================================================================
// API Response Structs
//=========================================================================================

/// A session as shown to administrators, with the channel suffix stripped.
#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub chat_id: String,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub state: String,
    pub registration_complete: bool,
    pub login_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl SessionView {
    fn from_session(session: &Session, suffix: &str) -> Self {
        Self {
            chat_id: session.short_id(suffix).to_string(),
            display_name: session.display_name.clone(),
            full_name: session.full_name.clone(),
            email: session.email.clone(),
            state: session.state.to_string(),
            registration_complete: session.registration_complete,
            login_url: session.login_url.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            last_activity_at: session.last_activity_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsersResponse {
    pub success: bool,
    pub total_users: usize,
    pub users: Vec<SessionView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationsResponse {
    pub success: bool,
    pub total_registrations: usize,
    pub registrations: Vec<SessionView>,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateCount {
    pub current_state: String,
    pub count: u64,
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_users: u64,
    pub completed_registrations: u64,
    pub pending_registrations: u64,
    pub state_stats: Vec<StateCount>,
}

impl From<SessionStats> for StatsView {
    fn from(stats: SessionStats) -> Self {
        Self {
            total_users: stats.total,
            completed_registrations: stats.completed,
            pending_registrations: stats.pending,
            state_stats: stats
                .by_state
                .into_iter()
                .map(|(state, count)| StateCount {
                    current_state: state.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: StatsView,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub timestamp: DateTime<Utc>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn store_failure(e: PortError) -> HandlerError {
    error!("Session store error: {:?}", e);
    let status = match e {
        PortError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new("Database error")))
}

fn views(sessions: &[Session], suffix: &str) -> Vec<SessionView> {
    sessions
        .iter()
        .map(|s| SessionView::from_session(s, suffix))
        .collect()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List every session, most recently active first.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All sessions", body = UsersResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_users_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let sessions = app_state.store().list_all().await.map_err(store_failure)?;
    let users = views(&sessions, &app_state.config.correspondent_suffix);
    Ok(Json(UsersResponse {
        success: true,
        total_users: users.len(),
        users,
    }))
}

/// List sessions currently in one conversation state.
#[utoipa::path(
    get,
    path = "/api/users/state/{state}",
    params(
        ("state" = String, Path, description = "Conversation state, e.g. `awaiting_email`.")
    ),
    responses(
        (status = 200, description = "Sessions in the state", body = UsersResponse),
        (status = 400, description = "Unknown state", body = ErrorResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_users_by_state_handler(
    State(app_state): State<Arc<AppState>>,
    Path(state): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let state = state
        .parse::<ConversationState>()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string()))))?;
    let sessions = app_state.store().list_by_state(state).await.map_err(store_failure)?;
    let users = views(&sessions, &app_state.config.correspondent_suffix);
    Ok(Json(UsersResponse {
        success: true,
        total_users: users.len(),
        users,
    }))
}

/// List completed registrations, newest first.
#[utoipa::path(
    get,
    path = "/api/registrations/completed",
    responses(
        (status = 200, description = "Completed registrations", body = RegistrationsResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_completed_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let sessions = app_state.store().list_completed().await.map_err(store_failure)?;
    let registrations = views(&sessions, &app_state.config.correspondent_suffix);
    Ok(Json(RegistrationsResponse {
        success: true,
        total_registrations: registrations.len(),
        registrations,
    }))
}

/// Aggregate counts over all sessions.
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Session statistics", body = StatsResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = app_state.store().stats().await.map_err(store_failure)?;
    Ok(Json(StatsResponse {
        success: true,
        stats: stats.into(),
    }))
}

/// Delete a session. The channel suffix may be omitted from the identifier.
#[utoipa::path(
    delete,
    path = "/api/users/{chat_id}",
    params(
        ("chat_id" = String, Path, description = "Correspondent identifier, with or without channel suffix.")
    ),
    responses(
        (status = 200, description = "Session deleted", body = DeleteResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "No such session", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_user_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let correspondent_id = if chat_id.contains('@') {
        chat_id
    } else {
        format!("{}{}", chat_id, app_state.config.correspondent_suffix)
    };

    let removed = app_state
        .store()
        .delete(&correspondent_id)
        .await
        .map_err(store_failure)?;
    if !removed {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::new("User not found"))));
    }
    info!(correspondent = %correspondent_id, "Session deleted by admin");
    Ok(Json(DeleteResponse {
        success: true,
        message: "User deleted successfully".to_string(),
    }))
}

/// Liveness check, reporting which session backend is active.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        storage: app_state.store().backend_name().to_string(),
        timestamp: Utc::now(),
    })
}
