use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use buddy_core::coach::{Coach, asks_for_instructions};
use buddy_core::model::{Assignment, ChatMessage, PlanItem};
use buddy_core::orchestrator::PlanOrchestrator;
use buddy_core::planner::pick_best_next_action;
use buddy_core::rails::{enforce, normalize_weekly_plan};
use buddy_core::source::CourseworkError;

use crate::plan_cmd::PlanReport;

/// Header carrying the caller's already-verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppState {
    orchestrator: PlanOrchestrator,
    coach: Coach,
    /// Fixed "today" for tests; `None` uses the local date per request.
    today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(orchestrator: PlanOrchestrator) -> Self {
        let coach = Coach::new(orchestrator.generative().clone());
        Self {
            orchestrator,
            coach,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatSendRequest {
    pub user_message: String,
    /// Untrusted; goes through the plan rails before use.
    #[serde(default)]
    pub current_plan: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatSendResponse {
    pub assistant_message: ChatMessage,
    pub best_next_action: PlanItem,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/plan/week", get(plan_week))
        .route("/chat/send", post(chat_send))
        .route("/classroom/assignments", get(classroom_assignments))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("buddy serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("buddy serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn user_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

async fn plan_week(State(state): State<AppState>, headers: HeaderMap) -> Json<PlanReport> {
    let (plan, provenance) = state
        .orchestrator
        .produce_plan(user_id(&headers), state.today())
        .await;
    Json(PlanReport::new(plan, provenance))
}

async fn chat_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatSendRequest>,
) -> Result<Json<ChatSendResponse>, AppError> {
    let user_message = request.user_message.trim();
    if user_message.is_empty() {
        return Err(AppError::bad_request("user_message must not be empty"));
    }

    let today = state.today();
    let supplied = request
        .current_plan
        .as_ref()
        .and_then(|raw| normalize_weekly_plan(raw, today));
    let plan = match supplied {
        Some(plan) => enforce(plan, today),
        None => {
            let (plan, _provenance) = state
                .orchestrator
                .produce_plan(user_id(&headers), today)
                .await;
            plan
        }
    };

    let best_next_action = pick_best_next_action(&plan);
    let source = if asks_for_instructions(user_message) {
        source_assignment(&state, user_id(&headers), &best_next_action, today).await
    } else {
        None
    };
    let text = state
        .coach
        .reply_about(user_message, &best_next_action, source.as_ref())
        .await;

    Ok(Json(ChatSendResponse {
        assistant_message: ChatMessage::assistant(text),
        best_next_action,
    }))
}

/// Look up the assignment `action` was planned from, through the same tiers
/// the plan uses.
async fn source_assignment(
    state: &AppState,
    user_id: Option<&str>,
    action: &PlanItem,
    today: NaiveDate,
) -> Option<Assignment> {
    let id = action.source_assignment_id.as_deref()?;
    let (assignments, _provenance) = state
        .orchestrator
        .resolver()
        .select_assignments(user_id, today)
        .await;
    assignments.into_iter().find(|a| a.id == id)
}

async fn classroom_assignments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Assignment>>, AppError> {
    let user_id = user_id(&headers).ok_or_else(|| AppError::unauthorized("missing user id"))?;
    let resolver = state.orchestrator.resolver();
    let source = resolver
        .coursework()
        .ok_or_else(|| AppError::unauthorized("classroom is not connected"))?;

    match tokio::time::timeout(resolver.timeout(), source.fetch_assignments(user_id)).await {
        Ok(Ok(assignments)) => Ok(Json(
            assignments.into_iter().filter(Assignment::is_valid).collect(),
        )),
        Ok(Err(CourseworkError::Unauthorized(reason))) => {
            tracing::warn!(reason = %reason, "classroom rejected credentials");
            Err(AppError::unauthorized("classroom credentials rejected"))
        }
        Ok(Err(CourseworkError::Unreachable(reason))) => {
            tracing::warn!(reason = %reason, "classroom unreachable");
            Err(AppError::bad_gateway("classroom unreachable"))
        }
        Err(_elapsed) => {
            tracing::warn!(timeout_secs = resolver.timeout().as_secs(), "classroom timed out");
            Err(AppError::bad_gateway("classroom unreachable"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
