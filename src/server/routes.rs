//! REST endpoints: refresh triggering and polling, events, teams.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use chrono::{Datelike, Local};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::{AdminConfig, MiningConfig};
use crate::events::model::{HistoryEvent, Team};
use crate::mining::EventMiner;
use crate::server::auth;
use crate::store::EventStore;
use crate::tasks::model::RefreshMode;
use crate::tasks::registry::TaskRegistry;
use crate::tasks::runner::RefreshRunner;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub registry: Arc<TaskRegistry>,
    pub runner: Arc<RefreshRunner>,
    pub miner: Arc<dyn EventMiner>,
    pub mining: MiningConfig,
    /// Basic-auth credentials for `/api/admin`; `None` disables the check.
    pub admin: Option<AdminConfig>,
}

/// Build the Axum router with all REST routes.
pub fn api_routes(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin/check-auth", get(check_auth))
        .route("/api/admin/refresh", post(start_refresh))
        .route("/api/admin/tasks", get(list_tasks))
        .route("/api/admin/tasks/{id}", get(get_task))
        .route("/api/admin/teams", post(create_team))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .merge(admin)
        .route("/health", get(health))
        .route("/api/teams", get(list_teams))
        .route("/api/events/today", get(today_events))
        .route("/api/events/fetch-ai", post(fetch_ai))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("{what} not found") })),
    )
        .into_response()
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "club-history"
    }))
}

// ── Admin: refresh tasks ────────────────────────────────────────────

async fn check_auth() -> impl IntoResponse {
    "Authenticated"
}

#[derive(Debug, Deserialize)]
struct RefreshParams {
    team_id: i64,
    #[serde(default)]
    full: bool,
}

/// Trigger a refresh. Returns the task ID immediately; all mining happens
/// in a spawned task observed through the polling endpoints.
async fn start_refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> Response {
    let team = match state.store.team(params.team_id).await {
        Ok(Some(team)) => team,
        Ok(None) => return not_found("team"),
        Err(e) => return internal_error(e),
    };

    let mode = if params.full {
        RefreshMode::Full
    } else {
        RefreshMode::Incremental
    };

    let task = state.registry.create(team.id, mode).await;
    let task_id = task.id().to_string();
    Arc::clone(&state.runner).spawn(task, team);

    info!(task_id = %task_id, team_id = params.team_id, mode = %mode, "Refresh triggered");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "taskId": task_id })),
    )
        .into_response()
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.registry.get(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => not_found("task"),
    }
}

async fn list_tasks(State(state): State<AppState>) -> Response {
    Json(state.registry.list_all().await).into_response()
}

// ── Admin: teams ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateTeamRequest {
    name: String,
    display_name: String,
    #[serde(default)]
    logo_url: Option<String>,
}

async fn create_team(
    State(state): State<AppState>,
    Json(request): Json<CreateTeamRequest>,
) -> Response {
    let mut team = Team {
        id: 0,
        name: request.name,
        display_name: request.display_name,
        logo_url: request.logo_url,
    };
    match state.store.insert_team(&team).await {
        Ok(id) => {
            team.id = id;
            (StatusCode::CREATED, Json(team)).into_response()
        }
        Err(e) => internal_error(e),
    }
}

// ── Public: teams and events ────────────────────────────────────────

async fn list_teams(State(state): State<AppState>) -> Response {
    match state.store.list_teams().await {
        Ok(teams) => Json(teams).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct TodayParams {
    team_id: Option<i64>,
}

/// Today's history events — for one team, or across all teams when no
/// `team_id` is given.
async fn today_events(
    State(state): State<AppState>,
    Query(params): Query<TodayParams>,
) -> Response {
    let today = Local::now().date_naive();
    let (month, day) = (today.month(), today.day());

    let result = match params.team_id {
        Some(team_id) => state.store.events_by_team_and_date(team_id, month, day).await,
        None => state.store.events_by_date(month, day).await,
    };

    match result {
        Ok(events) => Json(events).into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct FetchAiParams {
    team_id: i64,
}

/// Single-shot mining of today's date over the whole year window, without
/// chunking or a task. Persists only years not already covered and returns
/// the newly saved events.
async fn fetch_ai(State(state): State<AppState>, Query(params): Query<FetchAiParams>) -> Response {
    let team = match state.store.team(params.team_id).await {
        Ok(Some(team)) => team,
        Ok(None) => return not_found("team"),
        Err(e) => return internal_error(e),
    };

    let today = Local::now().date_naive();
    let (month, day) = (today.month(), today.day());

    let existing = match state.store.events_by_team_and_date(team.id, month, day).await {
        Ok(events) => events,
        Err(e) => return internal_error(e),
    };
    let mut covered: BTreeSet<i32> = existing.iter().map(|e| e.year).collect();
    let excluded: Vec<i32> = covered.iter().copied().collect();

    let candidates = match state
        .miner
        .fetch_candidates(
            &team,
            month,
            day,
            state.mining.min_year,
            state.mining.max_year,
            &excluded,
        )
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => return internal_error(e),
    };

    let mut saved = Vec::new();
    for candidate in candidates {
        if !covered.insert(candidate.year) {
            continue;
        }
        let mut event = HistoryEvent::new(
            team.id,
            month,
            day,
            candidate.year,
            candidate.title,
            candidate.description,
            candidate.category,
        );
        event.image_url = candidate.image_url;

        match state.store.insert_event(&event).await {
            Ok(id) => {
                event.id = Some(id);
                saved.push(event);
            }
            Err(e) => return internal_error(e),
        }
    }

    Json(saved).into_response()
}
