//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use chrono::Utc;
use tracing::{error, warn};

use crate::{
    error::TimerError,
    state::{AppState, IssueId, UserId},
};
use super::responses::{
    ApiError, DiscardResponse, HealthResponse, ListResponse, StatusResponse, StopResponse,
    TimerResponse,
};

/// Header carrying the already-authenticated caller
pub const USER_HEADER: &str = "x-user-id";

/// Query parameters for POST /timers/start
#[derive(Debug, Deserialize)]
pub struct StartParams {
    pub issue_id: Option<IssueId>,
}

fn caller(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn require_caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    caller(headers).ok_or(ApiError::Unidentified)
}

fn log_rejection(action: &str, owner: UserId, e: &TimerError) {
    match e {
        TimerError::Store(_) => error!("{} failed for user {}: {}", action, owner, e),
        _ => warn!("{} rejected for user {}: {}", action, owner, e),
    }
}

/// Handle POST /timers/start - Start a timer on an issue
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<StartParams>,
) -> Result<Json<TimerResponse>, ApiError> {
    let owner = require_caller(&headers)?;

    let timer = state.machine.start(owner, params.issue_id).await.map_err(|e| {
        log_rejection("start", owner, &e);
        e
    })?;
    state.record_action("start");

    Ok(Json(TimerResponse::new(
        format!("Timer started on issue {}", timer.tracked_item_id),
        timer,
    )))
}

/// Handle POST /timers/resume - Resume a paused timer
pub async fn resume_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TimerResponse>, ApiError> {
    let owner = require_caller(&headers)?;

    let timer = state.machine.resume(owner).await.map_err(|e| {
        log_rejection("resume", owner, &e);
        e
    })?;
    state.record_action("resume");

    Ok(Json(TimerResponse::new("Timer resumed".to_string(), timer)))
}

/// Handle POST /timers/suspend - Pause a running timer
pub async fn suspend_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TimerResponse>, ApiError> {
    let owner = require_caller(&headers)?;

    let timer = state.machine.suspend(owner).await.map_err(|e| {
        log_rejection("suspend", owner, &e);
        e
    })?;
    state.record_action("suspend");

    Ok(Json(TimerResponse::new("Timer suspended".to_string(), timer)))
}

/// Handle POST /timers/stop - Stop the timer and record its hours
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StopResponse>, ApiError> {
    let owner = require_caller(&headers)?;

    let outcome = state.machine.stop(owner).await.map_err(|e| {
        log_rejection("stop", owner, &e);
        e
    })?;
    state.record_action("stop");

    Ok(Json(StopResponse::new(outcome, state.follow_up_form)))
}

/// Handle DELETE /timers - Discard the timer without recording
pub async fn discard_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DiscardResponse>, ApiError> {
    let owner = require_caller(&headers)?;

    state.machine.discard(owner).await.map_err(|e| {
        log_rejection("discard", owner, &e);
        e
    })?;
    state.record_action("discard");

    Ok(Json(DiscardResponse::ok()))
}

/// Handle GET /timers - List the caller's timer and everyone else's
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, ApiError> {
    let timers = state.machine.list(caller(&headers))?;

    Ok(Json(ListResponse {
        timestamp: Utc::now(),
        timers,
    }))
}

/// Handle GET /status - Return server status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let active_timers = state.machine.list(None)?.others.len();
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        active_timers,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
