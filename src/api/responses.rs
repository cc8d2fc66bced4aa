//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    machine::{StopOutcome, TimerListing},
    state::{IssueId, TimerSnapshot},
};

/// Form a stopped timer sends the caller to, pre-filled with the hours
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpForm {
    NewTimeEntry,
    EditIssue,
}

/// Where to continue after a stop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub form: FollowUpForm,
    pub issue_id: IssueId,
    pub hours: f64,
}

/// Response for transitions that leave a timer in place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerSnapshot,
}

impl TimerResponse {
    pub fn new(message: String, timer: TimerSnapshot) -> Self {
        Self {
            status: timer.state.as_str().to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }
}

/// Response for a stopped timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: StopOutcome,
    pub follow_up: FollowUp,
}

impl StopResponse {
    pub fn new(outcome: StopOutcome, form: FollowUpForm) -> Self {
        let follow_up = FollowUp {
            form,
            issue_id: outcome.tracked_item_id,
            hours: outcome.elapsed_hours,
        };
        Self {
            status: "stopped".to_string(),
            message: format!("Timer stopped after {}s", outcome.elapsed_seconds),
            timestamp: Utc::now(),
            outcome,
            follow_up,
        }
    }
}

/// Response for a discarded timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscardResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl DiscardResponse {
    pub fn ok() -> Self {
        Self {
            status: "discarded".to_string(),
            message: "Timer discarded".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Timer listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub timers: TimerListing,
}

/// Server status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub active_timers: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Error body returned for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A rejected request
#[derive(Debug)]
pub enum ApiError {
    /// Caller identity header missing or malformed
    Unidentified,
    Timer(TimerError),
}

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        ApiError::Timer(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unidentified => StatusCode::UNAUTHORIZED,
            ApiError::Timer(e) => match e {
                TimerError::MissingParameter(_) | TimerError::InvalidTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                TimerError::Conflict { .. } => StatusCode::CONFLICT,
                TimerError::NotFound { .. } => StatusCode::NOT_FOUND,
                TimerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (error, message) = match &self {
            ApiError::Unidentified => ("unidentified", "X-User-Id header is required".to_string()),
            ApiError::Timer(e) => (e.kind(), e.to_string()),
        };
        let body = ErrorResponse {
            status: "error".to_string(),
            error: error.to_string(),
            message,
            timestamp: Utc::now(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
