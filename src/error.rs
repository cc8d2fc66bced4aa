//! Error types for timer operations

use thiserror::Error;

use crate::state::{IssueId, UserId};

/// Reasons a timer action is rejected
///
/// Every variant is a rejected request, never a crash. The caller decides
/// whether to retry or surface the rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("user {owner} already has an active timer")]
    Conflict { owner: UserId },

    #[error("no timer found for user {owner}")]
    NotFound { owner: UserId },

    #[error("cannot {action} timer on issue {issue_id}: timer is {state}")]
    InvalidTransition {
        action: &'static str,
        issue_id: IssueId,
        state: &'static str,
    },

    #[error("timer store failure: {0}")]
    Store(String),
}

impl TimerError {
    /// Short machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            TimerError::MissingParameter(_) => "missing_parameter",
            TimerError::Conflict { .. } => "conflict",
            TimerError::NotFound { .. } => "not_found",
            TimerError::InvalidTransition { .. } => "invalid_transition",
            TimerError::Store(_) => "store",
        }
    }
}
