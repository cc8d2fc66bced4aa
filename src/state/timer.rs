//! Timer entity and elapsed-time arithmetic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a user owning a timer
pub type UserId = u64;
/// Identifier of the tracked work item
pub type IssueId = u64;
/// Identifier assigned to a timer by the store
pub type TimerId = u64;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Observable state of an existing timer. No timer at all means idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    Running,
    Paused,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

/// One in-progress timing session for a single owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timer {
    pub id: TimerId,
    pub owner: UserId,
    pub tracked_item_id: IssueId,
    /// Start of the current running interval. Ignored while paused.
    pub started_at: Option<DateTime<Utc>>,
    /// Sum of all running intervals completed before the current one
    pub accumulated_seconds: u64,
    pub paused: bool,
}

impl Timer {
    /// Create a running timer. The id is assigned by the store on create.
    pub fn start(owner: UserId, tracked_item_id: IssueId, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            owner,
            tracked_item_id,
            started_at: Some(now),
            accumulated_seconds: 0,
            paused: false,
        }
    }

    pub fn status(&self) -> TimerStatus {
        if self.paused {
            TimerStatus::Paused
        } else {
            TimerStatus::Running
        }
    }

    pub fn is_running(&self) -> bool {
        !self.paused
    }

    /// Total running time at `now`, excluding paused intervals.
    ///
    /// A start time ahead of `now` contributes nothing rather than going negative.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        match (self.paused, self.started_at) {
            (false, Some(started_at)) => {
                let running = (now - started_at).num_seconds().max(0) as u64;
                self.accumulated_seconds.saturating_add(running)
            }
            _ => self.accumulated_seconds,
        }
    }

    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        self.elapsed_seconds(now) as f64 / SECONDS_PER_HOUR
    }

    /// Fold the current running interval into the accumulated total and pause
    pub fn suspend_at(&mut self, now: DateTime<Utc>) {
        self.accumulated_seconds = self.elapsed_seconds(now);
        self.started_at = None;
        self.paused = true;
    }

    /// Open a new running interval
    pub fn resume_at(&mut self, now: DateTime<Utc>) {
        self.started_at = Some(now);
        self.paused = false;
    }
}

/// Read-only view of a timer evaluated at a given instant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub owner: UserId,
    pub tracked_item_id: IssueId,
    pub state: TimerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub accumulated_seconds: u64,
    pub elapsed_seconds: u64,
    pub paused: bool,
}

impl TimerSnapshot {
    pub fn at(timer: &Timer, now: DateTime<Utc>) -> Self {
        Self {
            id: timer.id,
            owner: timer.owner,
            tracked_item_id: timer.tracked_item_id,
            state: timer.status(),
            started_at: timer.started_at,
            accumulated_seconds: timer.accumulated_seconds,
            elapsed_seconds: timer.elapsed_seconds(now),
            paused: timer.paused,
        }
    }
}
