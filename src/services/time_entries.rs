//! Time entry recording for stopped timers

use std::sync::Mutex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::{IssueId, UserId};

/// Hours worked, captured from a stopped timer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTimeEntry {
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub hours: f64,
    pub spent_on: DateTime<Utc>,
}

/// A persisted time entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeEntry {
    pub id: u64,
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub hours: f64,
    pub spent_on: DateTime<Utc>,
}

/// Persists hours against a tracked item
#[async_trait]
pub trait TimeEntryRecorder: Send + Sync {
    async fn record(&self, entry: NewTimeEntry) -> Result<TimeEntry>;
}

/// Round hours to the two decimal places a time entry keeps
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// In-process time entry log
#[derive(Debug, Default)]
pub struct MemoryTimeEntries {
    entries: Mutex<Vec<TimeEntry>>,
}

impl MemoryTimeEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TimeEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TimeEntryRecorder for MemoryTimeEntries {
    async fn record(&self, entry: NewTimeEntry) -> Result<TimeEntry> {
        let mut entries = self.entries
            .lock()
            .map_err(|e| anyhow!("Failed to lock time entries: {}", e))?;

        let recorded = TimeEntry {
            id: entries.len() as u64 + 1,
            issue_id: entry.issue_id,
            user_id: entry.user_id,
            hours: round_hours(entry.hours),
            spent_on: entry.spent_on,
        };
        entries.push(recorded.clone());

        info!("Recorded {:.2}h on issue {} for user {}", recorded.hours, recorded.issue_id, recorded.user_id);
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_hours(350.0 / 3600.0), 0.1);
        assert_eq!(round_hours(1.005_1), 1.01);
        assert_eq!(round_hours(0.0), 0.0);
    }

    #[tokio::test]
    async fn records_rounded_entries_in_order() {
        let recorder = MemoryTimeEntries::new();
        let spent_on = Utc::now();

        let first = recorder
            .record(NewTimeEntry { issue_id: 42, user_id: 1, hours: 1.234, spent_on })
            .await
            .unwrap();
        let second = recorder
            .record(NewTimeEntry { issue_id: 43, user_id: 1, hours: 0.0, spent_on })
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(first.hours, 1.23);
        assert_eq!(second.id, 2);
        assert_eq!(recorder.entries().len(), 2);
    }
}
