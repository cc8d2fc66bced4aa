//! Post-start workflow status transition

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{IssueId, UserId};

/// Identifier of a workflow status on a tracked item
pub type StatusId = u64;

/// Journal note written when a timer start moves an issue forward
pub const TRANSITION_NOTE: &str = "Status changed by time logger";

/// Hook invoked after a successful start.
///
/// Best-effort: the state machine logs and swallows any error, so a failing
/// hook never fails the start it follows.
#[async_trait]
pub trait StatusTransitionHook: Send + Sync {
    async fn apply(&self, issue_id: IssueId, acting_user: UserId) -> Result<()>;
}

/// Hook used when no transition mapping is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransitionHook;

#[async_trait]
impl StatusTransitionHook for NoopTransitionHook {
    async fn apply(&self, _issue_id: IssueId, _acting_user: UserId) -> Result<()> {
        Ok(())
    }
}

/// Access to tracked items and their workflow
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn current_status(&self, issue_id: IssueId) -> Result<StatusId>;

    /// Statuses `user` may move the issue to from where it is now
    async fn allowed_statuses(&self, issue_id: IssueId, user: UserId) -> Result<Vec<StatusId>>;

    async fn set_status(
        &self,
        issue_id: IssueId,
        status: StatusId,
        user: UserId,
        note: &str,
    ) -> Result<()>;
}

/// Moves an issue to the status mapped from its current one, when the
/// acting user is permitted to set it
pub struct WorkflowTransitionHook<T> {
    tracker: Arc<T>,
    transitions: HashMap<StatusId, StatusId>,
}

impl<T: IssueTracker> WorkflowTransitionHook<T> {
    pub fn new(tracker: Arc<T>, transitions: HashMap<StatusId, StatusId>) -> Self {
        Self { tracker, transitions }
    }
}

#[async_trait]
impl<T: IssueTracker> StatusTransitionHook for WorkflowTransitionHook<T> {
    async fn apply(&self, issue_id: IssueId, acting_user: UserId) -> Result<()> {
        let current = self.tracker.current_status(issue_id).await?;

        let Some(&target) = self.transitions.get(&current) else {
            debug!("No status transition configured from status {} for issue {}", current, issue_id);
            return Ok(());
        };

        let allowed = self.tracker.allowed_statuses(issue_id, acting_user).await?;
        if !allowed.contains(&target) {
            debug!(
                "User {} may not move issue {} to status {}, skipping transition",
                acting_user, issue_id, target
            );
            return Ok(());
        }

        self.tracker
            .set_status(issue_id, target, acting_user, TRANSITION_NOTE)
            .await?;
        info!("Issue {} moved from status {} to {} by user {}", issue_id, current, target, acting_user);
        Ok(())
    }
}

/// Journal line recorded for each status change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Journal {
    pub issue_id: IssueId,
    pub user_id: UserId,
    pub from: StatusId,
    pub to: StatusId,
    pub note: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TrackerData {
    statuses: HashMap<IssueId, StatusId>,
    workflow: HashMap<StatusId, HashSet<StatusId>>,
    permitted: HashMap<UserId, HashSet<StatusId>>,
    journals: Vec<Journal>,
}

/// In-process issue tracker.
///
/// A user may set a status when the workflow allows it from the issue's
/// current status and the user holds permission for that status.
#[derive(Debug, Default)]
pub struct MemoryIssueTracker {
    data: Mutex<TrackerData>,
}

impl MemoryIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, TrackerData>> {
        self.data
            .lock()
            .map_err(|e| anyhow!("Failed to lock issue tracker: {}", e))
    }

    pub fn insert_issue(&self, issue_id: IssueId, status: StatusId) -> Result<()> {
        self.lock()?.statuses.insert(issue_id, status);
        Ok(())
    }

    pub fn allow_transition(&self, from: StatusId, to: StatusId) -> Result<()> {
        self.lock()?.workflow.entry(from).or_default().insert(to);
        Ok(())
    }

    pub fn grant(&self, user: UserId, status: StatusId) -> Result<()> {
        self.lock()?.permitted.entry(user).or_default().insert(status);
        Ok(())
    }

    pub fn status_of(&self, issue_id: IssueId) -> Option<StatusId> {
        self.lock().ok()?.statuses.get(&issue_id).copied()
    }

    pub fn journals(&self) -> Vec<Journal> {
        self.lock().map(|data| data.journals.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl IssueTracker for MemoryIssueTracker {
    async fn current_status(&self, issue_id: IssueId) -> Result<StatusId> {
        self.lock()?
            .statuses
            .get(&issue_id)
            .copied()
            .ok_or_else(|| anyhow!("Issue {} not found", issue_id))
    }

    async fn allowed_statuses(&self, issue_id: IssueId, user: UserId) -> Result<Vec<StatusId>> {
        let data = self.lock()?;
        let current = data
            .statuses
            .get(&issue_id)
            .ok_or_else(|| anyhow!("Issue {} not found", issue_id))?;

        let (Some(next), Some(permitted)) = (data.workflow.get(current), data.permitted.get(&user)) else {
            return Ok(Vec::new());
        };

        let mut allowed: Vec<StatusId> = next.intersection(permitted).copied().collect();
        allowed.sort_unstable();
        Ok(allowed)
    }

    async fn set_status(
        &self,
        issue_id: IssueId,
        status: StatusId,
        user: UserId,
        note: &str,
    ) -> Result<()> {
        let mut data = self.lock()?;
        let current = data
            .statuses
            .get_mut(&issue_id)
            .ok_or_else(|| anyhow!("Issue {} not found", issue_id))?;
        let from = std::mem::replace(current, status);

        data.journals.push(Journal {
            issue_id,
            user_id: user,
            from,
            to: status,
            note: note.to_string(),
            created_on: Utc::now(),
        });
        Ok(())
    }
}
