//! Timer state machine
//!
//! Validates and executes start/resume/suspend/stop/discard for one owner at a
//! time. Each action holds that owner's lock only across load-compute-save;
//! collaborator calls happen after the lock is released.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::TimerError,
    services::{NewTimeEntry, StatusTransitionHook, TimeEntry, TimeEntryRecorder},
    state::{IssueId, Timer, TimerSnapshot, TimerStore, UserId},
};

const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of stopping a timer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopOutcome {
    pub tracked_item_id: IssueId,
    pub elapsed_seconds: u64,
    pub elapsed_hours: f64,
    /// The recorded entry, absent when recording failed
    pub time_entry: Option<TimeEntry>,
    /// Non-fatal recorder failure; the timer is already gone
    pub warning: Option<String>,
}

/// Timers visible to a caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerListing {
    /// The caller's own timer (0 or 1). `None` for an anonymous caller.
    pub mine: Option<Vec<TimerSnapshot>>,
    /// Everyone else's timers, or all timers for an anonymous caller
    pub others: Vec<TimerSnapshot>,
}

/// Per-owner mutual exclusion. Entries live only while an action holds or
/// waits on them.
#[derive(Debug, Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one owner's load-compute-save
struct OwnerGuard<'a> {
    locks: &'a OwnerLocks,
    owner: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(self.owner);
    }
}

impl OwnerLocks {
    async fn acquire(&self, owner: UserId) -> Result<OwnerGuard<'_>, TimerError> {
        let lock = {
            let mut locks = self.locks
                .lock()
                .map_err(|e| TimerError::Store(format!("Failed to lock owner locks: {}", e)))?;
            Arc::clone(locks.entry(owner).or_default())
        };
        let guard = lock.lock_owned().await;
        Ok(OwnerGuard { locks: self, owner, guard: Some(guard) })
    }

    /// Drop the owner's entry once nobody holds or waits on it.
    /// Clones are only taken under the map lock, so a count of one is final.
    fn release(&self, owner: UserId) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if locks.get(&owner).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&owner);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}

/// Run a collaborator call on its own task, waiting at most `limit`.
///
/// A call that outlives the wait keeps running detached, so dropping the
/// caller's future never cancels it halfway.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match timeout(limit, tokio::spawn(call)).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(e))) => Err(format!("{:#}", e)),
        Ok(Err(e)) => Err(format!("task failed: {}", e)),
        Err(_) => Err(format!("no response within {}ms", limit.as_millis())),
    }
}

/// Drives timer transitions against a store, a clock and the two collaborators
pub struct TimerMachine {
    store: Arc<dyn TimerStore>,
    clock: Arc<dyn Clock>,
    hook: Arc<dyn StatusTransitionHook>,
    recorder: Arc<dyn TimeEntryRecorder>,
    locks: OwnerLocks,
    collaborator_timeout: Duration,
}

impl TimerMachine {
    pub fn new(
        store: Arc<dyn TimerStore>,
        clock: Arc<dyn Clock>,
        hook: Arc<dyn StatusTransitionHook>,
        recorder: Arc<dyn TimeEntryRecorder>,
    ) -> Self {
        Self {
            store,
            clock,
            hook,
            recorder,
            locks: OwnerLocks::default(),
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Bound how long start and stop wait on the hook and the recorder.
    /// Keep it below any request timeout wrapped around the machine.
    pub fn with_collaborator_timeout(mut self, limit: Duration) -> Self {
        self.collaborator_timeout = limit;
        self
    }

    /// Start timing `tracked_item_id` for `owner`
    pub async fn start(
        &self,
        owner: UserId,
        tracked_item_id: Option<IssueId>,
    ) -> Result<TimerSnapshot, TimerError> {
        let tracked_item_id = tracked_item_id.ok_or(TimerError::MissingParameter("issue_id"))?;

        let (timer, now) = {
            let _guard = self.locks.acquire(owner).await?;
            let now = self.clock.now();
            (self.store.create(Timer::start(owner, tracked_item_id, now))?, now)
        };
        info!("User {} started timer {} on issue {}", owner, timer.id, tracked_item_id);

        let hook = Arc::clone(&self.hook);
        let transition = async move { hook.apply(tracked_item_id, owner).await };
        if let Err(e) = bounded(self.collaborator_timeout, transition).await {
            warn!("Status transition after start failed for issue {}: {}", tracked_item_id, e);
        }

        Ok(TimerSnapshot::at(&timer, now))
    }

    /// Resume a paused timer
    pub async fn resume(&self, owner: UserId) -> Result<TimerSnapshot, TimerError> {
        let _guard = self.locks.acquire(owner).await?;
        let mut timer = self.load(owner)?;

        if timer.is_running() {
            return Err(invalid("resume", &timer));
        }

        let now = self.clock.now();
        timer.resume_at(now);
        let timer = self.store.save(&timer)?;
        info!("User {} resumed timer on issue {}", owner, timer.tracked_item_id);

        Ok(TimerSnapshot::at(&timer, now))
    }

    /// Pause a running timer, folding the running interval into the total
    pub async fn suspend(&self, owner: UserId) -> Result<TimerSnapshot, TimerError> {
        let _guard = self.locks.acquire(owner).await?;
        let mut timer = self.load(owner)?;

        if !timer.is_running() {
            return Err(invalid("suspend", &timer));
        }

        let now = self.clock.now();
        timer.suspend_at(now);
        let timer = self.store.save(&timer)?;
        info!(
            "User {} suspended timer on issue {} at {}s",
            owner, timer.tracked_item_id, timer.accumulated_seconds
        );

        Ok(TimerSnapshot::at(&timer, now))
    }

    /// Stop the timer and hand its hours to the recorder.
    ///
    /// Issue and hours are captured before the timer is deleted. A recorder
    /// failure or timeout is returned as a warning alongside the hours; the
    /// deletion stands.
    pub async fn stop(&self, owner: UserId) -> Result<StopOutcome, TimerError> {
        let (tracked_item_id, elapsed_seconds, elapsed_hours, now) = {
            let _guard = self.locks.acquire(owner).await?;
            let timer = self.load(owner)?;
            let now = self.clock.now();
            let captured = (
                timer.tracked_item_id,
                timer.elapsed_seconds(now),
                timer.elapsed_hours(now),
                now,
            );
            self.store.delete(owner)?;
            captured
        };
        info!(
            "User {} stopped timer on issue {} after {}s",
            owner, tracked_item_id, elapsed_seconds
        );

        let entry = NewTimeEntry {
            issue_id: tracked_item_id,
            user_id: owner,
            hours: elapsed_hours,
            spent_on: now,
        };
        let recorder = Arc::clone(&self.recorder);
        let recording = async move { recorder.record(entry).await };
        let (time_entry, warning) = match bounded(self.collaborator_timeout, recording).await {
            Ok(recorded) => (Some(recorded), None),
            Err(e) => {
                warn!("Failed to record time entry for issue {}: {}", tracked_item_id, e);
                (None, Some(format!("Time entry was not recorded: {}", e)))
            }
        };

        Ok(StopOutcome {
            tracked_item_id,
            elapsed_seconds,
            elapsed_hours,
            time_entry,
            warning,
        })
    }

    /// Throw the timer away without recording anything
    pub async fn discard(&self, owner: UserId) -> Result<(), TimerError> {
        let _guard = self.locks.acquire(owner).await?;
        self.store.delete(owner)?;
        info!("User {} discarded their timer", owner);
        Ok(())
    }

    /// Timers visible to `owner`, or every timer for an anonymous caller
    pub fn list(&self, owner: Option<UserId>) -> Result<TimerListing, TimerError> {
        let now = self.clock.now();
        let snapshots = self.store
            .all()?
            .iter()
            .map(|timer| TimerSnapshot::at(timer, now))
            .collect::<Vec<_>>();

        let listing = match owner {
            None => TimerListing { mine: None, others: snapshots },
            Some(owner) => {
                let (mine, others): (Vec<_>, Vec<_>) = snapshots.into_iter().partition(|s| s.owner == owner);
                TimerListing { mine: Some(mine), others }
            }
        };
        debug!("Listed timers for {:?}: {} others", owner, listing.others.len());
        Ok(listing)
    }

    fn load(&self, owner: UserId) -> Result<Timer, TimerError> {
        self.store.get(owner)?.ok_or(TimerError::NotFound { owner })
    }
}

fn invalid(action: &'static str, timer: &Timer) -> TimerError {
    TimerError::InvalidTransition {
        action,
        issue_id: timer.tracked_item_id,
        state: timer.status().as_str(),
    }
}
