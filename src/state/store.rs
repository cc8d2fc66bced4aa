//! Timer persistence keyed by owning user

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Mutex,
};
use tracing::debug;

use crate::error::TimerError;
use super::{Timer, TimerId, UserId};

/// Storage contract for timers.
///
/// The only business rule here is uniqueness: `create` must fail with
/// `Conflict` atomically when the owner already has a timer, so the rule
/// holds even when two creates race.
pub trait TimerStore: Send + Sync {
    fn get(&self, owner: UserId) -> Result<Option<Timer>, TimerError>;

    /// Insert a new timer and assign its id
    fn create(&self, timer: Timer) -> Result<Timer, TimerError>;

    /// Overwrite an existing timer, matched by owner and id
    fn save(&self, timer: &Timer) -> Result<Timer, TimerError>;

    fn delete(&self, owner: UserId) -> Result<(), TimerError>;

    fn all(&self) -> Result<Vec<Timer>, TimerError>;
}

#[derive(Debug, Default)]
struct Inner {
    timers: HashMap<UserId, Timer>,
    next_id: TimerId,
}

/// In-process timer store
#[derive(Debug, Default)]
pub struct MemoryTimerStore {
    inner: Mutex<Inner>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, TimerError> {
        self.inner
            .lock()
            .map_err(|e| TimerError::Store(format!("Failed to lock timer store: {}", e)))
    }
}

impl TimerStore for MemoryTimerStore {
    fn get(&self, owner: UserId) -> Result<Option<Timer>, TimerError> {
        Ok(self.lock()?.timers.get(&owner).cloned())
    }

    fn create(&self, mut timer: Timer) -> Result<Timer, TimerError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = inner.next_id;

        match inner.timers.entry(timer.owner) {
            Entry::Occupied(_) => Err(TimerError::Conflict { owner: timer.owner }),
            Entry::Vacant(slot) => {
                timer.id = id;
                debug!("Created timer {} for user {}", id, timer.owner);
                Ok(slot.insert(timer).clone())
            }
        }
    }

    fn save(&self, timer: &Timer) -> Result<Timer, TimerError> {
        let mut inner = self.lock()?;
        match inner.timers.get_mut(&timer.owner) {
            Some(stored) if stored.id == timer.id => {
                *stored = timer.clone();
                Ok(stored.clone())
            }
            _ => Err(TimerError::NotFound { owner: timer.owner }),
        }
    }

    fn delete(&self, owner: UserId) -> Result<(), TimerError> {
        self.lock()?
            .timers
            .remove(&owner)
            .map(|_| ())
            .ok_or(TimerError::NotFound { owner })
    }

    fn all(&self) -> Result<Vec<Timer>, TimerError> {
        let mut timers: Vec<Timer> = self.lock()?.timers.values().cloned().collect();
        timers.sort_by_key(|timer| timer.id);
        Ok(timers)
    }
}
