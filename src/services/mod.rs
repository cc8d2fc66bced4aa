//! External collaborator module
//! 
//! This module contains the workflow status hook run after a timer starts and
//! the time entry recorder run after a timer stops.

pub mod status_transition;
pub mod time_entries;

// Re-export main types
pub use status_transition::{
    IssueTracker, MemoryIssueTracker, NoopTransitionHook, StatusId, StatusTransitionHook,
    WorkflowTransitionHook,
};
pub use time_entries::{MemoryTimeEntries, NewTimeEntry, TimeEntry, TimeEntryRecorder};
