//! State management module
//! 
//! This module contains the timer entity, its storage and the server-wide
//! application state.

pub mod app_state;
pub mod store;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use store::{MemoryTimerStore, TimerStore};
pub use timer::{IssueId, Timer, TimerId, TimerSnapshot, TimerStatus, UserId};
