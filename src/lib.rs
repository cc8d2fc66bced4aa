//! Time Logger - per-user work timers over HTTP
//! 
//! This library tracks elapsed work time against an issue for each user,
//! allowing a timer to be started, suspended, resumed, stopped into a time
//! entry, or discarded. A user has at most one timer at a time.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod machine;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::TimerError;
pub use machine::{StopOutcome, TimerListing, TimerMachine};
pub use state::AppState;
pub use utils::signals::shutdown_signal;
