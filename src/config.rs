//! Configuration and CLI argument handling

use std::{collections::HashMap, time::Duration};
use clap::Parser;

use crate::{
    api::responses::FollowUpForm,
    services::{MemoryIssueTracker, StatusId},
    state::{IssueId, UserId},
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "time-logger")]
#[command(about = "A per-user work timer service that turns tracked time into time entries")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Overall request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout: u64,

    /// Status to move an issue to when a timer starts on it, as FROM=TO (repeatable)
    #[arg(long = "status-transition", value_name = "FROM=TO", value_parser = parse_pair)]
    pub status_transitions: Vec<(StatusId, StatusId)>,

    /// Known issue and its current status, as ISSUE=STATUS (repeatable)
    #[arg(long = "issue", value_name = "ISSUE=STATUS", value_parser = parse_pair)]
    pub issues: Vec<(IssueId, StatusId)>,

    /// Workflow edge an issue may follow, as FROM=TO (repeatable)
    #[arg(long = "workflow", value_name = "FROM=TO", value_parser = parse_pair)]
    pub workflow: Vec<(StatusId, StatusId)>,

    /// Status a user is permitted to set, as USER=STATUS (repeatable)
    #[arg(long = "grant", value_name = "USER=STATUS", value_parser = parse_pair)]
    pub grants: Vec<(UserId, StatusId)>,

    /// Point stopped timers at the new time entry form instead of the issue edit form
    #[arg(long)]
    pub redirect_to_new_time_entry: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// How long start and stop wait on collaborators: half the request
    /// timeout, so the captured result always beats the request deadline
    pub fn collaborator_timeout(&self) -> Duration {
        self.request_timeout() / 2
    }

    /// Workflow mapping keyed by current status. Later entries win.
    pub fn transition_map(&self) -> HashMap<StatusId, StatusId> {
        self.status_transitions.iter().copied().collect()
    }

    /// Issue tracker holding the configured issues, workflow and grants
    pub fn issue_tracker(&self) -> anyhow::Result<MemoryIssueTracker> {
        let tracker = MemoryIssueTracker::new();
        for &(issue_id, status) in &self.issues {
            tracker.insert_issue(issue_id, status)?;
        }
        for &(from, to) in &self.workflow {
            tracker.allow_transition(from, to)?;
        }
        for &(user, status) in &self.grants {
            tracker.grant(user, status)?;
        }
        Ok(tracker)
    }

    pub fn follow_up_form(&self) -> FollowUpForm {
        if self.redirect_to_new_time_entry {
            FollowUpForm::NewTimeEntry
        } else {
            FollowUpForm::EditIssue
        }
    }
}

fn parse_pair(raw: &str) -> Result<(u64, u64), String> {
    let (left, right) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected A=B, got '{}'", raw))?;

    let parse = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid id '{}': {}", s, e))
    };
    Ok((parse(left)?, parse(right)?))
}
