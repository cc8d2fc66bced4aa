//! Time Logger - per-user work timers over HTTP
//! 
//! This is the main entry point for the time-logger server.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use time_logger::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    machine::TimerMachine,
    services::{
        MemoryTimeEntries, NoopTransitionHook, StatusTransitionHook,
        WorkflowTransitionHook,
    },
    state::{AppState, MemoryTimerStore},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("time_logger={},tower_http=info", config.log_level()))
        .init();

    info!("Starting time-logger server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, request_timeout={}s",
          config.host, config.port, config.request_timeout);

    // Only wire the workflow hook when a mapping is configured
    let transitions = config.transition_map();
    let hook: Arc<dyn StatusTransitionHook> = if transitions.is_empty() {
        Arc::new(NoopTransitionHook)
    } else {
        info!("Status transitions on start: {:?}", transitions);
        let tracker = config.issue_tracker()?;
        Arc::new(WorkflowTransitionHook::new(Arc::new(tracker), transitions))
    };

    let machine = TimerMachine::new(
        Arc::new(MemoryTimerStore::new()),
        Arc::new(SystemClock),
        hook,
        Arc::new(MemoryTimeEntries::new()),
    )
    .with_collaborator_timeout(config.collaborator_timeout());
    let state = Arc::new(AppState::new(
        machine,
        config.follow_up_form(),
        config.port,
        config.host.clone(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state, config.request_timeout());

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints (caller identified by X-User-Id):");
    info!("  POST   /timers/start?issue_id=N - Start a timer on an issue");
    info!("  POST   /timers/suspend          - Pause the running timer");
    info!("  POST   /timers/resume           - Resume the paused timer");
    info!("  POST   /timers/stop             - Stop and record a time entry");
    info!("  DELETE /timers                  - Discard the timer");
    info!("  GET    /timers                  - List timers");
    info!("  GET    /status                  - Server status");
    info!("  GET    /health                  - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
