use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use time_logger::{
    api::{create_router, responses::FollowUpForm},
    clock::ManualClock,
    machine::TimerMachine,
    services::{
        MemoryTimeEntries, NewTimeEntry, NoopTransitionHook, StatusTransitionHook, TimeEntry,
        TimeEntryRecorder,
    },
    state::{AppState, IssueId, MemoryTimerStore, UserId},
};

/// Collaborator that answers only after `delay`
struct Sluggish<T> {
    inner: T,
    delay: Duration,
    done: AtomicUsize,
}

impl<T> Sluggish<T> {
    fn new(inner: T, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay, done: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl StatusTransitionHook for Sluggish<NoopTransitionHook> {
    async fn apply(&self, issue_id: IssueId, acting_user: UserId) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.apply(issue_id, acting_user).await?;
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TimeEntryRecorder for Sluggish<Arc<MemoryTimeEntries>> {
    async fn record(&self, entry: NewTimeEntry) -> Result<TimeEntry> {
        tokio::time::sleep(self.delay).await;
        let recorded = self.inner.record(entry).await?;
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(recorded)
    }
}

/// Router with a 200ms request deadline and a 50ms collaborator wait
fn tight_app(
    hook: Arc<dyn StatusTransitionHook>,
    recorder: Arc<dyn TimeEntryRecorder>,
) -> (Router, ManualClock) {
    let clock = ManualClock::at_epoch();
    let machine = TimerMachine::new(
        Arc::new(MemoryTimerStore::new()),
        Arc::new(clock.clone()),
        hook,
        recorder,
    )
    .with_collaborator_timeout(Duration::from_millis(50));
    let state = Arc::new(AppState::new(machine, FollowUpForm::EditIssue, 20554, "127.0.0.1".to_string()));
    (create_router(state, Duration::from_millis(200)), clock)
}

struct TestApp {
    router: Router,
    clock: ManualClock,
    entries: Arc<MemoryTimeEntries>,
}

fn app(form: FollowUpForm) -> TestApp {
    let clock = ManualClock::at_epoch();
    let entries = Arc::new(MemoryTimeEntries::new());
    let machine = TimerMachine::new(
        Arc::new(MemoryTimerStore::new()),
        Arc::new(clock.clone()),
        Arc::new(NoopTransitionHook),
        entries.clone(),
    );
    let state = Arc::new(AppState::new(machine, form, 20554, "127.0.0.1".to_string()));
    TestApp {
        router: create_router(state, Duration::from_secs(5)),
        clock,
        entries,
    }
}

async fn call(router: &Router, method: &str, uri: &str, user: Option<u64>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header("X-User-Id", user.to_string());
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn start_suspend_resume_stop_over_http() {
    let app = app(FollowUpForm::EditIssue);

    let (status, body) = call(&app.router, "POST", "/timers/start?issue_id=42", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["timer"]["tracked_item_id"], 42);

    app.clock.advance_secs(100);
    let (status, body) = call(&app.router, "POST", "/timers/suspend", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["accumulated_seconds"], 100);
    assert_eq!(body["timer"]["state"], "paused");

    app.clock.advance_secs(50);
    let (status, _) = call(&app.router, "POST", "/timers/resume", Some(1)).await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance_secs(250);
    let (status, body) = call(&app.router, "POST", "/timers/stop", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_item_id"], 42);
    assert_eq!(body["elapsed_seconds"], 350);
    assert_eq!(body["follow_up"]["form"], "edit_issue");
    assert_eq!(body["follow_up"]["issue_id"], 42);
    assert_eq!(body["time_entry"]["hours"], 0.1);

    assert_eq!(app.entries.entries().len(), 1);
}

#[tokio::test]
async fn follow_up_can_point_at_new_time_entry() {
    let app = app(FollowUpForm::NewTimeEntry);
    call(&app.router, "POST", "/timers/start?issue_id=5", Some(1)).await;

    let (_, body) = call(&app.router, "POST", "/timers/stop", Some(1)).await;

    assert_eq!(body["follow_up"]["form"], "new_time_entry");
}

#[tokio::test]
async fn rejections_map_to_status_codes() {
    let app = app(FollowUpForm::EditIssue);

    let (status, body) = call(&app.router, "POST", "/timers/start", Some(1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_parameter");

    let (status, body) = call(&app.router, "POST", "/timers/resume", Some(1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    call(&app.router, "POST", "/timers/start?issue_id=42", Some(1)).await;

    let (status, body) = call(&app.router, "POST", "/timers/start?issue_id=43", Some(1)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = call(&app.router, "POST", "/timers/resume", Some(1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_transition");

    let (status, _) = call(&app.router, "POST", "/timers/stop", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn discard_removes_timer_without_entry() {
    let app = app(FollowUpForm::EditIssue);
    call(&app.router, "POST", "/timers/start?issue_id=42", Some(1)).await;

    let (status, body) = call(&app.router, "DELETE", "/timers", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "discarded");

    let (status, _) = call(&app.router, "DELETE", "/timers", Some(1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.entries.entries().is_empty());
}

#[tokio::test]
async fn list_separates_caller_from_others() {
    let app = app(FollowUpForm::EditIssue);
    call(&app.router, "POST", "/timers/start?issue_id=10", Some(1)).await;
    call(&app.router, "POST", "/timers/start?issue_id=20", Some(2)).await;

    let (status, body) = call(&app.router, "GET", "/timers", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mine"].as_array().unwrap().len(), 1);
    assert_eq!(body["mine"][0]["tracked_item_id"], 10);
    assert_eq!(body["others"].as_array().unwrap().len(), 1);
    assert_eq!(body["others"][0]["owner"], 2);

    let (_, body) = call(&app.router, "GET", "/timers", None).await;
    assert!(body["mine"].is_null());
    assert_eq!(body["others"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn status_reports_last_action_and_active_timers() {
    let app = app(FollowUpForm::EditIssue);
    call(&app.router, "POST", "/timers/start?issue_id=10", Some(1)).await;

    let (status, body) = call(&app.router, "GET", "/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_timers"], 1);
    assert_eq!(body["last_action"], "start");
    assert_eq!(body["port"], 20554);

    let (status, body) = call(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn slow_hook_does_not_fail_a_committed_start() {
    let hook = Sluggish::new(NoopTransitionHook, Duration::from_millis(400));
    let (router, _) = tight_app(hook.clone(), Arc::new(MemoryTimeEntries::new()));

    let (status, body) = call(&router, "POST", "/timers/start?issue_id=42", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["tracked_item_id"], 42);

    let (status, _) = call(&router, "POST", "/timers/start?issue_id=42", Some(1)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // the hook keeps running after the caller has its answer
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(hook.done.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_recorder_still_returns_captured_hours() {
    let entries = Arc::new(MemoryTimeEntries::new());
    let recorder = Sluggish::new(Arc::clone(&entries), Duration::from_millis(400));
    let (router, clock) = tight_app(Arc::new(NoopTransitionHook), recorder.clone());

    call(&router, "POST", "/timers/start?issue_id=42", Some(1)).await;
    clock.advance_secs(3600);

    let (status, body) = call(&router, "POST", "/timers/stop", Some(1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracked_item_id"], 42);
    assert_eq!(body["elapsed_seconds"], 3600);
    assert_eq!(body["elapsed_hours"], 1.0);
    assert!(body["time_entry"].is_null());
    assert!(body["warning"].as_str().unwrap().contains("no response within"));

    let (_, listing) = call(&router, "GET", "/timers", Some(1)).await;
    assert!(listing["mine"].as_array().unwrap().is_empty());

    // recording finishes in the background rather than being cancelled
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(recorder.done.load(Ordering::SeqCst), 1);
    assert_eq!(entries.entries().len(), 1);
    assert_eq!(entries.entries()[0].hours, 1.0);
}
