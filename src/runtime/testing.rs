//! Mock implementations and driver integration tests
//!
//! The driver runs against a real file workspace in a temp directory, so
//! these tests exercise the same polling protocol the panel process uses.

use super::executor::ConversationDriver;
use super::DriverOptions;
use crate::control::ControlPanel;
use crate::llm::{Completion, CompletionClient, CompletionRequest, CompletionResponse, LlmError};
use crate::store::{AgentConfig, FileWorkspace, SessionPaths, Settings};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Completion Client
// ============================================================================

type Hook = Box<dyn FnOnce() + Send>;

struct Scripted {
    result: Result<CompletionResponse, LlmError>,
    /// Runs while the call is "in flight", to simulate the panel acting mid-call
    during_call: Option<Hook>,
}

/// Mock client that returns queued replies, then passes forever
pub struct MockCompletionClient {
    script: Mutex<VecDeque<Scripted>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, result: Result<CompletionResponse, LlmError>, during_call: Option<Hook>) {
        self.script.lock().unwrap().push_back(Scripted {
            result,
            during_call,
        });
    }

    pub fn queue_text(&self, text: &str) {
        self.push(Ok(CompletionResponse::new(Completion::text(text))), None);
    }

    pub fn queue_refusal(&self, text: &str) {
        self.push(
            Ok(CompletionResponse::new(Completion::Refusal(text.to_string()))),
            None,
        );
    }

    pub fn queue_error(&self, error: LlmError) {
        self.push(Err(error), None);
    }

    /// Queue a reply and an action to perform while the call is pending
    pub fn queue_text_during(&self, text: &str, hook: impl FnOnce() + Send + 'static) {
        self.push(
            Ok(CompletionResponse::new(Completion::text(text))),
            Some(Box::new(hook)),
        );
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Which agent each request was made for, in order
    pub fn speakers(&self) -> Vec<String> {
        self.recorded_requests().iter().map(speaker).collect()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted {
                result,
                during_call,
            }) => {
                if let Some(hook) = during_call {
                    hook();
                }
                result
            }
            None => Ok(CompletionResponse::new(Completion::text("[PASS]"))),
        }
    }
}

/// Agent name marked "(you)" in the request's participant list
fn speaker(request: &CompletionRequest) -> String {
    request
        .instructions
        .lines()
        .find_map(|line| {
            let (name, _) = line.strip_prefix("- ")?.split_once(" (you)")?;
            Some(name.to_string())
        })
        .unwrap_or_default()
}

// ============================================================================
// Test Session Builder
// ============================================================================

pub type TestDriver = ConversationDriver<Arc<FileWorkspace>, Arc<MockCompletionClient>>;

/// Isolated session directory with a driver, a panel and a scripted client
pub struct TestSession {
    _dir: tempfile::TempDir,
    pub workspace: Arc<FileWorkspace>,
    pub client: Arc<MockCompletionClient>,
}

impl TestSession {
    pub fn new(agents: &[&str]) -> Self {
        Self::with_settings(Settings {
            agents: agents
                .iter()
                .map(|name| AgentConfig::new(*name, format!("You are {name}.")))
                .collect(),
            ..Settings::default()
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Arc::new(FileWorkspace::new(SessionPaths::in_dir(dir.path())));
        workspace.settings().save(&settings).unwrap();
        Self {
            _dir: dir,
            workspace,
            client: Arc::new(MockCompletionClient::new()),
        }
    }

    pub fn fast_options() -> DriverOptions {
        DriverOptions {
            tick: Duration::from_millis(5),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    pub fn control(&self) -> ControlPanel<Arc<FileWorkspace>> {
        ControlPanel::new(Arc::clone(&self.workspace))
    }

    pub fn driver(&self) -> TestDriver {
        ConversationDriver::new(
            Arc::clone(&self.workspace),
            Arc::clone(&self.client),
            Self::fast_options(),
        )
    }
}

/// Poll `cond` until it holds, failing the test after a few seconds
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{
        AgentStateStore, DriverError, DriverOutcome, StopSignal, TranscriptStore,
    };
    use crate::state_machine::DriverState;
    use crate::store::AgentActivity;

    async fn stop_and_join(
        session: &TestSession,
        handle: tokio::task::JoinHandle<Result<DriverOutcome, DriverError>>,
    ) -> DriverOutcome {
        session.control().request_stop().unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("driver did not stop")
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_client_defaults_to_pass() {
        let mock = MockCompletionClient::new();
        mock.queue_text("Hello");
        let request = CompletionRequest {
            instructions: "- A (you): x".to_string(),
            input: String::new(),
            max_tokens: 100,
            model: "gpt-4o".to_string(),
            reasoning_effort: None,
        };

        let first = mock.complete(&request).await.unwrap();
        assert_eq!(first.completion, Completion::text("Hello"));
        let second = mock.complete(&request).await.unwrap();
        assert_eq!(second.completion, Completion::text("[PASS]"));
        assert_eq!(mock.speakers(), vec!["A", "A"]);
    }

    #[tokio::test]
    async fn test_start_session_replaces_transcript() {
        let session = TestSession::new(&["A"]);
        session.workspace.append("User", "old").unwrap();
        session.workspace.append("A", "older reply").unwrap();
        session.workspace.request_stop().unwrap();
        session
            .workspace
            .mark_agent("A", AgentActivity::Thinking)
            .unwrap();

        let mut driver = session.driver();
        driver.start_session(Some("  Fresh start ")).unwrap();

        let messages = session.workspace.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author, "User");
        assert_eq!(messages[0].content, "Fresh start");
        assert!(!session.workspace.stop_requested());
        assert_eq!(session.workspace.load_agent_state().current_agent, None);
        assert_eq!(driver.state(), DriverState::WaitingFirstMessage);
    }

    #[tokio::test]
    async fn test_start_session_without_opening_resumes() {
        let session = TestSession::new(&["A"]);
        session.workspace.append("User", "keep me").unwrap();

        let mut driver = session.driver();
        driver.start_session(None).unwrap();
        assert_eq!(session.workspace.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_agent_scenario() {
        let session = TestSession::new(&["Einstein", "Feynman"]);
        session.client.queue_text("Hello, I am Einstein.");
        session.client.queue_text("[PASS]");

        // Captured while Einstein's second turn is in flight
        let seen = Arc::new(Mutex::new(None));
        let seen_in_hook = Arc::clone(&seen);
        let ws = Arc::clone(&session.workspace);
        session.client.queue_text_during("[PASS]", move || {
            let roster = vec!["Einstein".to_string(), "Feynman".to_string()];
            let snapshot = ws.load_agent_state();
            *seen_in_hook.lock().unwrap() = Some((snapshot, ws.all_passed(&roster)));
        });

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        let roster = vec!["Einstein".to_string(), "Feynman".to_string()];
        wait_until("deadlock", || ws.all_passed(&roster)).await;

        let speakers = session.client.speakers();
        assert_eq!(speakers[..3], ["Einstein", "Feynman", "Einstein"]);

        let (snapshot, all_passed) = seen.lock().unwrap().clone().unwrap();
        assert!(!all_passed);
        assert_eq!(snapshot.pass_history.len(), 1);
        assert_eq!(snapshot.pass_history[0].agent, "Feynman");
        assert_eq!(snapshot.current_agent.as_deref(), Some("Einstein"));
        assert_eq!(snapshot.state, AgentActivity::Thinking);

        let messages = session.workspace.messages().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].author, "Einstein");
        assert_eq!(messages[1].index, 2);

        let outcome = stop_and_join(&session, handle).await;
        assert_eq!(outcome.messages, 2);
        assert!(!session.workspace.stop_requested());
    }

    #[tokio::test]
    async fn test_deadlock_waits_for_user() {
        let session = TestSession::new(&["A", "B"]);
        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        let roster = vec!["A".to_string(), "B".to_string()];
        wait_until("deadlock", || ws.all_passed(&roster)).await;

        let calls = session.client.request_count();
        assert_eq!(calls, 2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(session.client.request_count(), calls);

        session.client.queue_text("Back to work");
        session.control().post_user_message("Keep going").unwrap();

        let client = Arc::clone(&session.client);
        wait_until("resumed turn", || client.request_count() > calls).await;
        assert_eq!(session.client.speakers()[calls], "A");

        let ws = Arc::clone(&session.workspace);
        wait_until("A's reply", || ws.count().unwrap() == 3).await;
        assert_eq!(ws.last_author().unwrap().as_deref(), Some("A"));

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_restart_during_call_discards_reply() {
        let session = TestSession::new(&["A"]);
        let panel = session.control();
        session
            .client
            .queue_text_during("too late", move || panel.restart().unwrap());

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let client = Arc::clone(&session.client);
        wait_until("first call", || client.request_count() == 1).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(session.workspace.count().unwrap(), 0);
        assert_eq!(session.workspace.last_author().unwrap(), None);
        assert_eq!(session.client.request_count(), 1);

        // A new first message restarts the rotation
        session.control().post_user_message("Again").unwrap();
        let client = Arc::clone(&session.client);
        wait_until("second call", || client.request_count() == 2).await;

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_stop_during_call_writes_nothing() {
        let session = TestSession::new(&["A", "B"]);
        let panel = session.control();
        session
            .client
            .queue_text_during("never written", move || panel.request_stop().unwrap());

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), driver.run())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.messages, 1);
        assert_eq!(session.client.request_count(), 1);
        assert!(!session.workspace.stop_requested());
        assert_eq!(
            session.workspace.load_agent_state(),
            crate::store::AgentStateSnapshot::default()
        );
    }

    #[tokio::test]
    async fn test_paused_makes_no_calls() {
        let session = TestSession::with_settings(Settings {
            paused: true,
            agents: vec![AgentConfig::new("A", "")],
            ..Settings::default()
        });
        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(session.client.request_count(), 0);

        session.client.queue_text("Unpaused");
        session.control().set_paused(false).unwrap();
        let ws = Arc::clone(&session.workspace);
        wait_until("reply after unpause", || ws.count().unwrap() == 2).await;

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_empty_roster_makes_no_calls() {
        let session = TestSession::new(&[]);
        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(session.client.request_count(), 0);

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_failures_become_pass_after_retries() {
        let session = TestSession::new(&["A"]);
        for _ in 0..3 {
            session.client.queue_error(LlmError::rate_limit("slow down"));
        }

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        wait_until("failed turn counted as pass", || ws.all_passed(&["A".to_string()])).await;
        assert_eq!(session.client.request_count(), 3);
        assert_eq!(session.workspace.count().unwrap(), 1);

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let session = TestSession::new(&["A"]);
        session.client.queue_error(LlmError::auth("bad key"));

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        wait_until("pass", || ws.all_passed(&["A".to_string()])).await;
        assert_eq!(session.client.request_count(), 1);

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let session = TestSession::new(&["A"]);
        session.client.queue_error(LlmError::network("reset"));
        session.client.queue_text("Recovered");

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        wait_until("reply", || ws.count().unwrap() == 2).await;
        let messages = session.workspace.messages().unwrap();
        assert_eq!(messages[1].content, "Recovered");

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_refusal_and_empty_count_as_pass() {
        let session = TestSession::new(&["A", "B"]);
        session.client.queue_refusal("I can't help with that.");
        session.client.queue_text("   ");

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        let roster = vec!["A".to_string(), "B".to_string()];
        wait_until("both passed", || ws.all_passed(&roster)).await;
        assert_eq!(session.workspace.count().unwrap(), 1);

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_cooldown_cut_short_by_user_message() {
        let session = TestSession::with_settings(Settings {
            delay_seconds: 300,
            agents: vec![AgentConfig::new("A", ""), AgentConfig::new("B", "")],
            ..Settings::default()
        });
        session.client.queue_text("First thought");

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        wait_until("A's reply", || ws.count().unwrap() == 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.client.request_count(), 1);

        session.control().post_user_message("Over to you").unwrap();
        let client = Arc::clone(&session.client);
        wait_until("next turn", || client.request_count() == 2).await;
        // Human spoke last, so the rotation restarts at the first agent
        assert_eq!(session.client.speakers()[1], "A");

        stop_and_join(&session, handle).await;
    }

    fn slow_session() -> TestSession {
        TestSession::with_settings(Settings {
            delay_seconds: 300,
            agents: vec![AgentConfig::new("A", ""), AgentConfig::new("B", "")],
            ..Settings::default()
        })
    }

    /// Start a driver and wait until A's reply has put it into its cooldown
    async fn run_into_cooldown(
        session: &TestSession,
    ) -> tokio::task::JoinHandle<Result<DriverOutcome, DriverError>> {
        session.client.queue_text("First thought");
        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let ws = Arc::clone(&session.workspace);
        wait_until("A's reply", || ws.count().unwrap() == 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(session.client.request_count(), 1);
        handle
    }

    #[tokio::test]
    async fn test_cooldown_cut_short_by_stop() {
        let session = slow_session();
        let handle = run_into_cooldown(&session).await;

        let outcome = stop_and_join(&session, handle).await;
        assert_eq!(outcome.messages, 2);
        assert_eq!(session.client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_cut_short_by_pause() {
        let session = slow_session();
        let handle = run_into_cooldown(&session).await;

        session.control().set_paused(true).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(session.client.request_count(), 1);

        // Only reachable if the cooldown ended when the pause was seen
        session.control().set_paused(false).unwrap();
        let client = Arc::clone(&session.client);
        wait_until("B's turn after unpause", || client.request_count() == 2).await;
        assert_eq!(session.client.speakers()[1], "B");

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_cooldown_cut_short_by_restart() {
        let session = slow_session();
        let handle = run_into_cooldown(&session).await;

        session.control().restart().unwrap();
        let ws = Arc::clone(&session.workspace);
        wait_until("agent state cleared", || {
            ws.load_agent_state().current_agent.is_none()
        })
        .await;

        session.control().post_user_message("Start over").unwrap();
        let client = Arc::clone(&session.client);
        wait_until("first turn after restart", || client.request_count() == 2).await;
        assert_eq!(session.client.speakers()[1], "A");

        stop_and_join(&session, handle).await;
    }

    #[tokio::test]
    async fn test_request_carries_settings() {
        let session = TestSession::with_settings(Settings {
            max_tokens: 777,
            global_prompt: "Stay on topic.".to_string(),
            default_reasoning_effort: "low".to_string(),
            agents: vec![AgentConfig::new("A", "You are A.").with_model("o3")],
            ..Settings::default()
        });

        let mut driver = session.driver();
        driver.start_session(Some("Hi")).unwrap();
        let handle = tokio::spawn(driver.run());

        let client = Arc::clone(&session.client);
        wait_until("first call", || client.request_count() == 1).await;
        let request = session.client.recorded_requests().remove(0);
        assert_eq!(request.max_tokens, 777);
        assert_eq!(request.model, "o3");
        assert_eq!(request.reasoning_effort.as_deref(), Some("low"));
        assert!(request.instructions.contains("Stay on topic."));
        assert!(request.input.contains("[1] User"));

        stop_and_join(&session, handle).await;
    }
}
