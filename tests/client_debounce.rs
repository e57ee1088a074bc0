//! Debounce and response-fencing behavior of the client adapter.
//!
//! Most tests run on a paused tokio clock, so timings are exact. The
//! worker-thread tests at the end use real time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use guardian::ast::SyntaxTree;
use guardian::error::{HostError, ParseError};
use guardian::host::{response_channel, ExecutionHost, Request, Response, ResponseSender};
use guardian::rules::Location;
use guardian::{
    AnalysisConfig, Analyzer, AstProvider, ClientOptions, GuardianClient, Position, RuleRegistry,
    Severity, Violation,
};
use tokio::time::sleep;

/// Records requests; the test plays the worker by sending responses.
#[derive(Clone, Default)]
struct ManualHost {
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ManualHost {
    fn sent(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl ExecutionHost for ManualHost {
    fn submit(&self, request: Request) -> Result<(), HostError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

struct Harness {
    client: GuardianClient,
    host: ManualHost,
    responses: ResponseSender,
}

fn harness() -> Harness {
    let host = ManualHost::default();
    let (responses, rx) = response_channel();
    let options = ClientOptions {
        config: AnalysisConfig::new(["console-log"], 0),
        debounce: Duration::from_millis(300),
    };
    let client = GuardianClient::spawn(host.clone(), rx, options);
    Harness {
        client,
        host,
        responses,
    }
}

async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

fn violation(line: usize) -> Violation {
    Violation {
        id: format!("violation_{:016x}", line),
        rule_id: "console-log".to_string(),
        severity: Severity::Info,
        message: "console.log() detected".to_string(),
        location: Location {
            start: Position::new(line, 0),
            end: Position::new(line, 14),
        },
        fix: None,
    }
}

fn complete(request_id: u64, file_path: &str, violations: Vec<Violation>) -> Response {
    Response::AnalysisComplete {
        request_id,
        file_path: file_path.to_string(),
        violations,
        error_message: None,
        timestamp: 1_000 + request_id,
    }
}

fn source_of(request: &Request) -> &str {
    match request {
        Request::Analyze { source_text, .. } => source_text,
    }
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce_into_one_request() {
    let h = harness();

    h.client.analyze("a", "file.ts");
    assert!(h.client.state().is_analyzing, "pending state must show immediately");
    sleep(Duration::from_millis(100)).await;
    h.client.analyze("ab", "file.ts");
    sleep(Duration::from_millis(100)).await;
    h.client.analyze("abc", "file.ts");

    // 299ms after the last edit nothing has been sent.
    sleep(Duration::from_millis(299)).await;
    assert!(h.host.sent().is_empty());

    sleep(Duration::from_millis(2)).await;
    let sent = h.host.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(source_of(&sent[0]), "abc");
    assert!(h.client.state().is_analyzing);
}

#[tokio::test(start_paused = true)]
async fn test_response_replaces_violations() {
    let h = harness();
    h.client.analyze("console.log(1)", "file.ts");
    sleep(Duration::from_millis(301)).await;
    let id = h.host.sent()[0].request_id();

    h.responses.send(complete(id, "file.ts", vec![violation(1)])).unwrap();
    settle().await;

    let state = h.client.state();
    assert_eq!(state.violations, vec![violation(1)]);
    assert!(!state.is_analyzing);
    assert_eq!(state.last_analyzed, Some(1_000 + id));
}

#[tokio::test(start_paused = true)]
async fn test_stale_responses_are_discarded() {
    let h = harness();
    h.client.analyze("v1", "file.ts");
    sleep(Duration::from_millis(301)).await;
    h.client.analyze("v2", "file.ts");
    sleep(Duration::from_millis(301)).await;

    let ids: Vec<u64> = h.host.sent().iter().map(Request::request_id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids[0] < ids[1]);

    // The older request finishes last; it must not win.
    h.responses.send(complete(ids[0], "file.ts", vec![violation(7)])).unwrap();
    settle().await;
    assert!(h.client.state().violations.is_empty());
    assert!(h.client.state().is_analyzing);

    // Right id, wrong file.
    h.responses.send(complete(ids[1], "other.ts", vec![violation(8)])).unwrap();
    settle().await;
    assert!(h.client.state().violations.is_empty());

    h.responses.send(complete(ids[1], "file.ts", vec![violation(2)])).unwrap();
    settle().await;
    let state = h.client.state();
    assert_eq!(state.violations, vec![violation(2)]);
    assert!(!state.is_analyzing);
}

#[tokio::test(start_paused = true)]
async fn test_edit_arriving_with_a_response_stays_analyzing() {
    let h = harness();
    h.client.analyze("v0", "file.ts");

    // Each round the answer to the last request and the next edit land
    // before the loop wakes up, in whichever order it picks them.
    for round in 1..=16usize {
        sleep(Duration::from_millis(301)).await;
        assert_eq!(h.host.sent().len(), round);

        h.responses
            .send(complete(round as u64, "file.ts", vec![violation(round)]))
            .unwrap();
        h.client.analyze(format!("v{}", round), "file.ts");
        settle().await;

        let state = h.client.state();
        assert_eq!(state.violations, vec![violation(round)]);
        assert!(state.is_analyzing, "round {}: the newer edit is still pending", round);
    }
}

#[tokio::test(start_paused = true)]
async fn test_host_error_keeps_previous_violations() {
    let h = harness();
    h.client.analyze("v1", "file.ts");
    sleep(Duration::from_millis(301)).await;
    h.responses.send(complete(1, "file.ts", vec![violation(1)])).unwrap();
    settle().await;

    h.client.analyze("v2", "file.ts");
    sleep(Duration::from_millis(301)).await;
    h.responses
        .send(Response::AnalysisError {
            request_id: 2,
            file_path: "file.ts".to_string(),
            error: "out of memory".to_string(),
            timestamp: 2_000,
        })
        .unwrap();
    settle().await;

    let state = h.client.state();
    assert_eq!(state.violations, vec![violation(1)]);
    assert_eq!(state.last_error.as_deref(), Some("out of memory"));
    assert!(!state.is_analyzing);
}

#[tokio::test(start_paused = true)]
async fn test_parse_failure_clears_violations() {
    let h = harness();
    h.client.analyze("v1", "file.ts");
    sleep(Duration::from_millis(301)).await;
    h.responses.send(complete(1, "file.ts", vec![violation(1)])).unwrap();
    settle().await;

    h.client.analyze("const s = 'abc", "file.ts");
    sleep(Duration::from_millis(301)).await;
    h.responses
        .send(Response::AnalysisComplete {
            request_id: 2,
            file_path: "file.ts".to_string(),
            violations: Vec::new(),
            error_message: Some("AST parse failed: unterminated string".to_string()),
            timestamp: 2_000,
        })
        .unwrap();
    settle().await;

    let state = h.client.state();
    assert!(state.violations.is_empty());
    assert!(state.parse_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_clear_does_not_cancel_pending_work() {
    let h = harness();
    h.client.analyze("v1", "file.ts");
    h.client.clear();
    assert!(!h.client.state().is_analyzing);

    sleep(Duration::from_millis(301)).await;
    assert_eq!(h.host.sent().len(), 1);

    h.responses.send(complete(1, "file.ts", vec![violation(3)])).unwrap();
    settle().await;
    assert_eq!(h.client.state().violations, vec![violation(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_changes() {
    let h = harness();
    let mut updates = h.client.subscribe();
    h.client.analyze("v1", "file.ts");
    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().is_analyzing);

    sleep(Duration::from_millis(301)).await;
    // The loop re-announces the pending change when it picks it up.
    assert!(updates.borrow_and_update().is_analyzing);

    h.responses.send(complete(1, "file.ts", vec![violation(1)])).unwrap();
    updates.changed().await.unwrap();
    assert_eq!(updates.borrow().violations.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_drops_pending_change() {
    let h = harness();
    h.client.analyze("v1", "file.ts");
    h.client.dispose().await;

    sleep(Duration::from_millis(400)).await;
    assert!(h.host.sent().is_empty());
}

#[cfg(feature = "tree-sitter")]
#[tokio::test(start_paused = true)]
async fn test_inline_host_end_to_end() {
    use guardian::host::InlineHost;
    use guardian::Analyzer;

    let (tx, rx) = response_channel();
    let host = InlineHost::new(Arc::new(Analyzer::typescript()), tx);
    let client = GuardianClient::spawn(host, rx, ClientOptions::default());

    client.analyze("console.log('hi');\nconst x: any = 1;\n", "file.ts");
    sleep(Duration::from_millis(350)).await;

    let state = client.state();
    assert!(!state.is_analyzing);
    let rules: Vec<_> = state.violations.iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(rules, vec!["console-log", "any-type"]);
    assert!(state.last_analyzed.is_some());
}

/// Takes `delay` of wall time per parse and counts finished parses.
struct SlowProvider {
    delay: Duration,
    finished: Arc<AtomicUsize>,
}

impl AstProvider for SlowProvider {
    fn parse(&self, _source: &str, _file_path: &str) -> Result<SyntaxTree, ParseError> {
        std::thread::sleep(self.delay);
        self.finished.fetch_add(1, Ordering::SeqCst);
        Err(ParseError::Aborted)
    }

    fn language(&self) -> &str {
        "slow"
    }
}

fn slow_worker_client(delay: Duration) -> (GuardianClient, Arc<AtomicUsize>) {
    let finished = Arc::new(AtomicUsize::new(0));
    let provider = SlowProvider {
        delay,
        finished: Arc::clone(&finished),
    };
    let analyzer = Analyzer::new(Arc::new(provider), Arc::new(RuleRegistry::builtin()));
    let options = ClientOptions {
        config: AnalysisConfig::new(["console-log"], 0),
        debounce: Duration::from_millis(1),
    };
    let client = GuardianClient::with_worker(Arc::new(analyzer), options).expect("spawn worker");
    (client, finished)
}

#[tokio::test]
async fn test_dropping_client_leaves_busy_worker_behind() {
    let (client, finished) = slow_worker_client(Duration::from_millis(600));
    client.analyze("v1", "file.ts");
    // The request is on the worker thread now.
    sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    drop(client);
    // Let the aborted loop be torn down on this thread.
    sleep(Duration::from_millis(10)).await;
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dispose_waits_for_worker_without_stalling_the_runtime() {
    let (client, finished) = slow_worker_client(Duration::from_millis(300));
    client.analyze("v1", "file.ts");
    sleep(Duration::from_millis(50)).await;

    let ticker = tokio::spawn(async {
        for _ in 0..5 {
            sleep(Duration::from_millis(10)).await;
        }
    });
    client.dispose().await;

    // The in-flight request finished before dispose returned, and other
    // tasks kept running meanwhile.
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert!(ticker.is_finished());
}
