//! Debounced client adapter.
//!
//! Turns a stream of "text changed" events into occasional analysis
//! requests. Each `analyze` call re-arms a timer; only when the timer
//! expires without another call is one request sent to the execution
//! host. Results land in a `ClientState` the caller can read or watch.
//!
//! Requests carry a monotonic id. A response is applied only if it
//! answers the most recently sent request for the same file, so a slow
//! earlier analysis can never overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::analyzer::Analyzer;
use crate::config::{AnalysisConfig, GuardianConfig, DEFAULT_DEBOUNCE_MS};
use crate::error::HostError;
use crate::host::{response_channel, ExecutionHost, Request, Response, ResponseReceiver, WorkerHost};
use crate::rules::{RuleRegistry, Violation};

/// Options for a `GuardianClient`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent with every request.
    pub config: AnalysisConfig,
    pub debounce: Duration,
}

impl ClientOptions {
    /// Options taken from a project config: its rule selection and its
    /// `debounce_ms`.
    pub fn from_config(config: &GuardianConfig, registry: &RuleRegistry) -> Self {
        Self {
            config: config.analysis_config(registry),
            debounce: config.debounce(),
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::all_rules(&RuleRegistry::builtin(), 0),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// What the caller sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    pub violations: Vec<Violation>,
    /// True from the moment a change is queued until its result lands.
    pub is_analyzing: bool,
    /// Completion time of the last applied result, Unix milliseconds.
    pub last_analyzed: Option<u64>,
    /// Set when the last applied result was a parse failure.
    pub parse_error: Option<String>,
    /// Set when the host failed to run the last request.
    pub last_error: Option<String>,
}

enum Command {
    Analyze { source_text: String, file_path: String },
}

/// Caller-owned handle to a debouncing analysis loop.
///
/// Must be created inside a tokio runtime.
pub struct GuardianClient {
    commands: Option<mpsc::UnboundedSender<Command>>,
    state: Arc<watch::Sender<ClientState>>,
    task: Option<JoinHandle<Box<dyn ExecutionHost>>>,
}

impl GuardianClient {
    /// Start the debounce loop over `host`, reading its answers from
    /// `responses`.
    pub fn spawn<H>(host: H, responses: ResponseReceiver, options: ClientOptions) -> Self
    where
        H: ExecutionHost + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ClientState::default());
        let state = Arc::new(state);

        let worker = Debouncer {
            host: Box::new(host),
            state: Arc::clone(&state),
            config: options.config,
            debounce: options.debounce,
            pending: None,
            deadline: None,
            sent: None,
            next_request_id: 1,
        };
        let task = tokio::spawn(worker.run(command_rx, responses));

        Self {
            commands: Some(commands),
            state,
            task: Some(task),
        }
    }

    /// Client backed by a dedicated worker thread running `analyzer`.
    pub fn with_worker(analyzer: Arc<Analyzer>, options: ClientOptions) -> Result<Self, HostError> {
        let (tx, rx) = response_channel();
        let host = WorkerHost::spawn(analyzer, tx)?;
        Ok(Self::spawn(host, rx, options))
    }

    /// Queue `source_text` for analysis. Returns immediately; the result
    /// shows up in `state()`.
    pub fn analyze(&self, source_text: impl Into<String>, file_path: impl Into<String>) {
        let Some(commands) = &self.commands else {
            return;
        };
        self.state.send_modify(|s| s.is_analyzing = true);
        let command = Command::Analyze {
            source_text: source_text.into(),
            file_path: file_path.into(),
        };
        if commands.send(command).is_err() {
            warn!("analysis loop has stopped; change dropped");
            self.state.send_modify(|s| s.is_analyzing = false);
        }
    }

    /// Reset to the empty state. Pending and in-flight requests are not
    /// cancelled and may still deliver a result.
    pub fn clear(&self) {
        self.state.send_replace(ClientState::default());
    }

    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Stop the loop and release the host. A pending debounced change is
    /// discarded. Waiting for the host to finish in-flight work happens on
    /// the blocking pool.
    pub async fn dispose(mut self) {
        self.commands.take();
        let Some(task) = self.task.take() else {
            return;
        };
        let host = match task.await {
            Ok(host) => host,
            Err(e) => {
                warn!(error = %e, "analysis loop ended abnormally");
                return;
            }
        };
        match tokio::task::spawn_blocking(move || host.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "execution host did not shut down cleanly"),
            Err(e) => warn!(error = %e, "execution host shutdown was interrupted"),
        }
    }
}

impl Drop for GuardianClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State owned by the background loop.
struct Debouncer {
    host: Box<dyn ExecutionHost>,
    state: Arc<watch::Sender<ClientState>>,
    config: AnalysisConfig,
    debounce: Duration,
    pending: Option<(String, String)>,
    deadline: Option<Instant>,
    /// Id and path of the most recently sent request.
    sent: Option<(u64, String)>,
    next_request_id: u64,
}

impl Debouncer {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut responses: ResponseReceiver,
    ) -> Box<dyn ExecutionHost> {
        let mut host_open = true;
        loop {
            let timer = sleep_until(self.deadline.unwrap_or_else(Instant::now));
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Analyze { source_text, file_path }) => {
                        self.pending = Some((source_text, file_path));
                        self.deadline = Some(Instant::now() + self.debounce);
                        // A response applied since `analyze` may have cleared it.
                        self.state.send_modify(|s| s.is_analyzing = true);
                    }
                    None => break,
                },
                _ = timer, if self.deadline.is_some() => self.flush(),
                response = responses.recv(), if host_open => match response {
                    Some(response) => self.apply(response),
                    None => {
                        warn!("execution host closed its response channel");
                        host_open = false;
                    }
                },
            }
        }
        self.host
    }

    /// Send the settled change to the host.
    fn flush(&mut self) {
        self.deadline = None;
        let Some((source_text, file_path)) = self.pending.take() else {
            return;
        };

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let request = Request::Analyze {
            request_id,
            source_text,
            file_path: file_path.clone(),
            config: self.config.clone(),
        };

        match self.host.submit(request) {
            Ok(()) => self.sent = Some((request_id, file_path)),
            Err(e) => {
                warn!(file = %file_path, error = %e, "could not submit analysis request");
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.is_analyzing = false;
                    s.last_error = Some(message);
                });
            }
        }
    }

    fn is_current(&self, response: &Response) -> bool {
        match &self.sent {
            Some((id, path)) => *id == response.request_id() && path == response.file_path(),
            None => false,
        }
    }

    fn apply(&mut self, response: Response) {
        if !self.is_current(&response) {
            debug!(
                request_id = response.request_id(),
                file = %response.file_path(),
                "discarding stale response"
            );
            return;
        }

        let waiting = self.pending.is_some();
        match response {
            Response::AnalysisComplete {
                violations,
                error_message,
                timestamp,
                ..
            } => self.state.send_modify(|s| {
                s.violations = violations;
                s.parse_error = error_message;
                s.last_error = None;
                s.last_analyzed = Some(timestamp);
                s.is_analyzing = waiting;
            }),
            Response::AnalysisError { error, .. } => self.state.send_modify(|s| {
                s.last_error = Some(error);
                s.is_analyzing = waiting;
            }),
        }
    }
}
