//! Execution hosts: run the analyzer away from the caller's thread.
//!
//! The contract is message based. A host accepts `Request`s through
//! `submit` (fire-and-forget) and delivers exactly one `Response` per
//! request on the response channel it was built with. Hosts keep no
//! state between requests beyond their execution context.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::analyzer::{now_millis, Analyzer};
use crate::config::AnalysisConfig;
use crate::error::{panic_message, HostError};
use crate::rules::Violation;

/// Message sent to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "analyze", rename_all = "camelCase")]
    Analyze {
        request_id: u64,
        source_text: String,
        file_path: String,
        config: AnalysisConfig,
    },
}

impl Request {
    pub fn request_id(&self) -> u64 {
        match self {
            Request::Analyze { request_id, .. } => *request_id,
        }
    }
}

/// Message delivered by a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// The analyzer ran. A parse failure lands here too, with zero
    /// violations and `error_message` set.
    #[serde(rename = "analysis-complete", rename_all = "camelCase")]
    AnalysisComplete {
        request_id: u64,
        file_path: String,
        violations: Vec<Violation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        timestamp: u64,
    },
    /// The analyzer itself failed.
    #[serde(rename = "analysis-error", rename_all = "camelCase")]
    AnalysisError {
        request_id: u64,
        file_path: String,
        error: String,
        timestamp: u64,
    },
}

impl Response {
    pub fn request_id(&self) -> u64 {
        match self {
            Response::AnalysisComplete { request_id, .. } => *request_id,
            Response::AnalysisError { request_id, .. } => *request_id,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Response::AnalysisComplete { file_path, .. } => file_path,
            Response::AnalysisError { file_path, .. } => file_path,
        }
    }
}

pub type ResponseSender = UnboundedSender<Response>;
pub type ResponseReceiver = UnboundedReceiver<Response>;

/// Create the channel a host delivers responses on.
pub fn response_channel() -> (ResponseSender, ResponseReceiver) {
    unbounded_channel()
}

/// Anything that can run analysis requests.
pub trait ExecutionHost: Send + Sync {
    /// Queue a request. Returns once the request is accepted, not when
    /// it has been analyzed.
    fn submit(&self, request: Request) -> Result<(), HostError>;

    /// Release the host, waiting for accepted requests to finish. May
    /// block.
    fn shutdown(self: Box<Self>) -> Result<(), HostError> {
        Ok(())
    }
}

/// Serve one request with `analyzer`. A panic escaping the analyzer is
/// reported as `AnalysisError`.
pub fn handle(analyzer: &Analyzer, request: Request) -> Response {
    let Request::Analyze {
        request_id,
        source_text,
        file_path,
        config,
    } = request;

    match catch_unwind(AssertUnwindSafe(|| {
        analyzer.analyze(&source_text, &file_path, &config)
    })) {
        Ok(result) => Response::AnalysisComplete {
            request_id,
            file_path: result.file_path,
            violations: result.violations,
            error_message: result.error_message,
            timestamp: result.completed_at,
        },
        Err(payload) => {
            let error = panic_message(payload.as_ref());
            warn!(file = %file_path, error = %error, "analyzer failed");
            Response::AnalysisError {
                request_id,
                file_path,
                error,
                timestamp: now_millis(),
            }
        }
    }
}

/// Runs each request synchronously on the submitting thread.
///
/// Honors the same message contract as `WorkerHost`; meant for tests and
/// for callers that are already off the interactive thread.
pub struct InlineHost {
    analyzer: Arc<Analyzer>,
    responses: ResponseSender,
}

impl InlineHost {
    pub fn new(analyzer: Arc<Analyzer>, responses: ResponseSender) -> Self {
        Self {
            analyzer,
            responses,
        }
    }
}

impl ExecutionHost for InlineHost {
    fn submit(&self, request: Request) -> Result<(), HostError> {
        let response = handle(&self.analyzer, request);
        self.responses
            .send(response)
            .map_err(|_| HostError::Disconnected)
    }
}

/// One long-lived background thread that owns an analyzer.
///
/// Requests queue up and run one at a time, start to finish. A request
/// that has been submitted always runs to completion, even after
/// `dispose`.
pub struct WorkerHost {
    requests: Option<mpsc::Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHost {
    pub fn spawn(analyzer: Arc<Analyzer>, responses: ResponseSender) -> Result<Self, HostError> {
        let (tx, rx) = mpsc::channel::<Request>();
        let thread = thread::Builder::new()
            .name("guardian-worker".to_string())
            .spawn(move || {
                info!("guardian worker started");
                for request in rx {
                    let response = handle(&analyzer, request);
                    if responses.send(response).is_err() {
                        break;
                    }
                }
                info!("guardian worker stopped");
            })?;

        Ok(Self {
            requests: Some(tx),
            thread: Some(thread),
        })
    }

    /// Stop accepting requests, drain the queue and join the thread.
    pub fn dispose(mut self) -> Result<(), HostError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), HostError> {
        self.requests.take();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| HostError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl ExecutionHost for WorkerHost {
    fn submit(&self, request: Request) -> Result<(), HostError> {
        let sender = self.requests.as_ref().ok_or(HostError::Disconnected)?;
        sender.send(request).map_err(|_| HostError::Disconnected)
    }

    fn shutdown(self: Box<Self>) -> Result<(), HostError> {
        (*self).dispose()
    }
}

/// Dropping closes the queue and detaches the thread. It finishes the
/// requests already queued and exits on its own; `dispose` waits for that.
impl Drop for WorkerHost {
    fn drop(&mut self) {
        self.requests.take();
        if self.thread.take().is_some() {
            debug!("guardian worker detached");
        }
    }
}
