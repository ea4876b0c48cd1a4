//! Session controller
//!
//! Owns the transcript and runs at most one completion exchange at a time.
//! The render loop calls [`SessionController::send`], which records the user
//! turn synchronously and hands the provider call to a tokio task. The task
//! writes its outcome back under the shared lock; the render loop picks it up
//! on its next [`SessionController::status`] poll.
//!
//! Every exchange carries a [`RequestId`]. A result whose id no longer matches
//! the pending one (because the user abandoned or cleared the exchange) is
//! dropped without touching the transcript or the status.
//!
//! There is no watchdog: if a gateway never returns, the status stays
//! `Pending` until the user abandons the exchange. The shipped gateways bound
//! this with a request timeout.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::CompletionGateway;
use crate::transcript::{ChatMessage, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Pending(RequestId),
    Succeeded(String),
    Failed(String),
}

impl SessionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionStatus::Pending(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a message is already being sent")]
    Busy,

    #[error("message is empty")]
    EmptyMessage,

    #[error("no model selected")]
    NoModel,

    #[error("no API client available for {0}. Please check your API key.")]
    NoGateway(String),
}

/// What a send needs to reach the model: the provider's gateway and a model id.
/// Either may be missing, in which case the exchange fails without a network call.
pub struct Route {
    pub provider_name: String,
    pub gateway: Option<Arc<dyn CompletionGateway>>,
    pub model: Option<String>,
}

#[derive(Debug)]
struct Shared {
    transcript: Transcript,
    status: SessionStatus,
    next_id: u64,
}

impl Shared {
    fn pending_id(&self) -> Option<RequestId> {
        match self.status {
            SessionStatus::Pending(id) => Some(id),
            _ => None,
        }
    }

    fn fresh_id(&mut self) -> RequestId {
        self.next_id += 1;
        RequestId(self.next_id)
    }

    /// Apply a finished exchange if it is still the one we are waiting for.
    fn resolve(&mut self, id: RequestId, outcome: Result<String, String>) -> bool {
        if self.pending_id() != Some(id) {
            debug!(request = %id, "discarding stale completion");
            return false;
        }
        match outcome {
            Ok(reply) => {
                info!(request = %id, chars = reply.len(), "completion received");
                self.transcript.push_assistant(reply.clone());
                self.status = SessionStatus::Succeeded(reply);
            }
            Err(reason) => {
                warn!(request = %id, %reason, "completion failed");
                self.status = SessionStatus::Failed(reason);
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Mutex<Shared>>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(Transcript::default())
    }
}

impl SessionController {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                transcript,
                status: SessionStatus::Idle,
                next_id: 0,
            })),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().status.clone()
    }

    /// Snapshot of the transcript for rendering or export.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.shared.lock().transcript.messages().to_vec()
    }

    /// User and assistant turns, not counting the system message.
    pub fn turn_count(&self) -> usize {
        self.shared.lock().transcript.conversation().count()
    }

    pub fn system_message(&self) -> String {
        self.shared.lock().transcript.system_message().to_string()
    }

    pub fn set_system_message(&self, message: &str) {
        self.shared.lock().transcript.set_system_message(message);
        info!("system message updated");
    }

    /// Reset the transcript to the system message alone. Any pending exchange
    /// is abandoned so its reply cannot land in the fresh conversation.
    pub fn clear_history(&self) {
        let mut shared = self.shared.lock();
        shared.transcript.clear();
        shared.status = SessionStatus::Idle;
        info!("conversation cleared");
    }

    /// Stop waiting for the pending exchange, if any. The background task keeps
    /// running; its result is discarded when it arrives.
    pub fn abandon(&self) {
        let mut shared = self.shared.lock();
        if let Some(id) = shared.pending_id() {
            debug!(request = %id, "abandoning pending exchange");
            shared.status = SessionStatus::Idle;
        }
    }

    /// Record `text` as the next user turn and start the exchange in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn send(&self, text: &str, route: Route) -> Result<RequestId, SessionError> {
        let (id, messages, gateway, model) = {
            let mut shared = self.shared.lock();
            if shared.status.is_pending() {
                debug!("send rejected: exchange already pending");
                return Err(SessionError::Busy);
            }
            if text.is_empty() {
                return Err(SessionError::EmptyMessage);
            }

            shared.transcript.push_user(text);

            let model = match route.model.filter(|m| !m.is_empty()) {
                Some(model) => model,
                None => {
                    let err = SessionError::NoModel;
                    shared.status = SessionStatus::Failed(err.to_string());
                    return Err(err);
                }
            };
            let gateway = match route.gateway {
                Some(gateway) => gateway,
                None => {
                    let err = SessionError::NoGateway(route.provider_name);
                    shared.status = SessionStatus::Failed(err.to_string());
                    return Err(err);
                }
            };

            let id = shared.fresh_id();
            shared.status = SessionStatus::Pending(id);
            (id, shared.transcript.messages().to_vec(), gateway, model)
        };

        info!(request = %id, %model, turns = messages.len(), "dispatching completion");

        let shared = self.shared.clone();
        tokio::spawn(async move {
            // Run the provider call in its own task so a panic inside it
            // surfaces here as a JoinError instead of leaving us Pending.
            let call = tokio::spawn(async move { gateway.complete(&messages, &model).await });
            let outcome = match call.await {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(err)) => Err(err.to_string()),
                Err(join_err) => Err(format!("error in response handling: {join_err}")),
            };
            shared.lock().resolve(id, outcome);
        });

        Ok(id)
    }

    #[cfg(test)]
    fn deliver(&self, id: RequestId, outcome: Result<String, String>) -> bool {
        self.shared.lock().resolve(id, outcome)
    }
}
