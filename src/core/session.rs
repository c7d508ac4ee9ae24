//! # Session Controller
//!
//! Owns the session state and performs the I/O that `update()` asks for.
//!
//! The state lives in a `tokio::sync::watch` channel: every change goes
//! through `update()` inside `send_modify`, and every subscriber sees the
//! result. The presentation layer only observes.
//!
//! ```text
//! send(text) ─► update(Submit) ─► Effect::SpawnRequest
//!                                      │
//!                 ┌────────────────────┴─────────────────────┐
//!                 ▼                                          ▼
//!      backend.stream_chat(tx)  ── StreamChunk ──►  apply loop (paced)
//!                 │                                          │
//!                 └──► ResponseFinished / ResponseFailed ◄───┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};

use crate::api::backend::ChatBackend;
use crate::api::stream::StreamChunk;
use crate::api::types::ChatRequest;
use crate::core::action::{Action, Effect, Rejection, update};
use crate::core::attachments::{Attachment, CandidateFile};
use crate::core::config::ResolvedConfig;
use crate::core::state::SessionState;

/// Capacity of the producer → consumer token channel.
const TOKEN_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Rejected(Rejection),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// What a call to `send` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input with nothing attached.
    Ignored,
    /// A request was issued and has terminated (successfully or not).
    Finished,
}

pub struct SessionController {
    backend: Arc<dyn ChatBackend>,
    state: watch::Sender<SessionState>,
    token_delay: Duration,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ChatBackend>, config: &ResolvedConfig) -> Self {
        Self::with_options(backend, config.system_prompt.clone(), config.token_delay)
    }

    pub fn with_options(
        backend: Arc<dyn ChatBackend>,
        system_prompt: impl Into<String>,
        token_delay: Duration,
    ) -> Self {
        info!(
            "Session started with backend '{}' (token delay {:?})",
            backend.name(),
            token_delay
        );
        let (state, _) = watch::channel(SessionState::new(system_prompt));
        Self {
            backend,
            state,
            token_delay,
        }
    }

    /// Receives a notification after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Applies an action and publishes the new state.
    fn dispatch(&self, action: Action) -> Effect {
        let mut effect = Effect::None;
        self.state.send_modify(|state| effect = update(state, action));
        effect
    }

    pub fn edit_input(&self, text: impl Into<String>) {
        self.dispatch(Action::EditInput(text.into()));
    }

    /// Accepts allow-listed, non-duplicate files and uploads them.
    ///
    /// Upload failures are published as a notice; the attachments stay pending.
    pub async fn attach(&self, files: Vec<CandidateFile>) -> Result<(), SessionError> {
        let effect = self.dispatch(Action::SelectFiles(files));
        self.run(effect).await.map(|_| ())
    }

    /// Re-uploads attachments whose last upload failed.
    pub async fn retry_uploads(&self) -> Result<(), SessionError> {
        let effect = self.dispatch(Action::RetryUploads);
        self.run(effect).await.map(|_| ())
    }

    pub fn remove_attachment(&self, index: usize) {
        self.dispatch(Action::RemoveAttachment(index));
    }

    /// Sends `text` with the pending attachments and streams the reply.
    ///
    /// Resolves once the response has terminated. Request failures are
    /// written into the assistant turn, not returned.
    pub async fn send(&self, text: impl Into<String>) -> Result<SendOutcome, SessionError> {
        let effect = self.dispatch(Action::Submit(text.into()));
        self.run(effect).await
    }

    /// Sends the current input buffer.
    pub async fn submit(&self) -> Result<SendOutcome, SessionError> {
        let text = self.state.borrow().input.clone();
        self.send(text).await
    }

    async fn run(&self, effect: Effect) -> Result<SendOutcome, SessionError> {
        match effect {
            Effect::None => Ok(SendOutcome::Ignored),
            Effect::Rejected(reason) => Err(SessionError::Rejected(reason)),
            Effect::Upload(batch) => {
                self.run_upload(batch).await;
                Ok(SendOutcome::Finished)
            }
            Effect::SpawnRequest(request) => {
                self.run_request(request).await;
                Ok(SendOutcome::Finished)
            }
        }
    }

    async fn run_upload(&self, batch: Vec<Attachment>) {
        let ids = batch.iter().map(|a| a.local_id).collect();
        let action = match self.backend.upload(&batch).await {
            Ok(references) => Action::UploadSucceeded {
                batch: ids,
                references,
            },
            Err(e) => Action::UploadFailed {
                batch: ids,
                error: e.to_string(),
            },
        };
        self.dispatch(action);
    }

    /// Streams one request. The producer and the paced consumer run
    /// concurrently on this task; tokens are applied strictly in order.
    async fn run_request(&self, request: ChatRequest) {
        let (tx, mut rx) = mpsc::channel(TOKEN_BUFFER);

        let producer = self.backend.stream_chat(&request, tx);
        let consumer = async {
            let mut applied = 0usize;
            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::Opened => {
                        self.dispatch(Action::StreamOpened);
                    }
                    StreamChunk::Token(token) => {
                        if applied > 0 && !self.token_delay.is_zero() {
                            tokio::time::sleep(self.token_delay).await;
                        }
                        self.dispatch(Action::TokenReceived(token));
                        applied += 1;
                    }
                }
            }
            applied
        };

        let (result, applied) = tokio::join!(producer, consumer);
        match result {
            Ok(end) => {
                debug!("Response finished ({:?}) after {} tokens", end, applied);
                self.dispatch(Action::ResponseFinished(end));
            }
            Err(e) => {
                warn!("Response failed after {} tokens: {}", applied, e);
                self.dispatch(Action::ResponseFailed(e.to_string()));
            }
        }
    }
}
