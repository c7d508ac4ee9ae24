//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::api::backend::ChatBackend;
use crate::api::error::{ChatError, UploadError};
use crate::api::stream::{StreamChunk, StreamEnd};
use crate::api::types::{AttachmentReference, ChatRequest};
use crate::core::attachments::Attachment;
use crate::core::session::SessionController;

/// A backend that replays a fixed script and records what it was asked.
///
/// Chat responses send `Opened`, every scripted token, then end with the
/// end marker (or the scripted failure).
#[derive(Default)]
pub struct ScriptedBackend {
    tokens: Vec<String>,
    references: Vec<AttachmentReference>,
    upload_failure: Option<(u16, String)>,
    chat_failure: Mutex<Option<String>>,
    uploads: Mutex<Vec<Vec<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn replying(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_references(mut self, references: Vec<AttachmentReference>) -> Self {
        self.references = references;
        self
    }

    pub fn failing_upload(mut self, status: u16, body: &str) -> Self {
        self.upload_failure = Some((status, body.to_string()));
        self
    }

    /// Streams the scripted tokens, then fails with a transport error.
    pub fn failing_chat(self, message: &str) -> Self {
        *self.chat_failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn clear_chat_failure(&self) {
        *self.chat_failure.lock().unwrap() = None;
    }

    /// File names of every upload batch, in call order.
    pub fn uploads(&self) -> Vec<Vec<String>> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn upload(&self, files: &[Attachment]) -> Result<Vec<AttachmentReference>, UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push(files.iter().map(|f| f.name.clone()).collect());
        match &self.upload_failure {
            Some((status, body)) => Err(UploadError::Status {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(self.references.clone()),
        }
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        sender: Sender<StreamChunk>,
    ) -> Result<StreamEnd, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let failure = self.chat_failure.lock().unwrap().clone();

        sender
            .send(StreamChunk::Opened)
            .await
            .map_err(|_| ChatError::ChannelClosed)?;
        for token in &self.tokens {
            sender
                .send(StreamChunk::Token(token.clone()))
                .await
                .map_err(|_| ChatError::ChannelClosed)?;
        }

        match failure {
            Some(message) => Err(ChatError::Transport(message)),
            None => Ok(StreamEnd::EndMarker),
        }
    }
}

/// Creates a controller over `backend` with no token pacing.
pub fn test_controller(backend: Arc<ScriptedBackend>) -> SessionController {
    SessionController::with_options(backend, "test system prompt", Duration::ZERO)
}
