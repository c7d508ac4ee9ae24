use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::api::error::{ChatError, UploadError};
use crate::api::stream::{StreamChunk, StreamEnd, StreamingChatClient};
use crate::api::types::{AttachmentReference, ChatRequest};
use crate::api::upload::UploadClient;
use crate::core::attachments::Attachment;
use crate::core::config::ResolvedConfig;

/// The two backend operations a chat session depends on.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the name of the backend.
    fn name(&self) -> &str;

    /// Uploads one batch of files and returns the issued references.
    async fn upload(&self, files: &[Attachment]) -> Result<Vec<AttachmentReference>, UploadError>;

    /// Streams a chat response, sending chunks to the provided channel.
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        sender: Sender<StreamChunk>,
    ) -> Result<StreamEnd, ChatError>;
}

/// HTTP backend: upload endpoint plus event-stream chat endpoint.
pub struct HttpBackend {
    upload: UploadClient,
    chat: StreamingChatClient,
}

impl HttpBackend {
    /// Creates a backend with explicit endpoint URLs sharing one connection pool.
    pub fn new(upload_url: impl Into<String>, chat_url: impl Into<String>) -> Self {
        let client = reqwest::Client::new();
        Self {
            upload: UploadClient::new(client.clone(), upload_url),
            chat: StreamingChatClient::new(client, chat_url),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.upload_url(), config.chat_url())
    }

    pub fn upload_url(&self) -> &str {
        self.upload.url()
    }

    pub fn chat_url(&self) -> &str {
        self.chat.url()
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, files: &[Attachment]) -> Result<Vec<AttachmentReference>, UploadError> {
        self.upload.upload(files).await
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        sender: Sender<StreamChunk>,
    ) -> Result<StreamEnd, ChatError> {
        self.chat.stream(request, sender).await
    }
}
