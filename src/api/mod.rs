pub mod backend;
pub mod error;
pub mod stream;
pub mod types;
pub mod upload;

pub use backend::{ChatBackend, HttpBackend};
pub use error::{ChatError, FrameError, UploadError};
pub use stream::{Frame, FrameDecoder, StreamChunk, StreamEnd, StreamingChatClient};
pub use types::{AttachmentReference, ChatRequest, WireMessage, WireRole};
pub use upload::UploadClient;
