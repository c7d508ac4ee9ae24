use std::fmt;

/// Errors from the upload endpoint.
#[derive(Debug)]
pub enum UploadError {
    /// Network-level failure (timeout, DNS, connection refused).
    Transport(String),
    /// The backend answered with a non-success status.
    Status { status: u16, body: String },
    /// 2xx response without a usable `fileRefs` array.
    InvalidResponse(String),
    /// A file could not be encoded into the multipart body.
    InvalidFile(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Transport(msg) => write!(f, "network error: {msg}"),
            UploadError::Status { status, body } => {
                write!(f, "upload failed (HTTP {status}): {body}")
            }
            UploadError::InvalidResponse(msg) => {
                write!(f, "backend did not return valid file references: {msg}")
            }
            UploadError::InvalidFile(msg) => write!(f, "invalid file: {msg}"),
        }
    }
}

impl std::error::Error for UploadError {}

/// Errors that end a chat request. Each one terminates the current request only.
#[derive(Debug)]
pub enum ChatError {
    /// Network failure before or during streaming.
    Transport(String),
    /// The backend rejected the request before streaming began.
    Request { status: u16, message: String },
    /// The consumer dropped its receiver.
    ChannelClosed,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Transport(msg) => write!(f, "network error: {msg}"),
            ChatError::Request { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ChatError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ChatError {}

/// A single malformed frame. Never fatal: the line is logged and skipped.
#[derive(Debug, PartialEq)]
pub enum FrameError {
    /// The line is not valid UTF-8.
    Decode(String),
    /// The `data: ` payload is not a JSON object.
    InvalidJson(String),
    /// Valid JSON without a usable `token`. Carries the backend's `message`, if any.
    MissingToken(Option<String>),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Decode(msg) => write!(f, "decode error: {msg}"),
            FrameError::InvalidJson(msg) => write!(f, "invalid frame payload: {msg}"),
            FrameError::MissingToken(Some(message)) => {
                write!(f, "frame without token: {message}")
            }
            FrameError::MissingToken(None) => write!(f, "frame without token"),
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display_carries_message() {
        let err = ChatError::Request {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 500): boom");
    }

    #[test]
    fn test_upload_error_display_carries_body() {
        let err = UploadError::Status {
            status: 413,
            body: "too large".to_string(),
        };
        assert!(err.to_string().contains("413"));
        assert!(err.to_string().contains("too large"));
    }
}
