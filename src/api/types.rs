use serde::{Deserialize, Serialize};

/// Role in a conversation message as the chat endpoint expects it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

/// A single `{role, content}` pair in the `conversation` array.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

/// Backend-issued handle for an uploaded file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachmentReference {
    pub id: String,
    pub name: String,
}

/// The request body for the chat endpoint.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub conversation: Vec<WireMessage>,
    #[serde(rename = "fileRefs", skip_serializing_if = "Vec::is_empty")]
    pub file_refs: Vec<AttachmentReference>,
}

/// Successful upload response. `fileRefs` is optional here so a missing
/// field can be reported as an invalid response instead of a parse error.
#[derive(Deserialize, Debug)]
pub(crate) struct UploadResponse {
    #[serde(rename = "fileRefs")]
    pub file_refs: Option<Vec<AttachmentReference>>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Deserialize, Debug, Default)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of a `data: ` frame.
#[derive(Deserialize, Debug)]
pub(crate) struct TokenEvent {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the chat body must match what the backend reads.
    #[test]
    fn test_chat_request_serialization() {
        let req = ChatRequest {
            conversation: vec![
                WireMessage {
                    role: WireRole::System,
                    content: "sys".to_string(),
                },
                WireMessage {
                    role: WireRole::User,
                    content: "hello".to_string(),
                },
            ],
            file_refs: vec![AttachmentReference {
                id: "f1".to_string(),
                name: "a.pdf".to_string(),
            }],
        };

        let serialized = serde_json::to_string(&req).unwrap();
        let expected = r#"{"conversation":[{"role":"system","content":"sys"},{"role":"user","content":"hello"}],"fileRefs":[{"id":"f1","name":"a.pdf"}]}"#;
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_chat_request_omits_empty_file_refs() {
        let req = ChatRequest {
            conversation: vec![],
            file_refs: vec![],
        };
        let serialized = serde_json::to_string(&req).unwrap();
        assert_eq!(serialized, r#"{"conversation":[]}"#);
    }

    #[test]
    fn test_upload_response_missing_refs() {
        let resp: UploadResponse =
            serde_json::from_str(r#"{"message":"Files uploaded successfully."}"#).unwrap();
        assert!(resp.file_refs.is_none());
    }

    #[test]
    fn test_token_event_defaults() {
        let event: TokenEvent = serde_json::from_str("{}").unwrap();
        assert!(event.token.is_none());
        assert!(event.message.is_none());
    }
}
