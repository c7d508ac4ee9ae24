//! # Conversation
//!
//! The ordered log of turns and the translation into a chat request.
//! Turns are never reordered. Only the last turn may grow, and only while
//! it is the in-flight assistant turn.

use uuid::Uuid;

use crate::api::types::{AttachmentReference, ChatRequest, WireMessage, WireRole};
use crate::core::attachments::Attachment;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful and friendly AI assistant. You answer questions concisely and professionally.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl From<Role> for WireRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => WireRole::User,
            Role::Assistant => WireRole::Assistant,
        }
    }
}

/// Stable identity of a turn, independent of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(Uuid);

impl TurnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub id: TurnId,
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role,
            text: text.into(),
        }
    }
}

/// Text stored for a user turn.
///
/// Attachment names are flattened into the text as a trailing
/// `[Files attached: ...]` line, in selection order. The annotation becomes
/// part of the history sent on every later request.
pub fn user_turn_text(input: &str, attachments: &[Attachment]) -> String {
    let mut text = input.trim().to_string();
    if !attachments.is_empty() {
        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&format!("[Files attached: {}]", names.join(", ")));
    }
    text
}

/// Builds the chat request body. Pure: same inputs, same output.
///
/// The system turn always comes first; `fileRefs` is omitted when empty.
pub fn build_payload(
    system_prompt: &str,
    turns: &[Turn],
    references: &[AttachmentReference],
) -> ChatRequest {
    let mut conversation = Vec::with_capacity(turns.len() + 1);
    conversation.push(WireMessage {
        role: WireRole::System,
        content: system_prompt.to_string(),
    });
    conversation.extend(turns.iter().map(|turn| WireMessage {
        role: turn.role.into(),
        content: turn.text.clone(),
    }));

    ChatRequest {
        conversation,
        file_refs: references.to_vec(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// Appends a user turn built from the input and the attachments being sent.
    pub fn append_user_turn(&mut self, input: &str, attachments: &[Attachment]) -> &Turn {
        self.push(Turn::new(Role::User, user_turn_text(input, attachments)))
    }

    /// Appends an empty assistant turn to be filled by streaming.
    pub fn begin_assistant_turn(&mut self) -> TurnId {
        self.push(Turn::new(Role::Assistant, String::new())).id
    }

    /// Appends a token to `id` if it is still the last turn and an assistant turn.
    /// Returns false when the turn is frozen or unknown.
    pub fn append_token(&mut self, id: TurnId, token: &str) -> bool {
        match self.turns.last_mut() {
            Some(turn) if turn.id == id && turn.role == Role::Assistant => {
                turn.text.push_str(token);
                true
            }
            _ => false,
        }
    }

    /// Replaces the text of turn `id`. Returns false if no such turn exists.
    pub fn overwrite(&mut self, id: TurnId, text: impl Into<String>) -> bool {
        match self.turns.iter_mut().find(|t| t.id == id) {
            Some(turn) => {
                turn.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, turn: Turn) -> &Turn {
        let index = self.turns.len();
        self.turns.push(turn);
        &self.turns[index]
    }
}
