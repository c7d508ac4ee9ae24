//! # Session State
//!
//! Everything the presentation layer renders, in one value. The state is
//! owned by the session controller and changes only through
//! `update(state, action)` in action.rs; observers get a fresh copy after
//! every change.
//!
//! ```text
//! SessionState
//! ├── conversation: Conversation        // ordered turns
//! ├── attachments: AttachmentStore      // pending files + references
//! ├── input: String                     // input buffer
//! ├── system_prompt: String             // fixed first turn of every request
//! ├── upload_in_progress: bool          // one upload at a time
//! ├── phase: ResponsePhase              // Idle | RequestSent | Streaming
//! ├── last_outcome: Option<...>         // how the last response ended
//! └── notice: Option<String>            // user-visible upload failure
//! ```

use crate::api::types::AttachmentReference;
use crate::core::attachments::{Attachment, AttachmentStore};
use crate::core::conversation::{Conversation, DEFAULT_SYSTEM_PROMPT, TurnId};

/// Where the current response is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponsePhase {
    #[default]
    Idle,
    /// Request issued, placeholder turn appended, no response yet.
    RequestSent { turn: TurnId },
    /// Body is being consumed into `turn`.
    Streaming { turn: TurnId },
}

impl ResponsePhase {
    pub fn in_flight_turn(&self) -> Option<TurnId> {
        match *self {
            ResponsePhase::Idle => None,
            ResponsePhase::RequestSent { turn } | ResponsePhase::Streaming { turn } => Some(turn),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The body ended on its own.
    Completed,
    /// An `event: end` frame stopped consumption.
    EndedEarly,
    /// The request or the stream failed; the turn holds the failure text.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub conversation: Conversation,
    pub attachments: AttachmentStore,
    pub input: String,
    pub system_prompt: String,
    pub upload_in_progress: bool,
    pub phase: ResponsePhase,
    pub last_outcome: Option<ResponseOutcome>,
    pub notice: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl SessionState {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            conversation: Conversation::new(),
            attachments: AttachmentStore::new(),
            input: String::new(),
            system_prompt: system_prompt.into(),
            upload_in_progress: false,
            phase: ResponsePhase::Idle,
            last_outcome: None,
            notice: None,
        }
    }

    pub fn pending_attachments(&self) -> &[Attachment] {
        self.attachments.attachments()
    }

    pub fn pending_references(&self) -> &[AttachmentReference] {
        self.attachments.references()
    }

    /// True iff the last turn is the in-flight assistant turn.
    pub fn response_in_progress(&self) -> bool {
        self.phase != ResponsePhase::Idle
    }

    pub fn in_flight_turn(&self) -> Option<TurnId> {
        self.phase.in_flight_turn()
    }

    /// Whether a send would currently be accepted for `text`.
    pub fn can_send(&self, text: &str) -> bool {
        !self.upload_in_progress
            && !self.response_in_progress()
            && (!text.trim().is_empty() || !self.pending_references().is_empty())
    }

    pub fn can_attach(&self) -> bool {
        !self.upload_in_progress && !self.response_in_progress()
    }
}
