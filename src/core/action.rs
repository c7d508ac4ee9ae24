//! # Actions
//!
//! Everything that can happen in a session becomes an `Action`.
//! User presses send? That's `Action::Submit(text)`.
//! A token arrives? That's `Action::TokenReceived(token)`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns an `Effect` describing the I/O to perform next.
//! No I/O happens here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! This makes everything testable: build a state, apply actions, assert.

use std::fmt;

use log::{debug, info, warn};

use crate::api::stream::StreamEnd;
use crate::api::types::{AttachmentReference, ChatRequest};
use crate::core::attachments::{Attachment, CandidateFile, LocalId};
use crate::core::conversation::{Role, Turn, build_payload};
use crate::core::state::{ResponseOutcome, ResponsePhase, SessionState};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    EditInput(String),
    SelectFiles(Vec<CandidateFile>),
    RemoveAttachment(usize),
    RetryUploads,
    UploadSucceeded {
        batch: Vec<LocalId>,
        references: Vec<AttachmentReference>,
    },
    UploadFailed {
        batch: Vec<LocalId>,
        error: String,
    },
    Submit(String),
    StreamOpened,
    TokenReceived(String),
    ResponseFinished(StreamEnd),
    ResponseFailed(String),
}

/// Work the caller must perform after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Upload this batch, then report `UploadSucceeded`/`UploadFailed`.
    Upload(Vec<Attachment>),
    /// Stream this request into the in-flight turn.
    SpawnRequest(ChatRequest),
    /// The action was refused; state is unchanged.
    Rejected(Rejection),
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UploadInProgress,
    ResponseInProgress,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UploadInProgress => write!(f, "an upload is in progress"),
            Rejection::ResponseInProgress => write!(f, "a response is in progress"),
        }
    }
}

/// Prefix of the text written into a turn whose request failed.
pub const FAILURE_PREFIX: &str = "Oops! Something went wrong: ";

pub fn failure_text(error: &str) -> String {
    format!("{FAILURE_PREFIX}{error}")
}

fn busy(state: &SessionState) -> Option<Rejection> {
    if state.upload_in_progress {
        Some(Rejection::UploadInProgress)
    } else if state.response_in_progress() {
        Some(Rejection::ResponseInProgress)
    } else {
        None
    }
}

/// No attachments and nothing in flight means no references either.
fn settle_references(state: &mut SessionState) {
    if state.attachments.is_empty()
        && !state.upload_in_progress
        && !state.pending_references().is_empty()
    {
        debug!(
            "Clearing {} reference(s) left without attachments",
            state.pending_references().len()
        );
        state.attachments.clear_references();
    }
}

fn local_ids(batch: &[Attachment]) -> Vec<LocalId> {
    batch.iter().map(|a| a.local_id).collect()
}

/// Applies `action` to `state`.
pub fn update(state: &mut SessionState, action: Action) -> Effect {
    match action {
        Action::EditInput(text) => {
            state.input = text;
            Effect::None
        }

        Action::SelectFiles(files) => {
            if let Some(reason) = busy(state) {
                debug!("Attach rejected: {}", reason);
                return Effect::Rejected(reason);
            }
            state.notice = None;
            let batch = state.attachments.add(files);
            if batch.is_empty() {
                return Effect::None;
            }
            state.upload_in_progress = true;
            Effect::Upload(batch)
        }

        Action::RemoveAttachment(index) => {
            state.attachments.remove(index);
            settle_references(state);
            Effect::None
        }

        Action::RetryUploads => {
            if let Some(reason) = busy(state) {
                return Effect::Rejected(reason);
            }
            state.notice = None;
            let batch = state.attachments.failed();
            if batch.is_empty() {
                return Effect::None;
            }
            state.attachments.mark_uploading(&local_ids(&batch));
            state.upload_in_progress = true;
            Effect::Upload(batch)
        }

        Action::UploadSucceeded { batch, references } => {
            info!("Upload finished: {} reference(s)", references.len());
            state.attachments.record_upload(&batch, references);
            state.upload_in_progress = false;
            settle_references(state);
            Effect::None
        }

        Action::UploadFailed { batch, error } => {
            warn!("Upload failed: {}", error);
            state.attachments.record_upload_failure(&batch);
            state.upload_in_progress = false;
            state.notice = Some(format!("Error uploading files: {error}"));
            settle_references(state);
            Effect::None
        }

        Action::Submit(text) => {
            if let Some(reason) = busy(state) {
                debug!("Send rejected: {}", reason);
                return Effect::Rejected(reason);
            }
            if text.trim().is_empty() && state.pending_references().is_empty() {
                return Effect::None;
            }

            state.notice = None;
            let (attachments, references) = state.attachments.take();
            state.conversation.append_user_turn(&text, &attachments);
            let request = build_payload(
                &state.system_prompt,
                state.conversation.turns(),
                &references,
            );
            let turn = state.conversation.begin_assistant_turn();
            state.input.clear();
            state.phase = ResponsePhase::RequestSent { turn };
            state.last_outcome = None;
            info!(
                "Submitting turn {} with {} attachment(s)",
                state.conversation.len() - 1,
                attachments.len()
            );
            Effect::SpawnRequest(request)
        }

        Action::StreamOpened => {
            if let ResponsePhase::RequestSent { turn } = state.phase {
                state.phase = ResponsePhase::Streaming { turn };
            }
            Effect::None
        }

        Action::TokenReceived(token) => {
            match state.in_flight_turn() {
                Some(turn) => {
                    if !state.conversation.append_token(turn, &token) {
                        warn!("In-flight turn is no longer last; dropping token");
                    }
                    state.phase = ResponsePhase::Streaming { turn };
                }
                None => warn!("Token received with no response in flight"),
            }
            Effect::None
        }

        Action::ResponseFinished(end) => {
            state.phase = ResponsePhase::Idle;
            state.last_outcome = Some(match end {
                StreamEnd::Exhausted => ResponseOutcome::Completed,
                StreamEnd::EndMarker => ResponseOutcome::EndedEarly,
            });
            Effect::None
        }

        Action::ResponseFailed(error) => {
            let text = failure_text(&error);
            let overwritten = state
                .in_flight_turn()
                .is_some_and(|turn| state.conversation.overwrite(turn, text.clone()));
            if !overwritten {
                // Only reachable if the placeholder vanished.
                state.conversation.push(Turn::new(Role::Assistant, text));
            }
            state.phase = ResponsePhase::Idle;
            state.last_outcome = Some(ResponseOutcome::Failed);
            Effect::None
        }
    }
}
