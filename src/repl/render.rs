//! Turns successive state snapshots into terminal output.
//!
//! Snapshots may be skipped (the watch channel only keeps the latest), so
//! rendering diffs against what has already been printed instead of
//! replaying actions.

use crate::core::attachments::{Attachment, UploadStatus};
use crate::core::conversation::Role;
use crate::core::state::SessionState;

pub const ASSISTANT_PREFIX: &str = "assistant> ";

#[derive(Debug, Default)]
pub struct Renderer {
    /// Turns printed in full.
    committed: usize,
    /// Text already printed for the turn at index `committed`.
    partial: Option<String>,
    last_notice: Option<String>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the output needed to bring the terminal up to `state`.
    pub fn render(&mut self, state: &SessionState) -> String {
        let mut out = String::new();
        let turns = state.conversation.turns();
        let in_flight = state.in_flight_turn();

        while self.committed < turns.len() {
            let turn = &turns[self.committed];
            let live = in_flight == Some(turn.id);

            if turn.role == Role::Assistant {
                match self.partial.take() {
                    None => {
                        out.push_str(ASSISTANT_PREFIX);
                        out.push_str(&turn.text);
                    }
                    Some(printed) => match turn.text.strip_prefix(printed.as_str()) {
                        Some(rest) => out.push_str(rest),
                        // Overwritten (request failure): start a fresh line.
                        None => {
                            out.push('\n');
                            out.push_str(ASSISTANT_PREFIX);
                            out.push_str(&turn.text);
                        }
                    },
                }
            }

            if live {
                self.partial = Some(turn.text.clone());
                break;
            }
            if turn.role == Role::Assistant {
                out.push('\n');
            }
            self.committed += 1;
        }

        if state.notice != self.last_notice {
            if let Some(notice) = &state.notice {
                out.push_str(&format!("! {notice}\n"));
            }
            self.last_notice = state.notice.clone();
        }

        out
    }
}

/// Lists pending attachments, numbered from 1.
pub fn attachment_list(attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return "No files attached.\n".to_string();
    }
    attachments
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let status = match a.status {
                UploadStatus::Uploading => "uploading",
                UploadStatus::Uploaded => "uploaded",
                UploadStatus::Failed => "failed, /retry to upload again",
            };
            format!("  {}. {} ({}) [{}]\n", i + 1, a.name, format_size(a.size), status)
        })
        .collect()
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stream::StreamEnd;
    use crate::core::action::{Action, update};
    use crate::core::attachments::{CandidateFile, PDF_MIME};

    fn state_after(actions: Vec<Action>) -> SessionState {
        let mut state = SessionState::default();
        for action in actions {
            update(&mut state, action);
        }
        state
    }

    #[test]
    fn test_streaming_prints_only_new_text() {
        let mut renderer = Renderer::new();
        let mut state = state_after(vec![Action::Submit("hi".into()), Action::StreamOpened]);
        assert_eq!(renderer.render(&state), ASSISTANT_PREFIX);

        update(&mut state, Action::TokenReceived("Hel".into()));
        assert_eq!(renderer.render(&state), "Hel");
        update(&mut state, Action::TokenReceived("lo".into()));
        assert_eq!(renderer.render(&state), "lo");

        update(&mut state, Action::ResponseFinished(StreamEnd::Exhausted));
        assert_eq!(renderer.render(&state), "\n");
        assert_eq!(renderer.render(&state), "");
    }

    #[test]
    fn test_skipped_snapshots_still_render_everything() {
        let mut renderer = Renderer::new();
        let state = state_after(vec![
            Action::Submit("hi".into()),
            Action::TokenReceived("a".into()),
            Action::TokenReceived("b".into()),
            Action::ResponseFinished(StreamEnd::EndMarker),
        ]);
        assert_eq!(renderer.render(&state), format!("{ASSISTANT_PREFIX}ab\n"));
    }

    #[test]
    fn test_failure_overwrite_starts_new_line() {
        let mut renderer = Renderer::new();
        let mut state = state_after(vec![
            Action::Submit("hi".into()),
            Action::TokenReceived("partial".into()),
        ]);
        renderer.render(&state);

        update(&mut state, Action::ResponseFailed("boom".into()));
        let out = renderer.render(&state);
        assert!(out.starts_with('\n'));
        assert!(out.contains("Oops! Something went wrong: boom"));
    }

    #[test]
    fn test_notice_printed_once() {
        let mut renderer = Renderer::new();
        let mut state = SessionState::default();
        state.notice = Some("Error uploading files: nope".to_string());
        assert_eq!(renderer.render(&state), "! Error uploading files: nope\n");
        assert_eq!(renderer.render(&state), "");
    }

    #[test]
    fn test_attachment_list_numbers_from_one() {
        let mut state = SessionState::default();
        update(
            &mut state,
            Action::SelectFiles(vec![CandidateFile::new("a.pdf", PDF_MIME, vec![0u8; 2048])]),
        );
        let listing = attachment_list(state.pending_attachments());
        assert_eq!(listing, "  1. a.pdf (2.0 KB) [uploading]\n");
        assert_eq!(attachment_list(&[]), "No files attached.\n");
    }
}
