//! # Line-oriented Adapter
//!
//! Reads commands from stdin, hands them to the session controller, and
//! prints state changes as they are published. Knows nothing about HTTP.
//!
//! Sends and uploads run on spawned tasks so the prompt stays responsive
//! while a reply streams in; the controller itself refuses overlapping
//! sends and uploads.

pub mod command;
pub mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::core::attachments::CandidateFile;
use crate::core::session::SessionController;
use crate::core::state::SessionState;
use command::{Command, HELP};
use render::{Renderer, attachment_list};

pub async fn run(controller: Arc<SessionController>) -> io::Result<()> {
    println!("Connected. Type a message, or /help for commands.");

    let render_task = tokio::spawn(render_loop(controller.subscribe()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match command::parse(&line) {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Invalid(message) => println!("! {message}"),
            Command::Files => print!("{}", attachment_list(controller.snapshot().pending_attachments())),
            Command::Remove(index) => {
                let count = controller.snapshot().pending_attachments().len();
                if index < count {
                    controller.remove_attachment(index);
                } else {
                    println!("! no attachment {} ({} pending)", index + 1, count);
                }
            }
            Command::Retry => {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    if let Err(e) = controller.retry_uploads().await {
                        println!("! cannot retry: {e}");
                    }
                });
            }
            Command::Attach(paths) => {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    let files = read_files(paths).await;
                    if files.is_empty() {
                        return;
                    }
                    if let Err(e) = controller.attach(files).await {
                        println!("! cannot attach: {e}");
                    }
                });
            }
            Command::Send(text) => {
                // Sent directly so a rejected line never lingers in the input buffer.
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    if let Err(e) = controller.send(text).await {
                        println!("! cannot send: {e}");
                    }
                });
            }
        }
        io::stdout().flush()?;
    }

    info!("Input closed, shutting down");
    render_task.abort();
    Ok(())
}

async fn read_files(paths: Vec<PathBuf>) -> Vec<CandidateFile> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match CandidateFile::from_path(&path).await {
            Ok(file) => files.push(file),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                println!("! cannot read {}: {}", path.display(), e);
            }
        }
    }
    files
}

async fn render_loop(mut rx: watch::Receiver<SessionState>) {
    let mut renderer = Renderer::new();
    while rx.changed().await.is_ok() {
        let output = renderer.render(&rx.borrow_and_update());
        if output.is_empty() {
            continue;
        }
        let mut stdout = io::stdout().lock();
        if stdout.write_all(output.as_bytes()).and_then(|_| stdout.flush()).is_err() {
            break;
        }
    }
}
