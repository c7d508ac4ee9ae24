use std::path::PathBuf;

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: send it as the next user turn.
    Send(String),
    Attach(Vec<PathBuf>),
    /// Zero-based index into the pending attachment list.
    Remove(usize),
    Retry,
    Files,
    Help,
    Quit,
    /// A command that could not be understood; the message says why.
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  /attach <path>...   attach PDF or DOCX files
  /remove <n>         remove pending attachment n (see /files)
  /retry              retry failed uploads
  /files              list pending attachments
  /help               show this help
  /quit               exit
Anything else is sent as a message.";

pub fn parse(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "attach" if args.is_empty() => Command::Invalid("usage: /attach <path>...".to_string()),
        "attach" => Command::Attach(args.iter().map(PathBuf::from).collect()),
        "remove" | "rm" => match args.as_slice() {
            [n] => match n.parse::<usize>() {
                Ok(n) if n >= 1 => Command::Remove(n - 1),
                _ => Command::Invalid(format!("not an attachment number: {n}")),
            },
            _ => Command::Invalid("usage: /remove <n>".to_string()),
        },
        "retry" => Command::Retry,
        "files" => Command::Files,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Invalid(format!("unknown command: /{other}")),
    }
}
