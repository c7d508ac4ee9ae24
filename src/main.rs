use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use parley::api::HttpBackend;
use parley::core::config::{self, ParleyConfig};
use parley::core::session::SessionController;
use parley::repl;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

#[derive(Parser)]
#[command(name = "parley", about = "Chat with a document-aware assistant over HTTP")]
struct Args {
    /// Backend base URL (overrides PARLEY_BASE_URL and the config file)
    #[arg(long)]
    base_url: Option<String>,

    /// Where to write the log
    #[arg(long, default_value = "parley.log")]
    log_file: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(&args.log_file) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = config::load_config().unwrap_or_else(|e| {
        log::warn!("Ignoring config file: {}", e);
        eprintln!("warning: {e}; using defaults");
        ParleyConfig::default()
    });
    let resolved = config::resolve(&file_config, args.base_url.as_deref());

    log::info!(
        "Parley starting up (upload: {}, chat: {})",
        resolved.upload_url(),
        resolved.chat_url()
    );

    let backend = Arc::new(HttpBackend::from_config(&resolved));
    let controller = Arc::new(SessionController::new(backend, &resolved));

    repl::run(controller).await
}
