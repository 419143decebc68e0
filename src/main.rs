use std::env;
use std::sync::Arc;

use anyhow::Context;
use mailsink::capture::parse_port;
use mailsink::{CaptureConfig, IngestionOutcome, MailIngestor, SmtpServer, logging};
use tracing::{info, warn};

fn main() {
    if let Err(e) = run() {
        eprintln!("Failed to start server: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut config = match args.get(1) {
        Some(path) => CaptureConfig::load_with_env(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => {
            let mut config = CaptureConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };
    if let Some(port) = args.get(2) {
        config.server.port = parse_port(port)?;
    }

    logging::init(&config.logging);

    let ingestor =
        Arc::new(MailIngestor::from_config(&config).context("building the mail ingestor")?);

    ingestor
        .hub()
        .subscribe(|outcome: &IngestionOutcome| {
            let record = outcome.record();
            match outcome {
                IngestionOutcome::Accepted(_) => info!(
                    from = record.sender(),
                    to = record.recipient(),
                    subject = record.subject(),
                    "received email"
                ),
                IngestionOutcome::Rejected(_) => warn!(
                    from = record.sender(),
                    to = record.recipient(),
                    "rejected email, recipient outside relay domains"
                ),
            }
        })
        .detach();

    let server = SmtpServer::new(&config.server.hostname, ingestor);
    server
        .start(&config.server.address())
        .with_context(|| format!("serving SMTP on {}", config.server.address()))
}
