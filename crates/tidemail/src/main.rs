//! Tidemail - a small IMAP4rev1 server backed by an in-memory mail store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tidemail_imap::connection::load_tls_acceptor;
use tidemail_imap::types::normalize_name;
use tidemail_imap::{MemoryStore, Server, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tidemail")]
#[command(about = "IMAP4rev1 server with an in-memory mail store")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = tidemail_imap::connection::DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// PEM certificate chain; enables STARTTLS together with --key
    #[arg(long, requires = "key")]
    cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, requires = "cert")]
    key: Option<PathBuf>,

    /// User account as NAME:PASSWORD (repeatable)
    #[arg(long = "user", value_parser = parse_user)]
    users: Vec<(String, String)>,

    /// Mailbox to create, with `/` separating levels (repeatable)
    #[arg(long = "mailbox", default_value = "INBOX")]
    mailboxes: Vec<String>,

    /// Seconds of inactivity before a client is logged out (0 disables)
    #[arg(long, default_value = "1800")]
    idle_timeout: u64,

    /// Largest literal a client may send, in bytes
    #[arg(long, default_value_t = tidemail_imap::connection::DEFAULT_MAX_LITERAL_SIZE)]
    max_literal_size: usize,
}

fn parse_user(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((name, password)) if !name.is_empty() => {
            Ok((name.to_string(), password.to_string()))
        }
        _ => Err(format!("expected NAME:PASSWORD, got {s:?}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidemail=info,tidemail_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let store = Arc::new(MemoryStore::new());
    for (name, password) in &args.users {
        store.add_user(name.as_str(), password.as_str())?;
    }
    for mailbox in &args.mailboxes {
        store
            .create_mailbox(&normalize_name(mailbox))
            .with_context(|| format!("creating mailbox {mailbox}"))?;
    }
    if args.users.is_empty() {
        tracing::warn!("no users configured; every LOGIN will fail");
    }

    let idle_timeout = (args.idle_timeout > 0).then(|| Duration::from_secs(args.idle_timeout));
    let mut config = ServerConfig::builder()
        .listen_addr(args.listen)
        .idle_timeout(idle_timeout)
        .max_literal_size(args.max_literal_size);

    if let (Some(cert), Some(key)) = (&args.cert, &args.key) {
        let acceptor = load_tls_acceptor(cert, key)
            .with_context(|| format!("loading TLS material from {}", cert.display()))?;
        config = config.tls(acceptor);
        info!("STARTTLS enabled");
    }

    let config = config.build();
    info!(addr = %config.listen_addr, "Starting Tidemail");

    Server::new(config, store.clone(), store).run().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user() {
        assert_eq!(
            parse_user("fred:se:cret").unwrap(),
            ("fred".to_string(), "se:cret".to_string())
        );
        assert!(parse_user("fred").is_err());
        assert!(parse_user(":pw").is_err());
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "tidemail",
            "--user",
            "fred:secret",
            "--mailbox",
            "INBOX",
            "--mailbox",
            "Archive/2024",
            "--idle-timeout",
            "0",
        ])
        .unwrap();
        assert_eq!(args.users.len(), 1);
        assert_eq!(args.mailboxes, ["INBOX", "Archive/2024"]);
        assert_eq!(args.idle_timeout, 0);
        assert_eq!(args.listen, "127.0.0.1:1143");
    }

    #[test]
    fn test_cert_requires_key() {
        assert!(Args::try_parse_from(["tidemail", "--cert", "cert.pem"]).is_err());
    }
}
