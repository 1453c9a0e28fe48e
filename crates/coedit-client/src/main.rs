//! coedit: terminal client for a shared document's live-edit channel.
//!
//! Joins one document, prints remote changes as they arrive, and sends each
//! stdin line as a whole-document edit. The document JSON is supplied from a
//! file (the response of `GET /documents/{id}/`); this binary does not speak
//! the REST API itself.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use coedit_client::{ChannelTarget, EditSession, SessionUpdate};
use coedit_core::document::Document;

#[derive(Parser, Debug)]
#[command(name = "coedit")]
#[command(about = "Live-edit client for shared documents")]
struct Args {
    /// Base URL of the live-edit server
    #[arg(long, default_value = "ws://localhost:8000")]
    server: Url,

    /// Path to the document JSON as returned by GET /documents/{id}/
    #[arg(long)]
    document: PathBuf,

    /// Id of the authenticated user
    #[arg(long)]
    user: u64,

    /// Bearer token for the channel
    #[arg(long)]
    token: String,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,coedit_client=debug"
    } else {
        "info,coedit_client=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let raw = std::fs::read(&args.document)
        .with_context(|| format!("reading document file {:?}", args.document))?;
    let document: Document = serde_json::from_slice(&raw).context("parsing document JSON")?;

    let target = ChannelTarget::new(&args.server, document.id, &args.token)?;

    info!("Joining document {} ({})", document.id, document.title);
    let mut session = EditSession::new(document, args.user, target);

    if !session.can_edit() {
        info!("Read-only session: no write permission on this document");
    }

    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            update = session.poll() => {
                match update {
                    Some(SessionUpdate::RemoteChange) => {
                        println!("--- document updated ---");
                        println!("{}", session.text());
                    }
                    Some(SessionUpdate::Status) => {
                        if let Some(banner) = session.status().banner() {
                            warn!("{}", banner);
                        } else if let Some(warning) = session.status().transient_warning() {
                            // Shown until it auto-dismisses or the state moves on.
                            warn!("{}", warning);
                        } else if session.status().connected() {
                            info!("Connected");
                        }
                        if session.status().is_fatal() {
                            break;
                        }
                    }
                    Some(SessionUpdate::Ended) => {
                        info!("Connection closed by server");
                        break;
                    }
                    None => break,
                }
            }

            line = lines.next_line() => {
                match line? {
                    Some(text) => {
                        if session.edit(text).await.is_err() {
                            warn!("Edit rejected: no write permission");
                        }
                        if session.unsynced() {
                            warn!("Some local edits have not reached the server");
                        }
                    }
                    None => {
                        info!("stdin closed");
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.teardown().await;
    info!("Session ended");
    Ok(())
}
