// SPDX-FileCopyrightText: 2026 Licensa Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Licensa - licenses and usage quotas on a public consensus log.
//!
//! Read commands project state from a topic's messages on the mirror; `issue`
//! drives the license issuance workflow through the ledger gateway. Output is
//! JSON on stdout, logs go to stderr.

mod issue;
mod query;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use licensa_config::LicensaConfig;
use licensa_core::{AccountId, LicensaError, TopicId};
use licensa_ledger::LedgerGatewayClient;
use licensa_mirror::{MirrorClient, TopicMessageStore};
use licensa_projection::QuotaPolicy;
use serde::Serialize;

use crate::query::View;

/// Licensa - licenses and usage quotas on a public consensus log.
#[derive(Parser, Debug)]
#[command(name = "licensa", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TopicArgs {
    /// Topic id, e.g. 0.0.4521.
    topic: TopicId,
    /// Bypass the message cache.
    #[arg(long)]
    refresh: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every decoded message on a topic, oldest first.
    Messages(TopicArgs),
    /// Print the remaining usage quota.
    Quota(TopicArgs),
    /// Print the current subscription and whether it is active.
    Subscription(TopicArgs),
    /// Print the license recorded on a topic.
    License(TopicArgs),
    /// List the projects created on a topic.
    Projects(TopicArgs),
    /// Print the chat history on a topic.
    Chat(TopicArgs),
    /// Print every projection of a topic at once.
    Snapshot(TopicArgs),
    /// Issue a license NFT to an account.
    Issue {
        /// Account receiving the license.
        holder: AccountId,
        /// Workflow state file; created if missing, resumed if present.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match licensa_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            licensa_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.log.level);

    let failed = match run(cli.command, &config).await {
        Ok(failed) => failed,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if failed {
        std::process::exit(2);
    }
}

/// Runs one command. Returns true when the command ran but did not succeed.
async fn run(command: Commands, config: &LicensaConfig) -> Result<bool, LicensaError> {
    let (view, args) = match command {
        Commands::Config => {
            print_json(&redacted(config))?;
            return Ok(false);
        }
        Commands::Issue { holder, state } => {
            let store = message_store(config)?;
            let ledger = Arc::new(LedgerGatewayClient::from_config(&config.ledger)?);
            let report =
                issue::run_issue(ledger, store, &config.ledger, holder, state.as_deref()).await?;
            print_json(&report)?;
            return Ok(report.error.is_some());
        }
        Commands::Messages(args) => (View::Messages, args),
        Commands::Quota(args) => (View::Quota, args),
        Commands::Subscription(args) => (View::Subscription, args),
        Commands::License(args) => (View::License, args),
        Commands::Projects(args) => (View::Projects, args),
        Commands::Chat(args) => (View::Chat, args),
        Commands::Snapshot(args) => (View::Snapshot, args),
    };

    let store = message_store(config)?;
    let policy = QuotaPolicy::from_config(&config.quota);
    let value = query::run_query(&store, &policy, view, &args.topic, args.refresh).await?;
    print_json(&value)?;
    Ok(false)
}

fn message_store(config: &LicensaConfig) -> Result<TopicMessageStore, LicensaError> {
    let mirror = Arc::new(MirrorClient::from_config(&config.mirror)?);
    Ok(TopicMessageStore::from_config(
        mirror,
        &config.mirror,
        &config.cache,
    ))
}

fn redacted(config: &LicensaConfig) -> LicensaConfig {
    let mut config = config.clone();
    if config.ledger.api_key.is_some() {
        config.ledger.api_key = Some("<redacted>".to_string());
    }
    config
}

fn print_json(value: &impl Serialize) -> Result<(), LicensaError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LicensaError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Logs to stderr so stdout stays parseable. `RUST_LOG` overrides the config level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("licensa={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
