//! Murmur - conversation sync driver
//!
//! ## Usage
//!
//! ```bash
//! # Run a scripted two-user exchange and print the stored tree
//! murmur demo --alice a@example.com --bob b@example.com
//!
//! # Same, with a legacy-compatible sync config and readable logs
//! murmur demo --config legacy.toml --log-level debug --pretty
//!
//! # Show the storage key for some addresses
//! murmur keys a@example.com someone.else@example.org
//! ```

mod demo;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use murmur_core::StorageKey;
use murmur_logging::{LogConfig, MurmurSubscriberBuilder};
use murmur_messaging::SyncConfig;

use demo::DemoUsers;

/// Murmur - conversation sync over a remote tree store
#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Conversation and message sync over a remote tree store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a two-user exchange against an in-memory store
    Demo {
        /// First participant's email
        #[arg(long, default_value = "alice@example.com")]
        alice: String,

        /// First participant's display name
        #[arg(long, default_value = "Alice Example")]
        alice_name: String,

        /// Second participant's email
        #[arg(long, default_value = "bob@example.com")]
        bob: String,

        /// Second participant's display name
        #[arg(long, default_value = "Bob Example")]
        bob_name: String,

        /// Sync configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log level, overridden by RUST_LOG
        #[arg(long, default_value = "warn")]
        log_level: String,

        /// Human-readable logs instead of JSONL
        #[arg(long)]
        pretty: bool,
    },
    /// Print the storage key for each email address
    Keys {
        /// Addresses to convert
        #[arg(required = true)]
        emails: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            alice,
            alice_name,
            bob,
            bob_name,
            config,
            log_level,
            pretty,
        } => {
            let _guard = MurmurSubscriberBuilder::new()
                .with_config(LogConfig::default())
                .with_level(log_level)
                .with_pretty(pretty)
                .init()
                .context("Failed to initialize logging")?;

            let config = match config {
                Some(path) => SyncConfig::from_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => SyncConfig::default(),
            };
            let users = DemoUsers {
                alice: (alice, alice_name),
                bob: (bob, bob_name),
            };
            cmd_demo(config, users).await
        }
        Commands::Keys { emails } => cmd_keys(&emails),
    }
}

async fn cmd_demo(config: SyncConfig, users: DemoUsers) -> Result<()> {
    let report = demo::run(config, users).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_keys(emails: &[String]) -> Result<()> {
    for line in key_lines(emails)? {
        println!("{line}");
    }
    Ok(())
}

fn key_lines(emails: &[String]) -> Result<Vec<String>> {
    emails
        .iter()
        .map(|email| {
            let key = StorageKey::from_email(email)
                .with_context(|| format!("Invalid email address {email:?}"))?;
            Ok(format!("{email}\t{key}"))
        })
        .collect()
}
