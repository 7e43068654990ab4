//! Fleet Health Agent CLI
//!
//! A command-line tool for inspecting a health agent's verdict, routines
//! and vitals, and for posting heartbeats by hand.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{beat, status};

/// Fleet Health Agent CLI
#[derive(Parser)]
#[command(name = "hctl")]
#[command(author, version, about = "CLI for the Fleet Health Agent", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via HCTL_URL env var)
    #[arg(long, env = "HCTL_URL", default_value = "http://localhost:8123")]
    pub url: String,

    /// Path of the agent's health endpoint
    #[arg(long, default_value = "/_health")]
    pub path: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show health, routines and vitals
    Status,

    /// Print the agent's text rendering
    Text,

    /// Exit 0 when healthy, 1 otherwise
    Check,

    /// Post a heartbeat
    Beat {
        /// Heartbeat type (routine.<category> or vitals)
        #[arg(long = "type")]
        kind: String,

        /// Worker id or vitals signal name
        #[arg(long)]
        actor: String,

        /// start, stop, a vitals state, or any other liveness action
        #[arg(long)]
        action: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.url)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            status::show_status(&client, &cli.path, cli.format).await?;
        }
        Commands::Text => {
            status::show_text(&client, &cli.path).await?;
        }
        Commands::Check => match status::check(&client, &cli.path).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                output::print_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        },
        Commands::Beat {
            kind,
            actor,
            action,
        } => {
            beat::send_beat(&client, &kind, &actor, &action, cli.format).await?;
        }
    }

    Ok(())
}
