//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod bulk;
mod download;
mod output;
mod remote;
mod report;
mod serve;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "sitereports")]
#[command(about = "Bulk analytics report downloader with streamed progress")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default from config, else 127.0.0.1:3030)
        bind: Option<String>,
    },

    /// Download one domain's report locally
    Download {
        /// Domain to download
        domain: String,
        /// Analytics database language (default: the site's first language, else "en")
        #[arg(short, long)]
        language: Option<String>,
        /// Monthly visitor threshold (default: the site's configured value)
        #[arg(long)]
        visitors: Option<u64>,
    },

    /// Run a bulk download locally from a JSON request file
    Bulk {
        /// File shaped like the bulk-download request body
        file: PathBuf,
        /// Concurrent downloads (overrides the file and config)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: Option<u64>,
    },

    /// Drive a running server and follow its progress stream
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Inspect or remove stored reports
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Download one domain's report through the server
    Download {
        domain: String,
        /// Server URL (e.g., http://localhost:3030).
        /// Can also be set via SITEREPORTS_URL environment variable.
        #[arg(long, short, env = "SITEREPORTS_URL")]
        url: String,
    },
    /// Start a bulk download on the server
    Bulk {
        /// File shaped like the bulk-download request body
        file: PathBuf,
        /// Server URL (e.g., http://localhost:3030).
        /// Can also be set via SITEREPORTS_URL environment variable.
        #[arg(long, short, env = "SITEREPORTS_URL")]
        url: String,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Show whether a report exists for a domain
    Status { domain: String },
    /// Delete the stored report for a domain
    Delete { domain: String },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, _config) = load_settings_with_options(options)
        .await
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            serve::cmd_serve(&settings, &bind).await
        }
        Commands::Download {
            domain,
            language,
            visitors,
        } => download::cmd_download(&settings, &domain, language.as_deref(), visitors).await,
        Commands::Bulk { file, concurrency } => {
            bulk::cmd_bulk(&settings, &file, concurrency.map(|c| c as usize)).await
        }
        Commands::Remote { command } => match command {
            RemoteCommands::Download { domain, url } => {
                remote::cmd_remote_download(&url, &domain).await
            }
            RemoteCommands::Bulk { file, url } => remote::cmd_remote_bulk(&url, &file).await,
        },
        Commands::Report { command } => match command {
            ReportCommands::Status { domain } => report::cmd_report_status(&settings, &domain).await,
            ReportCommands::Delete { domain } => report::cmd_report_delete(&settings, &domain).await,
        },
    }
}
