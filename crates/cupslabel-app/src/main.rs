// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cupslabel: label printing to a CUPS server.
//
// Entry point. Initialises logging, loads the configuration, and runs one
// subcommand: list printers, print a label, inspect or change settings, or
// serve the HTTP relay.

mod commands;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cupslabel_core::human_errors::humanize_error;

use services::config_store::ConfigStore;

/// cupslabel - print labels to a CUPS server
#[derive(Parser, Debug)]
#[command(name = "cupslabel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <data dir>/cupslabel/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the printer queues on the configured CUPS server
    Printers,

    /// Print a PDF label
    Print {
        /// PDF file to print
        file: PathBuf,

        /// Printer queue (defaults to the PRINTER setting)
        #[arg(long)]
        printer: Option<String>,

        /// Number of copies
        #[arg(long, default_value_t = 1)]
        copies: i64,

        /// Job title base (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
    },

    /// Show settings, or change one
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Serve the HTTP relay
    Serve {
        /// Address to listen on (defaults to the listen_addr setting)
        #[arg(long)]
        listen: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Validate and store a setting (SERVER, PORT, USER, PASSWORD, PRINTER)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = cli
        .config
        .map(ConfigStore::new)
        .unwrap_or_else(ConfigStore::default_location);

    let result = match cli.command {
        Commands::Printers => commands::printers(&store).await,
        Commands::Print {
            file,
            printer,
            copies,
            title,
        } => commands::print(&store, &file, printer, copies, title).await,
        Commands::Settings { action: None } => commands::show_settings(&store),
        Commands::Settings {
            action: Some(SettingsAction::Set { key, value }),
        } => commands::set_setting(&store, &key, &value),
        Commands::Serve { listen } => commands::serve(&store, listen).await,
    };

    if let Err(e) = result {
        let human = humanize_error(&e);
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", human.message);
        eprintln!("{}", human.suggestion);
        std::process::exit(1);
    }
}
