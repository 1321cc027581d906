// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! bodyleak CLI
//!
//! Command-line interface for the bodyleak memory-growth regression harness.
//! RSS reports go to stdout, one JSON object per line; logs and the final
//! verdict go to stderr.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

/// bodyleak - Memory-growth regression harness for HTTP request bodies
#[derive(Parser)]
#[command(name = "bodyleak")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the harness against a target endpoint
    Run {
        /// URL of the echo endpoint to POST to
        target: String,

        /// Request body length in bytes
        body_size: String,

        /// Body representation: blob, buffer, string, form-data,
        /// url-search-params, async-iterator or stream
        body_kind: String,

        /// Optional YAML file overriding the tuning constants
        #[arg(short, long)]
        tuning: Option<String>,
    },

    /// Serve a local echo target
    Serve {
        /// Port to listen on (0 picks a free port)
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },

    /// Validate a tuning file
    Validate {
        /// Path to the tuning file
        file: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures.
            return if e.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Run {
            target,
            body_size,
            body_kind,
            tuning,
        } => commands::run::execute(&target, &body_size, &body_kind, tuning.as_deref()).await,
        Commands::Serve { port } => commands::serve::execute(port).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ {} error: {}", e.class(), e);
            ExitCode::FAILURE
        }
    }
}
