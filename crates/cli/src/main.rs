//! Toolgate CLI — the main entry point.
//!
//! Commands:
//! - `run`    — One-shot turn from a prompt
//! - `chat`   — Interactive REPL over one session
//! - `tools`  — Print the tool manifest
//! - `serve`  — Start the HTTP gateway
//! - `config` — Show the effective configuration
//!
//! Exit codes: 0 on success, 1 when the turn fails (step limit or
//! transport), 2 on usage or configuration errors.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolgate",
    about = "Toolgate — domain-gated tool-calling agent runtime",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single turn and print the result
    Run(commands::run::RunArgs),

    /// Chat interactively over one session
    Chat {
        /// Optional system message for the session
        #[arg(long)]
        system: Option<String>,
    },

    /// Print the tool manifest
    Tools {
        /// Only this domain's tools (files, git, system, assistant)
        #[arg(long)]
        domain: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration (API key redacted)
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Chat { system } => commands::chat::run(system).await,
        Commands::Tools { domain } => commands::tools::run(domain.as_deref()),
        Commands::Serve { host, port } => commands::serve::run(host, port).await,
        Commands::Config => commands::config_cmd::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
