//! Codeweave CLI: the main entry point.
//!
//! Commands:
//! - `run`: Load a directory and run one request through the orchestrator
//! - `tools`: List the tool catalog
//! - `config`: Show, validate or locate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "codeweave",
    about = "Codeweave, a tool-calling orchestrator for code edits",
    version,
    author
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
    /// Run one request against a project directory
    Run {
        /// Project directory to load
        dir: PathBuf,

        /// What to do
        #[arg(short, long)]
        request: String,

        /// File the user is looking at (relative to the directory)
        #[arg(short, long)]
        active: Option<String>,

        /// fix, explain or chat
        #[arg(short, long, default_value = "fix")]
        mode: String,

        /// Stream text and progress as it arrives
        #[arg(long)]
        stream: bool,

        /// Always send every file in full
        #[arg(long)]
        no_compression: bool,

        /// Raise the context size threshold for large-context models
        #[arg(long)]
        high_capacity: bool,

        /// Precomputed project summary used for compressed context
        #[arg(long, env = "CODEWEAVE_PROJECT_SUMMARY")]
        summary: Option<String>,
    },

    /// List the tools the model can call
    Tools,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Check the configuration for problems
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            dir,
            request,
            active,
            mode,
            stream,
            no_compression,
            high_capacity,
            summary,
        } => {
            commands::run::run(commands::run::RunArgs {
                dir,
                request,
                active,
                mode: mode.parse()?,
                stream,
                compression: !no_compression,
                high_capacity,
                summary,
            })
            .await?
        }
        Commands::Tools => commands::tools::run(),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Path => commands::config_cmd::path(),
        },
    }

    Ok(())
}
