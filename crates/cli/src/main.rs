//! Toolwright CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Initialize config
//! - `chat`     Interactive or single-message chat over a tool pack
//! - `extract`  Structured JSON extraction through a forced tool call
//! - `config`   Show, validate, or locate the configuration

use clap::{Parser, Subcommand};

use crate::commands::chat::Pack;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolwright",
    about = "Toolwright: tool-use conversation runtime",
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
    /// Initialize configuration
    Onboard,

    /// Chat with the support assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Tool-selection policy for each user turn: auto, any, or a tool name
        /// (defaults to the pack's own policy)
        #[arg(long)]
        tool_choice: Option<String>,

        /// Which tool pack the assistant gets
        #[arg(long, value_enum, default_value_t = Pack::Support)]
        pack: Pack,
    },

    /// Extract structured JSON from text by forcing a tool call
    Extract {
        /// Tool whose schema shapes the output
        #[arg(short, long, default_value = "print_sentiment_scores")]
        tool: String,

        /// Input text (read from stdin when omitted)
        #[arg(long)]
        text: Option<String>,
    },

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
    /// Load and validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            message,
            tool_choice,
            pack,
        } => commands::chat::run(message, tool_choice.as_deref(), pack).await?,
        Commands::Extract { tool, text } => commands::extract::run(&tool, text).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
