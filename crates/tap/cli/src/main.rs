//! TAP CLI - agent keys, signed requests and the intent lifecycle.
//!
//! Settings come from flags, the environment, and an optional `.env` file:
//! `TAP_DATABASE_URL`, `TAP_LEDGER_URL`, `TAP_LEDGER_MODE`,
//! `TAP_LEDGER_TIMEOUT_SECS`, `ED25519_PRIVATE_KEY`, `ED25519_PUBLIC_KEY`,
//! `TAP_KEY_ID`.

use clap::{Parser, Subcommand};
use tap_signer::TAG_BROWSER_AUTH;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;
mod runtime;

use commands::{agent, intent, keys, reputation, tools};
use config::{GlobalArgs, Settings};
use runtime::Runtime;

#[derive(Debug, Parser)]
#[command(name = "tap", version, about = "Trusted Agent Protocol - intent-scoped authorization for agents")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a new Ed25519 agent keypair
    Keygen,

    /// Sign a request to URL with the configured agent key
    Sign {
        #[arg(long)]
        url: String,
        /// agent-browser-auth or agent-payer-auth
        #[arg(long, default_value = TAG_BROWSER_AUTH)]
        tag: String,
    },

    /// Agent registration and records
    Agent {
        #[command(subcommand)]
        command: agent::AgentCommands,
    },

    /// Intent lifecycle
    Intent {
        #[command(subcommand)]
        command: intent::IntentCommands,
    },

    /// Agent reputation
    Reputation {
        #[command(subcommand)]
        command: reputation::ReputationCommands,
    },

    /// The tool-calling surface
    Tools {
        #[command(subcommand)]
        command: tools::ToolCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tap=info,info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(&cli.global)?;

    match cli.command {
        Commands::Keygen => keys::keygen(),
        Commands::Sign { url, tag } => keys::sign(&settings, &url, &tag),
        command => {
            let runtime = Runtime::open(&settings).await?;
            let outcome = dispatch(command, &runtime, &settings).await;
            runtime.close().await;
            outcome
        }
    }
}

async fn dispatch(command: Commands, runtime: &Runtime, settings: &Settings) -> anyhow::Result<()> {
    match command {
        Commands::Agent { command } => agent::execute(command, runtime, settings).await,
        Commands::Intent { command } => intent::execute(command, runtime, settings).await,
        Commands::Reputation { command } => reputation::execute(command, runtime).await,
        Commands::Tools { command } => tools::execute(command, runtime).await,
        Commands::Keygen | Commands::Sign { .. } => Ok(()),
    }
}
