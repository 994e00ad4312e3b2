use clap::Subcommand;
use tap_intent::RegisterAgent;
use tap_types::AgentAddress;

use crate::config::Settings;
use crate::output::print_json;
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    /// Register the configured public key on the ledger
    Register {
        #[arg(long)]
        owner: String,
        /// Recorded locally in place of the secret itself
        #[arg(long, default_value = "env:ED25519_PRIVATE_KEY")]
        private_key_ref: String,
        #[arg(long, default_value = "")]
        metadata_uri: String,
    },

    /// Show the locally stored agent record
    Show { address: String },

    /// Mark an agent inactive in the local store
    Deactivate { address: String },
}

pub async fn execute(
    command: AgentCommands,
    runtime: &Runtime,
    settings: &Settings,
) -> anyhow::Result<()> {
    let agents = &runtime.context().agents;
    let agent = match command {
        AgentCommands::Register {
            owner,
            private_key_ref,
            metadata_uri,
        } => {
            let keypair = settings.require_keypair()?;
            agents
                .register(RegisterAgent {
                    owner,
                    keypair,
                    private_key_ref,
                    metadata_uri,
                })
                .await?
        }
        AgentCommands::Show { address } => agents.get(&AgentAddress::parse(address)?).await?,
        AgentCommands::Deactivate { address } => {
            agents.deactivate(&AgentAddress::parse(address)?).await?
        }
    };
    print_json(&serde_json::to_value(&agent)?)
}
