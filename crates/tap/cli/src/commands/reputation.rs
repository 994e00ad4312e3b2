use clap::Subcommand;
use serde_json::json;
use tap_intent::ReputationReason;
use tap_types::AgentAddress;

use crate::output::print_json;
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum ReputationCommands {
    /// Apply a signed delta to an agent's score
    Update {
        #[arg(long)]
        agent: String,
        #[arg(long, allow_negative_numbers = true)]
        delta: i64,
        /// successful_transaction, failed_transaction, or free text
        #[arg(long)]
        reason: String,
    },

    /// Read an agent's score from the ledger
    Score { agent: String },
}

pub async fn execute(command: ReputationCommands, runtime: &Runtime) -> anyhow::Result<()> {
    let reputation = &runtime.context().reputation;
    let (agent, score) = match command {
        ReputationCommands::Update {
            agent,
            delta,
            reason,
        } => {
            let agent = AgentAddress::parse(agent)?;
            let score = reputation
                .update_reputation(&agent, delta, ReputationReason::parse(&reason))
                .await?;
            (agent, score)
        }
        ReputationCommands::Score { agent } => {
            let agent = AgentAddress::parse(agent)?;
            let score = reputation.get_agent_score(&agent).await?;
            (agent, score)
        }
    };
    print_json(&json!({ "agent": agent, "score": score }))
}
