use clap::Subcommand;
use serde_json::json;
use tap_intent::{ExecuteIntent, RecordIntent};
use tap_types::{AgentAddress, IntentAddress, IntentHash};

use crate::config::Settings;
use crate::output::print_json;
use crate::runtime::Runtime;

#[derive(Debug, Subcommand)]
pub enum IntentCommands {
    /// Print a fresh random intent hash
    NewHash,

    /// Record an intent on the ledger
    Record {
        #[arg(long)]
        agent: String,
        /// Upper bound in the smallest currency unit
        #[arg(long)]
        max_amount: u64,
        #[arg(long)]
        action: String,
        #[arg(long = "ttl", allow_negative_numbers = true)]
        ttl_seconds: i64,
        /// Reuse a hash from `intent new-hash`; generated when omitted
        #[arg(long)]
        hash: Option<String>,
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long, default_value = "")]
        user_signature: String,
        #[arg(long, default_value = "")]
        merchant: String,
    },

    /// Show the intent's current status
    Verify { address: String },

    /// Settle an intent with the configured agent key
    Execute {
        #[arg(long = "intent")]
        address: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        action_id: String,
    },

    /// Revoke an unexecuted intent
    Revoke { address: String },

    /// Overwrite the local copy with ledger state
    Reconcile { address: String },
}

pub async fn execute(
    command: IntentCommands,
    runtime: &Runtime,
    settings: &Settings,
) -> anyhow::Result<()> {
    let manager = &runtime.context().manager;
    match command {
        IntentCommands::NewHash => {
            println!("{}", manager.generate_intent_hash());
            Ok(())
        }
        IntentCommands::Record {
            agent,
            max_amount,
            action,
            ttl_seconds,
            hash,
            user,
            user_signature,
            merchant,
        } => {
            let hash = match hash {
                Some(raw) => IntentHash::parse(&raw)?,
                None => manager.generate_intent_hash(),
            };
            let request = RecordIntent::new(
                AgentAddress::parse(agent)?,
                hash.clone(),
                max_amount,
                action,
                ttl_seconds,
            )
            .authorized_by(user, user_signature)
            .with_merchant(merchant);
            let recorded = manager.record_intent(request).await?;
            print_json(&json!({
                "intent_hash": hash,
                "intent_address": recorded.address,
                "created_at": recorded.created_at,
                "expires_at": recorded.expires_at,
            }))
        }
        IntentCommands::Verify { address } => {
            let address = IntentAddress::parse(address)?;
            let status = manager.verify_intent(&address).await?;
            print_json(&json!({ "intent_address": address, "status": status }))
        }
        IntentCommands::Execute {
            address,
            agent,
            amount,
            action_id,
        } => {
            let keypair = settings.require_keypair()?;
            let request = ExecuteIntent {
                action_id,
                intent_address: IntentAddress::parse(address)?,
                agent: AgentAddress::parse(agent)?,
                amount,
                agent_secret: keypair.secret_base58(),
                agent_public_key: keypair.public_base58(),
            };
            let address = request.intent_address.clone();
            let execution_ref = manager.execute_intent(request).await?;
            print_json(&json!({ "intent_address": address, "execution_ref": execution_ref }))
        }
        IntentCommands::Revoke { address } => {
            let address = IntentAddress::parse(address)?;
            manager.revoke_intent(&address).await?;
            print_json(&json!({ "intent_address": address, "revoked": true }))
        }
        IntentCommands::Reconcile { address } => {
            let address = IntentAddress::parse(address)?;
            let intent = manager.reconcile_intent(&address).await?;
            print_json(&serde_json::to_value(&intent)?)
        }
    }
}
