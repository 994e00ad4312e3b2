//! Resolve command-line and environment settings into runtime configuration.

use anyhow::{anyhow, bail};
use clap::{Args, ValueEnum};
use std::time::Duration;
use tap_intent::{IntentManagerConfig, ReadMode, ReputationConfig};
use tap_signer::{AgentKeypair, SignerConfig};
use tap_store::StoreConfig;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedgerMode {
    /// `http` when a ledger url is configured, otherwise `memory`.
    Auto,
    /// In-process reference ledger; state lasts for this process only.
    Memory,
    Http,
}

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Local mirror database, e.g. sqlite://tap.db. In-memory when unset.
    #[arg(long, global = true, env = "TAP_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Ledger bridge endpoint.
    #[arg(long, global = true, env = "TAP_LEDGER_URL")]
    pub ledger_url: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LedgerMode::Auto, env = "TAP_LEDGER_MODE")]
    pub ledger_mode: LedgerMode,

    /// Upper bound on any single ledger call.
    #[arg(long, global = true, default_value_t = 30, env = "TAP_LEDGER_TIMEOUT_SECS")]
    pub ledger_timeout_secs: u64,

    /// Answer status reads from the local mirror when the ledger is unreachable.
    #[arg(long, global = true, env = "TAP_ALLOW_MIRROR_FALLBACK")]
    pub allow_mirror_fallback: bool,

    /// Base58 64-byte agent keypair.
    #[arg(long, global = true, env = "ED25519_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Base58 32-byte agent public key.
    #[arg(long, global = true, env = "ED25519_PUBLIC_KEY")]
    pub public_key: Option<String>,

    #[arg(long, global = true, default_value = "primary-ed25519", env = "TAP_KEY_ID")]
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerSettings {
    Memory,
    Http { endpoint: String },
}

/// Everything the runtime needs, resolved once.
#[derive(Debug)]
pub struct Settings {
    pub store: StoreConfig,
    pub ledger: LedgerSettings,
    pub intents: IntentManagerConfig,
    pub reputation: ReputationConfig,
    pub signer: SignerConfig,
    keypair: Option<AgentKeypair>,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs) -> anyhow::Result<Self> {
        let ledger_url = args
            .ledger_url
            .clone()
            .filter(|url| !url.trim().is_empty());
        let ledger = match args.ledger_mode {
            LedgerMode::Memory => LedgerSettings::Memory,
            LedgerMode::Http => {
                let endpoint = ledger_url
                    .ok_or_else(|| anyhow!("ledger_mode=http requires --ledger-url or TAP_LEDGER_URL"))?;
                LedgerSettings::Http { endpoint }
            }
            LedgerMode::Auto => match ledger_url {
                Some(endpoint) => LedgerSettings::Http { endpoint },
                None => LedgerSettings::Memory,
            },
        };

        let store = match args.database_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => StoreConfig::sqlite(url),
            _ => StoreConfig::Memory,
        };

        if args.ledger_timeout_secs == 0 {
            bail!("ledger timeout must be at least one second");
        }
        let ledger_timeout = Duration::from_secs(args.ledger_timeout_secs);
        let intents = IntentManagerConfig {
            ledger_timeout,
            read_mode: if args.allow_mirror_fallback {
                ReadMode::AllowMirrorFallback
            } else {
                ReadMode::LedgerOnly
            },
        };
        let reputation = ReputationConfig {
            ledger_timeout,
            ..ReputationConfig::default()
        };

        let keypair = match (&args.private_key, &args.public_key) {
            (Some(secret), Some(public)) => {
                let secret = Zeroizing::new(secret.clone());
                Some(AgentKeypair::from_base58(&secret, public)?)
            }
            (None, None) => None,
            _ => bail!("ED25519_PRIVATE_KEY and ED25519_PUBLIC_KEY must be set together"),
        };
        let signer = SignerConfig {
            key_id: args.key_id.clone(),
            ..SignerConfig::default()
        };

        Ok(Self {
            store,
            ledger,
            intents,
            reputation,
            signer,
            keypair,
        })
    }

    pub fn keypair(&self) -> Option<&AgentKeypair> {
        self.keypair.as_ref()
    }

    /// The configured agent keypair, or an error naming the variables to set.
    pub fn require_keypair(&self) -> anyhow::Result<&AgentKeypair> {
        self.keypair
            .as_ref()
            .ok_or_else(|| anyhow!("set ED25519_PRIVATE_KEY and ED25519_PUBLIC_KEY (or pass --private-key/--public-key)"))
    }
}
