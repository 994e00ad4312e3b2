use std::sync::Arc;
use tap_ledger::{HttpLedgerClient, InMemoryLedger, Ledger};
use tap_signer::RequestSigner;
use tap_store::StoreHandle;
use tap_tools::{ToolContext, ToolRegistry};
use tap_types::{Clock, SystemClock};
use tracing::{info, warn};

use crate::config::{LedgerSettings, Settings};

/// Opened store plus the services built on it, for one CLI invocation.
pub struct Runtime {
    store: StoreHandle,
    context: Arc<ToolContext>,
}

impl Runtime {
    pub async fn open(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = StoreHandle::open(settings.store.clone()).await?;

        let ledger: Arc<dyn Ledger> = match &settings.ledger {
            LedgerSettings::Http { endpoint } => {
                info!(endpoint = %endpoint, "using ledger bridge");
                Arc::new(HttpLedgerClient::new(endpoint, settings.intents.ledger_timeout)?)
            }
            LedgerSettings::Memory => {
                warn!("using the in-process ledger; ledger state ends with this process");
                Arc::new(InMemoryLedger::new(clock.clone()))
            }
        };

        let mut context = ToolContext::new(
            ledger,
            store.store(),
            clock.clone(),
            settings.intents.clone(),
            settings.reputation.clone(),
        );
        if let Some(keypair) = settings.keypair() {
            context = context.with_signer(RequestSigner::with_config(
                keypair.clone(),
                settings.signer.clone(),
                clock,
            ));
        }

        Ok(Self {
            store,
            context: Arc::new(context),
        })
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn tools(&self) -> ToolRegistry {
        ToolRegistry::standard(self.context.clone())
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}
