//! JSON client for a ledger bridge service.

use crate::settlement::SettlementAuthorization;
use crate::traits::Ledger;
use crate::types::{IntentAccount, RecordIntentRequest, RecordedIntent};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tap_types::{AgentAddress, IntentAddress, LedgerError, LedgerResult};
use tracing::debug;

/// HTTP client for the ledger bridge.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RegisterAgentBody {
    identity: String,
}

#[derive(Debug, Deserialize)]
struct RegisterAgentReply {
    address: AgentAddress,
}

#[derive(Debug, Deserialize)]
struct ExecuteReply {
    execution_ref: String,
}

#[derive(Debug, Serialize)]
struct ReputationBody<'a> {
    delta: i64,
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct ScoreReply {
    score: i64,
}

/// Error body returned by the bridge on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    reason: String,
}

impl HttpLedgerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> LedgerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "ledger GET");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.handle_response(path, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> LedgerResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "ledger POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.handle_response(path, response).await
    }

    /// POST whose reply body carries nothing the caller needs.
    async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> LedgerResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "ledger POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from(path, response).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> LedgerResult<T> {
        if response.status().is_success() {
            response.json().await.map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout(self.timeout)
                } else {
                    LedgerError::Decode(e.to_string())
                }
            })
        } else {
            Err(self.error_from(path, response).await)
        }
    }

    async fn error_from(&self, path: &str, response: reqwest::Response) -> LedgerError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return LedgerError::NotFound(path.to_string());
        }
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => LedgerError::Rejected {
                code: body.code,
                reason: body.reason,
            },
            Err(_) => LedgerError::Rejected {
                code: status.as_u16().to_string(),
                reason: text,
            },
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Ledger for HttpLedgerClient {
    async fn register_agent(&self, identity: &[u8]) -> LedgerResult<AgentAddress> {
        let body = RegisterAgentBody {
            identity: bs58::encode(identity).into_string(),
        };
        let reply: RegisterAgentReply = self.post("/agents", &body).await?;
        Ok(reply.address)
    }

    async fn record_intent(&self, request: RecordIntentRequest) -> LedgerResult<RecordedIntent> {
        self.post("/intents", &request).await
    }

    async fn verify_intent(&self, address: &IntentAddress) -> LedgerResult<Option<IntentAccount>> {
        match self.get(&format!("/intents/{address}")).await {
            Ok(account) => Ok(Some(account)),
            Err(LedgerError::NotFound(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn execute_intent(
        &self,
        authorization: SettlementAuthorization,
    ) -> LedgerResult<String> {
        let path = format!("/intents/{}/execute", authorization.intent_address);
        let reply: ExecuteReply = self.post(&path, &authorization).await?;
        Ok(reply.execution_ref)
    }

    async fn revoke_intent(&self, address: &IntentAddress) -> LedgerResult<()> {
        self.post_unit(&format!("/intents/{address}/revoke"), &serde_json::json!({}))
            .await
    }

    async fn update_reputation(
        &self,
        agent: &AgentAddress,
        delta: i64,
        reason: &str,
    ) -> LedgerResult<()> {
        self.post_unit(
            &format!("/agents/{agent}/reputation"),
            &ReputationBody { delta, reason },
        )
        .await
    }

    async fn get_agent_score(&self, agent: &AgentAddress) -> LedgerResult<i64> {
        let reply: ScoreReply = self.get(&format!("/agents/{agent}/score")).await?;
        Ok(reply.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_normalized() {
        let client = HttpLedgerClient::new("http://localhost:8899/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8899");
    }
}
