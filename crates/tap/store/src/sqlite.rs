//! SQLite adapter for the TAP store.
//!
//! Column names and defaults follow the persistence schema shared with other
//! TAP deployments; timestamps are RFC 3339 text and flags are 0/1 integers.

use crate::model::{check_replacement, validate_intent, AgentPatch, IntentPatch};
use crate::traits::{AgentStore, IntentStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::path::Path;
use std::str::FromStr;
use tap_types::{Agent, AgentAddress, Intent, IntentAddress, IntentHash};
use tracing::debug;

const AGENT_COLUMNS: &str = "address, public_key, private_key_ref, owner, reputation_score, \
     registered_at, is_active, total_intents, successful_txns, failed_txns, metadata_uri";

const INTENT_COLUMNS: &str = "hash, agent_address, user, user_signature, max_amount, merchant, \
     created_at, expires_at, executed, revoked, execution_ref";

/// SQLite-backed TAP store.
#[derive(Debug, Clone)]
pub struct SqliteTapStore {
    pool: SqlitePool,
}

impl SqliteTapStore {
    /// Connect using a `sqlite:` URL and initialize the schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 5).await
    }

    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
    ) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidInput(format!("bad database url: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Open (creating if needed) a database file.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database.
    ///
    /// Pinned to a single connection that never idles out; every new
    /// connection to `:memory:` would otherwise see an empty database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open sqlite: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection. Further calls fail with a backend error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                address TEXT NOT NULL UNIQUE,
                public_key TEXT NOT NULL,
                private_key_ref TEXT NOT NULL,
                owner TEXT NOT NULL,
                reputation_score INTEGER NOT NULL DEFAULT 0,
                registered_at TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                total_intents INTEGER NOT NULL DEFAULT 0,
                successful_txns INTEGER NOT NULL DEFAULT 0,
                failed_txns INTEGER NOT NULL DEFAULT 0,
                metadata_uri TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS intents (
                hash TEXT NOT NULL UNIQUE,
                agent_address TEXT NOT NULL,
                user TEXT NOT NULL,
                user_signature TEXT NOT NULL,
                max_amount INTEGER NOT NULL,
                merchant TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                executed INTEGER NOT NULL DEFAULT 0,
                revoked INTEGER NOT NULL DEFAULT 0,
                execution_ref TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS intent_addresses (
                address TEXT NOT NULL UNIQUE,
                hash TEXT NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        debug!("sqlite schema ready");
        Ok(())
    }
}

#[async_trait]
impl AgentStore for SqliteTapStore {
    async fn upsert_agent(&self, agent: Agent) -> StorageResult<()> {
        let sql = format!(
            r#"
            INSERT INTO agents ({AGENT_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (address) DO UPDATE SET
                public_key = excluded.public_key,
                private_key_ref = excluded.private_key_ref,
                owner = excluded.owner,
                reputation_score = excluded.reputation_score,
                registered_at = excluded.registered_at,
                is_active = excluded.is_active,
                total_intents = excluded.total_intents,
                successful_txns = excluded.successful_txns,
                failed_txns = excluded.failed_txns,
                metadata_uri = excluded.metadata_uri
            "#
        );
        sqlx::query(&sql)
            .bind(agent.address.0)
            .bind(agent.public_key)
            .bind(agent.private_key_ref)
            .bind(agent.owner)
            .bind(agent.reputation_score)
            .bind(timestamp(agent.registered_at))
            .bind(agent.is_active)
            .bind(to_i64("total_intents", agent.total_intents)?)
            .bind(to_i64("successful_txns", agent.successful_txns)?)
            .bind(to_i64("failed_txns", agent.failed_txns)?)
            .bind(agent.metadata_uri)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_agent(&self, address: &AgentAddress) -> StorageResult<Option<Agent>> {
        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE address = ?");
        let row = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(agent_row_to_record).transpose()
    }

    async fn update_agent(
        &self,
        address: &AgentAddress,
        patch: AgentPatch,
    ) -> StorageResult<Agent> {
        patch.validate()?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE agents SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(score) = patch.reputation_score {
                set.push("reputation_score = ").push_bind_unseparated(score);
            }
            if let Some(active) = patch.is_active {
                set.push("is_active = ").push_bind_unseparated(active);
            }
            if let Some(total) = patch.total_intents {
                set.push("total_intents = ")
                    .push_bind_unseparated(to_i64("total_intents", total)?);
            }
            if let Some(ok) = patch.successful_txns {
                set.push("successful_txns = ")
                    .push_bind_unseparated(to_i64("successful_txns", ok)?);
            }
            if let Some(failed) = patch.failed_txns {
                set.push("failed_txns = ")
                    .push_bind_unseparated(to_i64("failed_txns", failed)?);
            }
            if let Some(uri) = patch.metadata_uri.clone() {
                set.push("metadata_uri = ").push_bind_unseparated(uri);
            }
        }
        qb.push(" WHERE address = ").push_bind(address.as_str().to_string());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let result = qb
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("agent {address} not found")));
        }

        let sql = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE address = ?");
        let row = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let agent = agent_row_to_record(row)?;
        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(agent)
    }
}

#[async_trait]
impl IntentStore for SqliteTapStore {
    async fn upsert_intent(&self, intent: Intent) -> StorageResult<()> {
        validate_intent(&intent)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let select = format!("SELECT {INTENT_COLUMNS} FROM intents WHERE hash = ?");
        let current = sqlx::query(&select)
            .bind(intent.hash.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map(intent_row_to_record)
            .transpose()?;
        if let Some(current) = &current {
            check_replacement(current, &intent)?;
        }

        let sql = format!(
            r#"
            INSERT INTO intents ({INTENT_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (hash) DO UPDATE SET
                agent_address = excluded.agent_address,
                user = excluded.user,
                user_signature = excluded.user_signature,
                max_amount = excluded.max_amount,
                merchant = excluded.merchant,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at,
                executed = excluded.executed,
                revoked = excluded.revoked,
                execution_ref = excluded.execution_ref
            "#
        );
        sqlx::query(&sql)
            .bind(intent.hash.as_str().to_string())
            .bind(intent.agent_address.0)
            .bind(intent.user)
            .bind(intent.user_signature)
            .bind(to_i64("max_amount", intent.max_amount)?)
            .bind(intent.merchant)
            .bind(timestamp(intent.created_at))
            .bind(timestamp(intent.expires_at))
            .bind(intent.executed)
            .bind(intent.revoked)
            .bind(intent.execution_ref)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_conflict)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_intent(&self, hash: &IntentHash) -> StorageResult<Option<Intent>> {
        let sql = format!("SELECT {INTENT_COLUMNS} FROM intents WHERE hash = ?");
        let row = sqlx::query(&sql)
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(intent_row_to_record).transpose()
    }

    async fn update_intent(&self, hash: &IntentHash, patch: IntentPatch) -> StorageResult<Intent> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let sql = format!("SELECT {INTENT_COLUMNS} FROM intents WHERE hash = ?");
        let current = sqlx::query(&sql)
            .bind(hash.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map(intent_row_to_record)
            .transpose()?
            .ok_or_else(|| StorageError::NotFound(format!("intent {hash} not found")))?;

        let next = patch.apply(&current)?;
        sqlx::query(
            r#"
            UPDATE intents
               SET executed = ?, revoked = ?, execution_ref = ?
             WHERE hash = ?
            "#,
        )
        .bind(next.executed)
        .bind(next.revoked)
        .bind(next.execution_ref.clone())
        .bind(hash.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(next)
    }

    async fn index_intent_address(
        &self,
        address: &IntentAddress,
        hash: &IntentHash,
    ) -> StorageResult<()> {
        // The no-op update only fires when the stored hash already matches.
        let result = sqlx::query(
            r#"
            INSERT INTO intent_addresses (address, hash)
            VALUES (?, ?)
            ON CONFLICT (address) DO UPDATE SET hash = excluded.hash
             WHERE intent_addresses.hash = excluded.hash
            "#,
        )
        .bind(address.as_str())
        .bind(hash.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "intent address {address} already maps to another hash"
            )));
        }
        Ok(())
    }

    async fn resolve_intent_address(
        &self,
        address: &IntentAddress,
    ) -> StorageResult<Option<IntentHash>> {
        let row = sqlx::query("SELECT hash FROM intent_addresses WHERE address = ?")
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| {
            let raw: String = r
                .try_get("hash")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            parse_hash(&raw)
        })
        .transpose()
    }
}

fn agent_row_to_record(row: SqliteRow) -> StorageResult<Agent> {
    let address: String = row
        .try_get("address")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let registered_at: String = row
        .try_get("registered_at")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let metadata_uri: Option<String> = row
        .try_get("metadata_uri")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Agent {
        address: AgentAddress(address),
        public_key: row
            .try_get("public_key")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        private_key_ref: row
            .try_get("private_key_ref")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        owner: row
            .try_get("owner")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        reputation_score: row
            .try_get("reputation_score")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        registered_at: parse_timestamp("registered_at", &registered_at)?,
        is_active: flag(&row, "is_active")?,
        total_intents: counter(&row, "total_intents")?,
        successful_txns: counter(&row, "successful_txns")?,
        failed_txns: counter(&row, "failed_txns")?,
        metadata_uri: metadata_uri.unwrap_or_default(),
    })
}

fn intent_row_to_record(row: SqliteRow) -> StorageResult<Intent> {
    let hash: String = row
        .try_get("hash")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let agent_address: String = row
        .try_get("agent_address")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let expires_at: String = row
        .try_get("expires_at")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Intent {
        hash: parse_hash(&hash)?,
        agent_address: AgentAddress(agent_address),
        user: row
            .try_get("user")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        user_signature: row
            .try_get("user_signature")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        max_amount: counter(&row, "max_amount")?,
        merchant: row
            .try_get("merchant")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        expires_at: parse_timestamp("expires_at", &expires_at)?,
        executed: flag(&row, "executed")?,
        revoked: flag(&row, "revoked")?,
        execution_ref: row
            .try_get("execution_ref")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn flag(row: &SqliteRow, column: &str) -> StorageResult<bool> {
    let raw: i64 = row
        .try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(raw != 0)
}

fn counter(row: &SqliteRow, column: &str) -> StorageResult<u64> {
    let raw: i64 = row
        .try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    u64::try_from(raw)
        .map_err(|_| StorageError::Serialization(format!("{column} is negative: {raw}")))
}

fn parse_hash(raw: &str) -> StorageResult<IntentHash> {
    IntentHash::parse(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(column: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("{column} `{raw}`: {e}")))
}

fn to_i64(column: &str, value: u64) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput(format!("{column} too large: {value}")))
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn nanosecond_timestamps_survive_round_trip() {
        let store = SqliteTapStore::in_memory().await.unwrap();
        let agent = Agent::new(
            AgentAddress("agent-ns".into()),
            "pk",
            "ref",
            "owner",
            Utc::now(),
        );
        store.upsert_agent(agent.clone()).await.unwrap();
        let loaded = store.get_agent(&agent.address).await.unwrap().unwrap();
        assert_eq!(loaded.registered_at, agent.registered_at);
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected() {
        let store = SqliteTapStore::in_memory().await.unwrap();
        let now = Utc::now();
        let intent = Intent {
            hash: IntentHash::generate(),
            agent_address: AgentAddress("agent".into()),
            user: "u".into(),
            user_signature: "s".into(),
            max_amount: u64::MAX,
            merchant: "m".into(),
            created_at: now,
            expires_at: now + Duration::minutes(5),
            executed: false,
            revoked: false,
            execution_ref: None,
        };
        assert!(matches!(
            store.upsert_intent(intent).await,
            Err(StorageError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn address_index_conflict_is_reported() {
        let store = SqliteTapStore::in_memory().await.unwrap();
        let address = IntentAddress("addr-1".into());
        let hash = IntentHash::generate();
        store.index_intent_address(&address, &hash).await.unwrap();
        store.index_intent_address(&address, &hash).await.unwrap();
        assert!(matches!(
            store
                .index_intent_address(&address, &IntentHash::generate())
                .await,
            Err(StorageError::Conflict(_))
        ));
    }
}
