//! Intent lifecycle against the in-process ledger and a simulated clock.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tap_intent::{
    AgentRegistry, ExecuteIntent, IntentManager, IntentManagerConfig, ReadMode, RecordIntent,
    RegisterAgent, ReputationConfig, ReputationReason, ReputationTracker,
};
use tap_ledger::{InMemoryLedger, Ledger, LedgerError, LedgerOp, SettlementAuthorization};
use tap_signer::AgentKeypair;
use tap_store::memory::InMemoryTapStore;
use tap_store::TapStore;
use tap_types::{Agent, AgentAddress, Clock, IntentAddress, IntentStatus, ManualClock, TapError};

const T0: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

struct Harness {
    clock: Arc<ManualClock>,
    ledger: InMemoryLedger,
    store: Arc<dyn TapStore>,
    manager: IntentManager,
    registry: AgentRegistry,
    reputation: ReputationTracker,
    keypair: AgentKeypair,
    agent: Agent,
}

async fn harness() -> Harness {
    harness_with(IntentManagerConfig::default(), Arc::new(InMemoryTapStore::new())).await
}

async fn harness_with(config: IntentManagerConfig, store: Arc<dyn TapStore>) -> Harness {
    let clock = Arc::new(ManualClock::at_unix(T0));
    let ledger = InMemoryLedger::new(clock.clone());
    let shared: Arc<dyn Ledger> = Arc::new(ledger.clone());

    let manager = IntentManager::new(shared.clone(), store.clone(), clock.clone(), config.clone());
    let registry = AgentRegistry::new(
        shared.clone(),
        store.clone(),
        clock.clone(),
        config.ledger_timeout,
    );
    let reputation = ReputationTracker::new(shared, store.clone(), ReputationConfig::default());

    let keypair = AgentKeypair::generate();
    let agent = registry
        .register(RegisterAgent {
            owner: "owner-wallet".into(),
            keypair: &keypair,
            private_key_ref: "env:ED25519_PRIVATE_KEY".into(),
            metadata_uri: String::new(),
        })
        .await
        .unwrap();

    Harness {
        clock,
        ledger,
        store,
        manager,
        registry,
        reputation,
        keypair,
        agent,
    }
}

impl Harness {
    async fn record(&self, max_amount: u64, ttl_seconds: i64) -> IntentAddress {
        let request = RecordIntent::new(
            self.agent.address.clone(),
            self.manager.generate_intent_hash(),
            max_amount,
            "checkout",
            ttl_seconds,
        )
        .authorized_by("user-wallet", "user-signature")
        .with_merchant("merchant-wallet");
        self.manager.record_intent(request).await.unwrap().address
    }

    fn execute(&self, address: &IntentAddress, amount: u64) -> ExecuteIntent {
        ExecuteIntent {
            action_id: "order-1".into(),
            intent_address: address.clone(),
            agent: self.agent.address.clone(),
            amount,
            agent_secret: self.keypair.secret_base58(),
            agent_public_key: self.keypair.public_base58(),
        }
    }
}

#[tokio::test]
async fn recorded_intent_becomes_expired_without_mutation() {
    let h = harness().await;
    let request = RecordIntent::new(
        h.agent.address.clone(),
        h.manager.generate_intent_hash(),
        1_000_000,
        "checkout",
        3600,
    );
    let recorded = h.manager.record_intent(request).await.unwrap();
    assert_eq!(
        recorded.expires_at,
        Utc.timestamp_opt(T0 + 3600, 0).unwrap()
    );

    assert_eq!(
        h.manager.verify_intent(&recorded.address).await.unwrap(),
        IntentStatus::Active
    );

    let mirror_before = h.manager.mirrored_intent(&recorded.address).await.unwrap();
    let ledger_before = h.ledger.peek_intent(&recorded.address);

    h.clock.advance(Duration::seconds(3601));
    assert_eq!(
        h.manager.verify_intent(&recorded.address).await.unwrap(),
        IntentStatus::Expired
    );

    assert_eq!(
        h.manager.mirrored_intent(&recorded.address).await.unwrap(),
        mirror_before
    );
    assert_eq!(h.ledger.peek_intent(&recorded.address), ledger_before);
}

#[tokio::test]
async fn expired_intent_is_rejected_without_ledger_calls() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    h.clock.advance(Duration::seconds(61));

    let calls = h.ledger.total_calls();
    let err = h.manager.execute_intent(h.execute(&address, 10)).await.unwrap_err();
    assert!(matches!(err, TapError::ExpiredIntent(_)));
    assert_eq!(h.ledger.total_calls(), calls);
}

#[tokio::test]
async fn expiry_boundary_is_exclusive() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    h.clock.advance(Duration::seconds(60));

    let err = h.manager.execute_intent(h.execute(&address, 10)).await.unwrap_err();
    assert!(matches!(err, TapError::ExpiredIntent(_)));
    assert_eq!(
        h.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Expired
    );
}

#[tokio::test]
async fn amount_equal_to_maximum_settles() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;

    let execution_ref = h
        .manager
        .execute_intent(h.execute(&address, 1_000))
        .await
        .unwrap();

    let mirrored = h.manager.mirrored_intent(&address).await.unwrap().unwrap();
    assert!(mirrored.executed);
    assert_eq!(mirrored.execution_ref.as_deref(), Some(execution_ref.as_str()));
    assert_eq!(
        h.ledger.peek_intent(&address).unwrap().execution_ref,
        Some(execution_ref)
    );
    assert_eq!(
        h.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Executed
    );
}

#[tokio::test]
async fn amount_above_maximum_is_rejected_locally() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;

    let calls = h.ledger.total_calls();
    let err = h
        .manager
        .execute_intent(h.execute(&address, 1_001))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TapError::AmountExceeded {
            requested: 1_001,
            max_amount: 1_000
        }
    ));
    assert_eq!(h.ledger.total_calls(), calls);
}

#[tokio::test]
async fn second_execution_fails_and_keeps_reference() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    let first = h.manager.execute_intent(h.execute(&address, 500)).await.unwrap();

    let calls = h.ledger.total_calls();
    let err = h
        .manager
        .execute_intent(h.execute(&address, 500))
        .await
        .unwrap_err();
    assert!(matches!(err, TapError::AlreadyExecuted(_)));
    assert_eq!(h.ledger.total_calls(), calls);

    let mirrored = h.manager.mirrored_intent(&address).await.unwrap().unwrap();
    assert_eq!(mirrored.execution_ref, Some(first.clone()));
    assert_eq!(h.ledger.peek_intent(&address).unwrap().execution_ref, Some(first));
}

#[tokio::test]
async fn revoke_after_execute_fails() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    h.manager.execute_intent(h.execute(&address, 1)).await.unwrap();

    let err = h.manager.revoke_intent(&address).await.unwrap_err();
    assert!(matches!(err, TapError::AlreadyExecuted(_)));

    let mirrored = h.manager.mirrored_intent(&address).await.unwrap().unwrap();
    assert!(!mirrored.revoked);
    assert!(!h.ledger.peek_intent(&address).unwrap().revoked);
}

#[tokio::test]
async fn revoked_intent_cannot_execute_or_revoke_again() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    h.manager.revoke_intent(&address).await.unwrap();

    assert_eq!(
        h.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Revoked
    );
    assert!(matches!(
        h.manager.execute_intent(h.execute(&address, 1)).await,
        Err(TapError::AlreadyRevoked(_))
    ));
    assert!(matches!(
        h.manager.revoke_intent(&address).await,
        Err(TapError::AlreadyRevoked(_))
    ));
}

#[tokio::test]
async fn malformed_key_material_is_rejected_before_ledger() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;

    let mut request = h.execute(&address, 1);
    request.agent_secret = zeroize::Zeroizing::new("3yZe7d".to_string());

    let calls = h.ledger.total_calls();
    let err = h.manager.execute_intent(request).await.unwrap_err();
    assert!(matches!(err, TapError::InvalidKeyMaterial(_)));
    assert_eq!(h.ledger.total_calls(), calls);
}

#[tokio::test]
async fn ledger_failure_leaves_mirror_unchanged() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;
    h.ledger.fail_next(
        LedgerOp::ExecuteIntent,
        LedgerError::Transport("connection reset by peer".into()),
    );

    let err = h.manager.execute_intent(h.execute(&address, 1)).await.unwrap_err();
    match err {
        TapError::LedgerUnavailable(LedgerError::Transport(msg)) => {
            assert_eq!(msg, "connection reset by peer")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mirrored = h.manager.mirrored_intent(&address).await.unwrap().unwrap();
    assert!(!mirrored.executed);
    assert_eq!(mirrored.execution_ref, None);
}

#[tokio::test]
async fn lagging_mirror_is_caught_by_ledger_revalidation() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;

    // settle behind the manager's back
    let auth = SettlementAuthorization::sign(
        &h.keypair,
        "elsewhere",
        address.clone(),
        h.agent.address.clone(),
        5,
    );
    let reference = h.ledger.execute_intent(auth).await.unwrap();

    let err = h.manager.execute_intent(h.execute(&address, 5)).await.unwrap_err();
    assert!(matches!(err, TapError::AlreadyExecuted(_)));
    assert_eq!(h.ledger.calls(LedgerOp::ExecuteIntent), 1);

    let mirrored = h.manager.mirrored_intent(&address).await.unwrap().unwrap();
    assert!(mirrored.executed);
    assert_eq!(mirrored.execution_ref, Some(reference));
}

#[tokio::test]
async fn concurrent_managers_settle_at_most_once() {
    let h = harness().await;
    let address = h.record(1_000, 60).await;

    // a second manager with its own empty mirror shares only the ledger
    let other = IntentManager::new(
        Arc::new(h.ledger.clone()),
        Arc::new(InMemoryTapStore::new()),
        h.clock.clone(),
        IntentManagerConfig::default(),
    );

    let (a, b) = tokio::join!(
        h.manager.execute_intent(h.execute(&address, 10)),
        other.execute_intent(h.execute(&address, 10)),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(
        h.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Executed
    );
}

#[tokio::test]
async fn invalid_record_arguments_fail_before_ledger() {
    let h = harness().await;
    let calls = h.ledger.total_calls();
    for ttl in [0, -5, i64::MAX] {
        let request = RecordIntent::new(
            h.agent.address.clone(),
            h.manager.generate_intent_hash(),
            10,
            "checkout",
            ttl,
        );
        assert!(matches!(
            h.manager.record_intent(request).await,
            Err(TapError::InvalidInput(_))
        ));
    }
    assert_eq!(h.ledger.total_calls(), calls);
}

#[tokio::test]
async fn out_of_range_ttl_leaves_manager_usable() {
    let h = harness().await;
    let request = RecordIntent::new(
        h.agent.address.clone(),
        h.manager.generate_intent_hash(),
        10,
        "checkout",
        i64::MAX,
    );
    assert!(matches!(
        h.manager.record_intent(request).await,
        Err(TapError::InvalidInput(_))
    ));

    let address = h.record(10, 60).await;
    assert_eq!(
        h.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Active
    );
}

#[tokio::test]
async fn settlement_and_revocation_are_mirrored() {
    let h = harness().await;
    let settled = h.record(1_000, 60).await;
    let reference = h.manager.execute_intent(h.execute(&settled, 250)).await.unwrap();
    let mirrored = h.manager.mirrored_intent(&settled).await.unwrap().unwrap();
    assert!(mirrored.executed);
    assert_eq!(mirrored.execution_ref, Some(reference));

    let withdrawn = h.record(1_000, 60).await;
    h.manager.revoke_intent(&withdrawn).await.unwrap();
    let mirrored = h.manager.mirrored_intent(&withdrawn).await.unwrap().unwrap();
    assert!(mirrored.revoked);
    assert!(!mirrored.executed);
}

#[tokio::test]
async fn unknown_agent_and_intent_are_not_found() {
    let h = harness().await;
    let request = RecordIntent::new(
        AgentAddress("ghost".into()),
        h.manager.generate_intent_hash(),
        10,
        "checkout",
        60,
    );
    assert!(matches!(
        h.manager.record_intent(request).await,
        Err(TapError::NotFound(_))
    ));

    let unknown = IntentAddress("nowhere".into());
    assert_eq!(
        h.manager.verify_intent(&unknown).await.unwrap(),
        IntentStatus::NotFound
    );
    assert!(matches!(
        h.manager.revoke_intent(&unknown).await,
        Err(TapError::NotFound(_))
    ));
}

#[tokio::test]
async fn degraded_reads_fall_back_to_mirror_only_when_allowed() {
    let strict = harness().await;
    let address = strict.record(1_000, 60).await;
    strict.ledger.fail_next(
        LedgerOp::VerifyIntent,
        LedgerError::Transport("ledger down".into()),
    );
    assert!(matches!(
        strict.manager.verify_intent(&address).await,
        Err(TapError::LedgerUnavailable(_))
    ));

    let config = IntentManagerConfig {
        read_mode: ReadMode::AllowMirrorFallback,
        ..IntentManagerConfig::default()
    };
    let lenient = harness_with(config, Arc::new(InMemoryTapStore::new())).await;
    let address = lenient.record(1_000, 60).await;
    lenient.ledger.fail_next(
        LedgerOp::VerifyIntent,
        LedgerError::Transport("ledger down".into()),
    );
    assert_eq!(
        lenient.manager.verify_intent(&address).await.unwrap(),
        IntentStatus::Active
    );
}

#[tokio::test]
async fn slow_ledger_times_out() {
    let config = IntentManagerConfig {
        ledger_timeout: StdDuration::from_millis(50),
        ..IntentManagerConfig::default()
    };
    let h = harness_with(config, Arc::new(InMemoryTapStore::new())).await;
    let address = h.record(1_000, 60).await;

    h.ledger.set_latency(Some(StdDuration::from_millis(500)));
    let err = h.manager.verify_intent(&address).await.unwrap_err();
    assert!(matches!(
        err,
        TapError::LedgerUnavailable(LedgerError::Timeout(limit)) if limit == StdDuration::from_millis(50)
    ));
}

#[tokio::test]
async fn registry_tracks_agents_and_intent_counts() {
    let h = harness().await;
    let registered = h.registry.get(&h.agent.address).await.unwrap();
    assert_eq!(registered, h.agent);
    assert_eq!(registered.public_key, h.keypair.public_base58());
    assert_eq!(registered.registered_at, h.clock.now());
    assert!(registered.is_active);

    h.record(10, 60).await;
    h.record(10, 60).await;
    assert_eq!(h.registry.get(&h.agent.address).await.unwrap().total_intents, 2);

    let deactivated = h.registry.deactivate(&h.agent.address).await.unwrap();
    assert!(!deactivated.is_active);
    assert_eq!(deactivated.total_intents, 2);

    assert!(matches!(
        h.registry.get(&AgentAddress("ghost".into())).await,
        Err(TapError::NotFound(_))
    ));
}

#[tokio::test]
async fn reputation_mirrors_ledger_score_and_counters() {
    let h = harness().await;
    let agent = &h.agent.address;

    assert_eq!(h.reputation.record_outcome(agent, true).await.unwrap(), 5);
    assert_eq!(h.reputation.record_outcome(agent, false).await.unwrap(), -5);
    assert_eq!(
        h.reputation
            .update_reputation(agent, 2, ReputationReason::Adjustment("manual".into()))
            .await
            .unwrap(),
        -3
    );

    let mirrored = h.store.get_agent(agent).await.unwrap().unwrap();
    assert_eq!(mirrored.reputation_score, -3);
    assert_eq!(mirrored.successful_txns, 1);
    assert_eq!(mirrored.failed_txns, 1);
    assert_eq!(h.reputation.get_agent_score(agent).await.unwrap(), -3);
}
