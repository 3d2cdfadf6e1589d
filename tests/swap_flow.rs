//! End-to-end swap scenarios over simulated chains.

use async_trait::async_trait;
use omniswap_core::adapter::{
    AdapterConfig, AddressCallback, HtlcParams, SignedTx, Subscription, TxParams, UnsignedTx,
};
use omniswap_core::types::{DestLeg, HtlcState, HtlcStatus, SourceLeg, UserAccount, now_unix_ms};
use omniswap_core::{
    Chain, ChainAdapter, CircuitBreaker, CircuitState, ClientConfig, Error, HubConfig, IntentStatus,
    Keystore, OmniSwap, PrivacyLevel, RefundConfig, RefundEntry, RefundManager, RetryPolicy,
    Solver, StorageFuture, StoredSwap, SwapIntent, SwapStorage,
};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// In-memory swap storage implementation for integration tests.
#[derive(Default)]
struct InMemorySwapStorage {
    data: RwLock<HashMap<String, StoredSwap>>,
}

impl SwapStorage for InMemorySwapStorage {
    fn get(&self, swap_id: &str) -> StorageFuture<'_, Option<StoredSwap>> {
        let swap_id = swap_id.to_string();
        Box::pin(async move { Ok(self.data.read().unwrap().get(&swap_id).cloned()) })
    }

    fn store(&self, swap_id: &str, data: &StoredSwap) -> StorageFuture<'_, ()> {
        let swap_id = swap_id.to_string();
        let data = data.clone();
        Box::pin(async move {
            self.data.write().unwrap().insert(swap_id, data);
            Ok(())
        })
    }

    fn delete(&self, swap_id: &str) -> StorageFuture<'_, ()> {
        let swap_id = swap_id.to_string();
        Box::pin(async move {
            self.data.write().unwrap().remove(&swap_id);
            Ok(())
        })
    }

    fn list(&self) -> StorageFuture<'_, Vec<String>> {
        Box::pin(async move { Ok(self.data.read().unwrap().keys().cloned().collect()) })
    }

    fn get_all(&self) -> StorageFuture<'_, Vec<StoredSwap>> {
        Box::pin(async move { Ok(self.data.read().unwrap().values().cloned().collect()) })
    }
}

/// Simulated chain transaction payload.
#[derive(Serialize, Deserialize)]
enum SimOp {
    Transfer,
    CreateHtlc { htlc_id: String, params: HtlcParams },
    ClaimHtlc { htlc_id: String },
    RefundHtlc { htlc_id: String },
}

/// Minimal simulated chain backing the adapter capability surface.
struct SimChainAdapter {
    chain: Chain,
    htlcs: Mutex<HashMap<String, HtlcStatus>>,
    tx_counter: AtomicU64,
    fail_broadcasts: AtomicU32,
}

impl SimChainAdapter {
    fn new(chain: Chain) -> Self {
        Self {
            chain,
            htlcs: Mutex::new(HashMap::new()),
            tx_counter: AtomicU64::new(0),
            fail_broadcasts: AtomicU32::new(0),
        }
    }

    fn htlc(&self, htlc_id: &str) -> Option<HtlcStatus> {
        self.htlcs.lock().unwrap().get(htlc_id).cloned()
    }

    fn seed_htlc(&self, status: HtlcStatus) {
        self.htlcs.lock().unwrap().insert(status.id.clone(), status);
    }
}

#[async_trait]
impl ChainAdapter for SimChainAdapter {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn initialize(&self, _config: AdapterConfig) -> omniswap_core::Result<()> {
        Ok(())
    }

    async fn get_address(&self, public_key: &[u8]) -> omniswap_core::Result<String> {
        Ok(format!("{}_{}", self.chain, hex::encode(public_key)))
    }

    async fn get_balance(
        &self,
        _address: &str,
        _asset: Option<&str>,
    ) -> omniswap_core::Result<u128> {
        Ok(u128::MAX / 2)
    }

    async fn build_transaction(&self, _params: TxParams) -> omniswap_core::Result<UnsignedTx> {
        Ok(UnsignedTx {
            chain: self.chain,
            payload: serde_json::to_vec(&SimOp::Transfer).unwrap(),
        })
    }

    async fn sign_transaction(
        &self,
        tx: UnsignedTx,
        _private_key: &[u8],
    ) -> omniswap_core::Result<SignedTx> {
        Ok(SignedTx {
            chain: tx.chain,
            payload: tx.payload,
        })
    }

    async fn broadcast_transaction(&self, tx: SignedTx) -> omniswap_core::Result<String> {
        if self
            .fail_broadcasts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Network("simulated outage".into()));
        }
        let tx_hash = format!(
            "sim_{}_{}",
            self.chain,
            self.tx_counter.fetch_add(1, Ordering::SeqCst)
        );
        let op: SimOp = serde_json::from_slice(&tx.payload).unwrap();
        let mut htlcs = self.htlcs.lock().unwrap();
        match op {
            SimOp::Transfer => {}
            SimOp::CreateHtlc { htlc_id, params } => {
                htlcs.insert(
                    htlc_id.clone(),
                    HtlcStatus {
                        id: htlc_id,
                        state: HtlcState::Locked,
                        tx_hash: Some(tx_hash.clone()),
                        claim_tx_hash: None,
                        refund_tx_hash: None,
                        amount: params.amount,
                        hashlock: params.hashlock,
                        timelock: params.timelock,
                    },
                );
            }
            SimOp::ClaimHtlc { htlc_id } => {
                if let Some(status) = htlcs.get_mut(&htlc_id) {
                    status.state = HtlcState::Claimed;
                    status.claim_tx_hash = Some(tx_hash.clone());
                }
            }
            SimOp::RefundHtlc { htlc_id } => {
                if let Some(status) = htlcs.get_mut(&htlc_id) {
                    status.state = HtlcState::Refunded;
                    status.refund_tx_hash = Some(tx_hash.clone());
                }
            }
        }
        Ok(tx_hash)
    }

    async fn create_htlc(&self, params: HtlcParams) -> omniswap_core::Result<UnsignedTx> {
        let htlc_id = omniswap_core::crypto::htlc_id(self.chain, &params.hashlock);
        Ok(UnsignedTx {
            chain: self.chain,
            payload: serde_json::to_vec(&SimOp::CreateHtlc { htlc_id, params }).unwrap(),
        })
    }

    async fn claim_htlc(
        &self,
        htlc_id: &str,
        preimage: &[u8; 32],
    ) -> omniswap_core::Result<UnsignedTx> {
        if let Some(status) = self.htlc(htlc_id) {
            if omniswap_core::crypto::hash_secret(preimage) != status.hashlock {
                return Err(Error::HtlcCreationFailed(format!(
                    "bad preimage for {htlc_id}"
                )));
            }
        }
        Ok(UnsignedTx {
            chain: self.chain,
            payload: serde_json::to_vec(&SimOp::ClaimHtlc {
                htlc_id: htlc_id.to_string(),
            })
            .unwrap(),
        })
    }

    async fn refund_htlc(&self, htlc_id: &str) -> omniswap_core::Result<UnsignedTx> {
        Ok(UnsignedTx {
            chain: self.chain,
            payload: serde_json::to_vec(&SimOp::RefundHtlc {
                htlc_id: htlc_id.to_string(),
            })
            .unwrap(),
        })
    }

    async fn get_htlc_status(&self, htlc_id: &str) -> omniswap_core::Result<HtlcStatus> {
        self.htlc(htlc_id)
            .ok_or_else(|| Error::Other(format!("unknown HTLC {htlc_id}")))
    }

    async fn wait_for_confirmation(&self, _tx_hash: &str) -> omniswap_core::Result<()> {
        Ok(())
    }

    async fn subscribe_to_address(
        &self,
        _address: &str,
        _callback: AddressCallback,
    ) -> omniswap_core::Result<Subscription> {
        Ok(Subscription::new(|| {}))
    }
}

fn keystore() -> Keystore {
    let mut keys = Keystore::new();
    for chain in Chain::ALL {
        keys.insert(chain, vec![7u8; 32]);
    }
    keys
}

fn test_config() -> ClientConfig {
    ClientConfig {
        refund: RefundConfig {
            check_interval: Duration::from_millis(50),
            refund_buffer: Duration::from_secs(5),
            ..RefundConfig::default()
        },
        hub: HubConfig {
            min_mixing_delay: Duration::from_millis(10),
            max_mixing_delay: Duration::from_millis(40),
            ..HubConfig::default()
        },
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::fast()
        },
        keys: keystore(),
    }
}

struct TestNet {
    client: OmniSwap<InMemorySwapStorage>,
    zcash: Arc<SimChainAdapter>,
    osmosis: Arc<SimChainAdapter>,
}

fn testnet() -> TestNet {
    let client = OmniSwap::new(test_config(), InMemorySwapStorage::default()).unwrap();
    let zcash = Arc::new(SimChainAdapter::new(Chain::Zcash));
    let osmosis = Arc::new(SimChainAdapter::new(Chain::Osmosis));
    client.register_adapter(zcash.clone());
    client.register_adapter(osmosis.clone());
    TestNet {
        client,
        zcash,
        osmosis,
    }
}

fn zec_to_osmo_intent(privacy_level: PrivacyLevel) -> SwapIntent {
    SwapIntent::new(
        UserAccount {
            id: "user-e2e".into(),
            addresses: HashMap::from([
                (Chain::Zcash, "t1UserSourceAddr".to_string()),
                (Chain::Osmosis, "osmo1userdestaddr".to_string()),
            ]),
        },
        SourceLeg {
            chain: Chain::Zcash,
            asset: "ZEC".into(),
            amount: 100_000_000,
        },
        DestLeg {
            chain: Chain::Osmosis,
            asset: "OSMO".into(),
            min_amount: 100_000_000,
        },
        0.01,
        now_unix_ms() + 3_600_000,
        privacy_level,
    )
}

fn solver() -> Solver {
    Solver::new(
        HashMap::from([
            (Chain::Zcash, "t1SolverSourceAddr".to_string()),
            (Chain::Osmosis, "osmo1solverdest".to_string()),
        ]),
        HashMap::from([
            ("OSMO".to_string(), 10_000_000_000u128),
            ("ZEC".to_string(), 10_000_000_000u128),
        ]),
        5_000_000,
        dec!(0.002),
    )
}

#[tokio::test]
async fn happy_path_standard_swap() {
    let net = testnet();
    let intent = zec_to_osmo_intent(PrivacyLevel::Standard);
    let intent_id = net.client.submit_intent(intent).await.unwrap();

    let mut solver = solver();
    let record = net.client.execute_swap(&intent_id, &mut solver).await.unwrap();
    let StoredSwap::Standard(exec) = &record else {
        panic!("expected standard execution");
    };

    assert!(record.is_completed());
    assert!(exec.steps.iter().all(|s| {
        s.status == omniswap_core::swap::StepStatus::Completed
    }));
    assert!(exec.tx_hashes.contains_key(&Chain::Zcash));
    assert!(exec.tx_hashes.contains_key(&Chain::Osmosis));

    // Atomicity: one hashlock across both legs.
    let source = exec.source_htlc.as_ref().unwrap();
    let dest = exec.dest_htlc.as_ref().unwrap();
    assert_eq!(source.hashlock, dest.hashlock);
    assert!(exec.source_timelock > exec.dest_timelock);

    // The destination was claimed with the revealed secret.
    assert_eq!(
        net.osmosis.htlc(&dest.id).unwrap().state,
        HtlcState::Claimed
    );
    assert_eq!(net.zcash.htlc(&source.id).unwrap().state, HtlcState::Locked);
    assert_eq!(
        net.client.get_intent(&intent_id).await.unwrap().status,
        IntentStatus::Completed
    );
}

#[tokio::test]
async fn privacy_hub_swap_breaks_correlation() {
    let net = testnet();
    let intent = zec_to_osmo_intent(PrivacyLevel::Maximum);
    let intent_id = net.client.submit_intent(intent).await.unwrap();

    // The hub chain is Zcash, which is also the source chain here; the
    // solver's existing Zcash address doubles as its pool entry point.
    let mut solver = solver();

    let before = omniswap_core::types::now_unix_secs();
    let record = net.client.execute_swap(&intent_id, &mut solver).await.unwrap();
    let StoredSwap::PrivacyHub(exec) = &record else {
        panic!("expected privacy hub execution");
    };

    assert_ne!(exec.source_hashlock, exec.dest_hashlock);
    assert!(exec.source_timelock >= before + 1800);
    assert!(exec.source_timelock <= before + 14400 + 60);
    assert!(exec.dest_timelock >= before + 900);
    assert!(exec.dest_timelock <= before + 5400 + 60);
    assert!(exec.random_delay_ms >= 10 && exec.random_delay_ms <= 40);

    assert!(exec.privacy.correlation_broken);
    assert!(exec.privacy.timing_decorrelated);
    assert!(exec.privacy.addresses_one_time);

    // Both legs settled, each under its own hashlock.
    let source = exec.source_htlc.as_ref().unwrap();
    let dest = exec.dest_htlc.as_ref().unwrap();
    assert_eq!(net.zcash.htlc(&source.id).unwrap().state, HtlcState::Claimed);
    assert_eq!(
        net.osmosis.htlc(&dest.id).unwrap().state,
        HtlcState::Claimed
    );
    assert_ne!(
        net.zcash.htlc(&source.id).unwrap().hashlock,
        net.osmosis.htlc(&dest.id).unwrap().hashlock
    );
}

#[tokio::test]
async fn invalid_intents_are_rejected_with_literal_messages() {
    let net = testnet();

    let mut zero_amount = zec_to_osmo_intent(PrivacyLevel::Standard);
    zero_amount.source.amount = 0;
    let err = net.client.submit_intent(zero_amount).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidIntent(ref msg) if msg == "Source amount must be positive"
    ));

    let mut past_deadline = zec_to_osmo_intent(PrivacyLevel::Standard);
    past_deadline.deadline_ms = now_unix_ms() - 1_000;
    let err = net.client.submit_intent(past_deadline).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidIntent(ref msg) if msg == "Deadline must be in the future"
    ));

    let mut wild_slippage = zec_to_osmo_intent(PrivacyLevel::Standard);
    wild_slippage.max_slippage = 1.5;
    let err = net.client.submit_intent(wild_slippage).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidIntent(ref msg) if msg == "Slippage must be between 0 and 1"
    ));
}

#[tokio::test]
async fn refund_runs_after_timelock_expiry() {
    let registry = Arc::new(omniswap_core::AdapterRegistry::new());
    let zcash = Arc::new(SimChainAdapter::new(Chain::Zcash));
    registry.register(zcash.clone());

    let manager = RefundManager::new(
        RefundConfig {
            refund_buffer: Duration::from_secs(5),
            ..RefundConfig::default()
        },
        registry,
        keystore(),
    );

    let hashlock = omniswap_core::crypto::hash_secret(&[5u8; 32]);
    let htlc_id = omniswap_core::crypto::htlc_id(Chain::Zcash, &hashlock);
    let expired = omniswap_core::types::now_unix_secs() - 3600;
    zcash.seed_htlc(HtlcStatus {
        id: htlc_id.clone(),
        state: HtlcState::Locked,
        tx_hash: Some("sim_lock".into()),
        claim_tx_hash: None,
        refund_tx_hash: None,
        amount: 100_000_000,
        hashlock,
        timelock: expired,
    });
    manager
        .register(RefundEntry {
            swap_id: "swap_e2e_refund".into(),
            htlc_id: htlc_id.clone(),
            chain: Chain::Zcash,
            timelock: expired,
            amount: 100_000_000,
            refund_address: "t1UserSourceAddr".into(),
        })
        .await;

    let stats_before = manager.get_stats().await;
    assert_eq!(manager.check_refunds().await, 1);
    let stats_after = manager.get_stats().await;

    assert_eq!(stats_after.completed, stats_before.completed + 1);
    assert_eq!(zcash.htlc(&htlc_id).unwrap().state, HtlcState::Refunded);
    assert!(zcash.htlc(&htlc_id).unwrap().refund_tx_hash.is_some());
}

#[tokio::test]
async fn retry_backoff_delays_follow_the_schedule() {
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
        jitter: false,
        attempt_timeout: None,
    };

    let calls = Arc::new(AtomicU32::new(0));
    let delays = Arc::new(Mutex::new(Vec::new()));
    let calls_in = calls.clone();
    let delays_in = delays.clone();

    let outcome = omniswap_core::with_retry_if(
        &policy,
        |err, _| err.is_retryable(),
        move |_, delay, _| delays_in.lock().unwrap().push(delay),
        move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Network("flaky".into()))
                } else {
                    Ok("done")
                }
            }
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.value, "done");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        *delays.lock().unwrap(),
        vec![Duration::from_millis(500), Duration::from_millis(1000)]
    );
}

#[tokio::test]
async fn circuit_breaker_trips_and_recovers() {
    let breaker = CircuitBreaker::new(3, Duration::from_millis(50));

    for _ in 0..3 {
        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Network("down".into())) })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Call 4 fails fast without invoking the operation.
    let invoked = Arc::new(AtomicU32::new(0));
    let invoked_in = invoked.clone();
    let err = breaker
        .call(move || {
            let invoked = invoked_in.clone();
            async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CircuitOpen));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    // After the reset timeout the next call is attempted (half-open probe).
    tokio::time::sleep(Duration::from_millis(60)).await;
    let invoked_in = invoked.clone();
    breaker
        .call(move || {
            let invoked = invoked_in.clone();
            async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn refund_state_survives_a_restart() {
    let registry = Arc::new(omniswap_core::AdapterRegistry::new());
    registry.register(Arc::new(SimChainAdapter::new(Chain::Zcash)));

    let manager = RefundManager::new(RefundConfig::default(), registry.clone(), keystore());
    manager
        .register(RefundEntry {
            swap_id: "swap_persist".into(),
            htlc_id: "htlc_zcash_deadbeef".into(),
            chain: Chain::Zcash,
            timelock: omniswap_core::types::now_unix_secs() + 3600,
            amount: 340_282_366_920_938_463_463_374_607_431_768_211_455, // u128::MAX
            refund_address: "t1UserSourceAddr".into(),
        })
        .await;

    let exported = manager.export_state().await;
    let json = serde_json::to_string_pretty(&exported).unwrap();

    // Amounts ride as decimal strings.
    assert!(json.contains("\"340282366920938463463374607431768211455\""));

    let fresh = RefundManager::new(RefundConfig::default(), registry, keystore());
    fresh
        .import_state(serde_json::from_str(&json).unwrap())
        .await;
    assert_eq!(fresh.export_state().await, exported);
}

#[tokio::test]
async fn background_monitoring_refunds_stranded_swaps() {
    let net = testnet();
    net.client.start().await;

    // Strand an HTLC: registered for refund with an already-expired lock.
    let hashlock = omniswap_core::crypto::hash_secret(&[9u8; 32]);
    let htlc_id = omniswap_core::crypto::htlc_id(Chain::Zcash, &hashlock);
    let expired = omniswap_core::types::now_unix_secs() - 600;
    net.zcash.seed_htlc(HtlcStatus {
        id: htlc_id.clone(),
        state: HtlcState::Locked,
        tx_hash: Some("sim_stranded".into()),
        claim_tx_hash: None,
        refund_tx_hash: None,
        amount: 42,
        hashlock,
        timelock: expired,
    });
    net.client
        .refund_manager()
        .register(RefundEntry {
            swap_id: "swap_stranded".into(),
            htlc_id: htlc_id.clone(),
            chain: Chain::Zcash,
            timelock: expired,
            amount: 42,
            refund_address: "t1UserSourceAddr".into(),
        })
        .await;

    // The monitor ticks every 50ms in the test config.
    tokio::time::sleep(Duration::from_millis(200)).await;
    net.client.shutdown().await;

    assert_eq!(net.zcash.htlc(&htlc_id).unwrap().state, HtlcState::Refunded);
}
