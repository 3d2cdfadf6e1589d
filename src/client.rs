use crate::adapter::{AdapterRegistry, AddressCallback, ChainAdapter, Keystore, Subscription};
use crate::error::{Error, Result};
use crate::hub::{HubConfig, HubSwapExecution, PrivacyHubCoordinator};
use crate::intent::IntentPool;
use crate::refund::{RefundConfig, RefundManager};
use crate::retry::RetryPolicy;
use crate::router::RouteOptimizer;
use crate::storage::SwapStorage;
use crate::swap::{HtlcCoordinator, SwapExecution};
use crate::timelock::TimelockParams;
use crate::types::{
    Asset, Chain, IntentStatus, PrivacyLevel, Route, Solver, SwapIntent, now_unix_ms,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A finished (or failed) swap as persisted to [`SwapStorage`].
///
/// Either flavor carries the full execution record, including the refund
/// registrations an application needs to rebuild after a restart.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredSwap {
    Standard(SwapExecution),
    PrivacyHub(HubSwapExecution),
}

impl StoredSwap {
    pub fn swap_id(&self) -> &str {
        match self {
            StoredSwap::Standard(exec) => &exec.swap_id,
            StoredSwap::PrivacyHub(exec) => &exec.swap_id,
        }
    }

    pub fn intent_id(&self) -> &str {
        match self {
            StoredSwap::Standard(exec) => &exec.intent_id,
            StoredSwap::PrivacyHub(exec) => &exec.intent_id,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            StoredSwap::Standard(exec) => exec.status == crate::swap::SwapStatus::Completed,
            StoredSwap::PrivacyHub(exec) => exec.status == crate::hub::HubStatus::Completed,
        }
    }
}

/// Top-level configuration for [`OmniSwap`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub refund: RefundConfig,
    pub hub: HubConfig,
    pub retry: RetryPolicy,
    /// Per-chain signing keys supplied by the embedding application.
    pub keys: Keystore,
}

/// The main client for orchestrating cross-chain swaps.
///
/// Owns the adapter registry, intent pool, route optimizer, both swap
/// coordinators, and the refund manager. Parameterized by a storage backend
/// for finished swap records.
pub struct OmniSwap<S: SwapStorage> {
    registry: Arc<AdapterRegistry>,
    pool: IntentPool,
    optimizer: RouteOptimizer,
    swaps: HtlcCoordinator,
    hub: PrivacyHubCoordinator,
    refunds: Arc<RefundManager>,
    storage: S,
}

impl<S: SwapStorage> OmniSwap<S> {
    /// Build a client. Fails if the configured hub chain is not
    /// hub-capable.
    pub fn new(config: ClientConfig, storage: S) -> Result<Self> {
        let registry = Arc::new(AdapterRegistry::new());
        let refunds = Arc::new(RefundManager::new(
            config.refund,
            registry.clone(),
            config.keys.clone(),
        ));
        let swaps = HtlcCoordinator::new(
            registry.clone(),
            config.keys.clone(),
            refunds.clone(),
            config.retry.clone(),
            TimelockParams::SOURCE,
        );
        let hub = PrivacyHubCoordinator::new(
            registry.clone(),
            config.keys,
            refunds.clone(),
            config.hub,
            config.retry,
        )?;
        Ok(Self {
            registry,
            pool: IntentPool::new(),
            optimizer: RouteOptimizer::new(),
            swaps,
            hub,
            refunds,
            storage,
        })
    }

    /// Start background services (refund monitoring).
    pub async fn start(&self) {
        self.refunds.start_monitoring().await;
    }

    /// Stop background services.
    pub async fn shutdown(&self) {
        self.refunds.stop_monitoring().await;
    }

    pub fn register_adapter(&self, adapter: Arc<dyn ChainAdapter>) {
        self.registry.register(adapter);
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn refund_manager(&self) -> &Arc<RefundManager> {
        &self.refunds
    }

    /// Get a reference to the swap storage.
    pub fn swap_storage(&self) -> &S {
        &self.storage
    }

    pub async fn submit_intent(&self, intent: SwapIntent) -> Result<String> {
        self.pool.submit(intent).await
    }

    pub async fn get_intent(&self, id: &str) -> Option<SwapIntent> {
        self.pool.get(id).await
    }

    pub async fn cancel_intent(&self, id: &str) {
        self.pool.cancel(id).await;
    }

    pub async fn list_intents(&self) -> Vec<SwapIntent> {
        self.pool.list().await
    }

    /// Native assets across all supported chains.
    pub fn supported_assets(&self) -> Vec<Asset> {
        crate::types::supported_assets()
    }

    /// Candidate routes for an intent, best first.
    pub fn find_routes(&self, intent: &SwapIntent) -> Result<Vec<Route>> {
        self.optimizer.find_routes(intent)
    }

    /// Quote an intent: the single best route from the same optimizer run
    /// that backs [`Self::find_routes`].
    pub fn get_quote(&self, intent: &SwapIntent) -> Result<Route> {
        let mut routes = self.optimizer.find_routes(intent)?;
        Ok(routes.remove(0))
    }

    /// Best route meeting the privacy threshold.
    pub fn find_private_route(&self, intent: &SwapIntent) -> Result<Route> {
        self.optimizer.find_private_route(intent)
    }

    /// Execute a submitted intent against a solver.
    ///
    /// Maximum-privacy intents run through the Privacy Hub; everything else
    /// takes the standard atomic swap. The solver's stats are updated with
    /// the outcome.
    pub async fn execute_swap(&self, intent_id: &str, solver: &mut Solver) -> Result<StoredSwap> {
        let intent = self
            .pool
            .get(intent_id)
            .await
            .ok_or_else(|| Error::InvalidIntent(format!("Unknown intent {intent_id}")))?;

        if intent.deadline_ms <= now_unix_ms() {
            self.pool.set_status(intent_id, IntentStatus::Expired).await;
            return Err(Error::QuoteExpired(intent_id.to_string()));
        }

        match intent.status {
            IntentStatus::Pending => {
                if !self.pool.match_solver(intent_id, solver).await {
                    return Err(Error::SolverInsufficientInventory {
                        solver: solver.id.clone(),
                        asset: intent.dest.asset.clone(),
                        required: intent.dest.min_amount,
                        available: solver
                            .inventory
                            .get(&intent.dest.asset)
                            .copied()
                            .unwrap_or(0),
                    });
                }
            }
            IntentStatus::Matched => {}
            other => {
                return Err(Error::InvalidIntent(format!(
                    "Intent {intent_id} is not executable in status {other:?}"
                )));
            }
        }

        self.pool.set_status(intent_id, IntentStatus::Executing).await;
        let started = std::time::Instant::now();

        let result = if intent.privacy_level == PrivacyLevel::Maximum {
            self.hub
                .initiate(&intent, solver)
                .await
                .map(StoredSwap::PrivacyHub)
        } else {
            self.swaps
                .initiate(&intent, solver)
                .await
                .map(StoredSwap::Standard)
        };

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(record) => {
                solver.stats.record_swap(true, elapsed);
                self.pool.set_status(intent_id, IntentStatus::Completed).await;
                self.storage.store(record.swap_id(), &record).await?;
                Ok(record)
            }
            Err(err) => {
                solver.stats.record_swap(false, elapsed);
                self.pool.set_status(intent_id, IntentStatus::Failed).await;
                if let Error::Swap { swap_id, .. } = &err {
                    if let Some(record) = self.execution_record(swap_id).await {
                        self.storage.store(swap_id, &record).await?;
                    }
                }
                Err(err)
            }
        }
    }

    /// In-memory execution record for a swap, if any.
    pub async fn execution_record(&self, swap_id: &str) -> Option<StoredSwap> {
        if let Some(exec) = self.swaps.get_execution(swap_id).await {
            return Some(StoredSwap::Standard(exec));
        }
        self.hub
            .get_execution(swap_id)
            .await
            .map(StoredSwap::PrivacyHub)
    }

    /// Load a persisted swap record.
    pub async fn get_swap(&self, swap_id: &str) -> Result<StoredSwap> {
        self.storage
            .get(swap_id)
            .await?
            .ok_or_else(|| Error::Other(format!("Swap id not found {swap_id}")))
    }

    /// All persisted swap records.
    pub async fn list_swaps(&self) -> Result<Vec<StoredSwap>> {
        self.storage.get_all().await
    }

    pub async fn delete_swap(&self, swap_id: &str) -> Result<()> {
        self.storage.delete(swap_id).await
    }

    /// Watch a chain address for activity through its adapter.
    pub async fn watch_address(
        &self,
        chain: Chain,
        address: &str,
        callback: AddressCallback,
    ) -> Result<Subscription> {
        let adapter = self.registry.get(chain)?;
        adapter.subscribe_to_address(address, callback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockChainAdapter;
    use crate::storage::memory::MemorySwapStorage;
    use crate::types::{DestLeg, SourceLeg, UserAccount};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;

    fn client() -> OmniSwap<MemorySwapStorage> {
        let mut keys = Keystore::new();
        for chain in Chain::ALL {
            keys.insert(chain, vec![9u8; 32]);
        }
        let config = ClientConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                ..RetryPolicy::fast()
            },
            hub: HubConfig {
                min_mixing_delay: Duration::from_millis(5),
                max_mixing_delay: Duration::from_millis(15),
                ..HubConfig::default()
            },
            keys,
            ..ClientConfig::default()
        };
        let client = OmniSwap::new(config, MemorySwapStorage::new()).unwrap();
        client.register_adapter(Arc::new(MockChainAdapter::new(Chain::Zcash)));
        client.register_adapter(Arc::new(MockChainAdapter::new(Chain::Osmosis)));
        client
    }

    fn intent(level: PrivacyLevel) -> SwapIntent {
        SwapIntent::new(
            UserAccount {
                id: "user-1".into(),
                addresses: HashMap::from([
                    (Chain::Zcash, "t1user".to_string()),
                    (Chain::Osmosis, "osmo1user".to_string()),
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
            level,
        )
    }

    fn solver() -> Solver {
        Solver::new(
            HashMap::from([
                (Chain::Zcash, "t1solver".to_string()),
                (Chain::Osmosis, "osmo1solver".to_string()),
            ]),
            HashMap::from([("OSMO".to_string(), 1_000_000_000u128)]),
            1_000_000,
            dec!(0.002),
        )
    }

    #[tokio::test]
    async fn standard_intent_executes_and_persists() {
        let client = client();
        let id = client.submit_intent(intent(PrivacyLevel::Standard)).await.unwrap();
        let mut solver = solver();

        let record = client.execute_swap(&id, &mut solver).await.unwrap();
        assert!(matches!(record, StoredSwap::Standard(_)));
        assert!(record.is_completed());
        assert_eq!(
            client.get_intent(&id).await.unwrap().status,
            IntentStatus::Completed
        );
        assert_eq!(solver.stats.total_swaps, 1);

        let reloaded = client.get_swap(record.swap_id()).await.unwrap();
        assert_eq!(reloaded.swap_id(), record.swap_id());
        assert_eq!(client.list_swaps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn maximum_privacy_routes_through_the_hub() {
        let client = client();
        let id = client.submit_intent(intent(PrivacyLevel::Maximum)).await.unwrap();
        let mut solver = solver();
        // The hub chain (Zcash) needs a solver address too.
        solver.addresses.insert(Chain::Zcash, "zs1solverhub".to_string());

        let record = client.execute_swap(&id, &mut solver).await.unwrap();
        let StoredSwap::PrivacyHub(exec) = &record else {
            panic!("expected a privacy hub execution");
        };
        assert_ne!(exec.source_hashlock, exec.dest_hashlock);
        assert!(exec.privacy.correlation_broken);
    }

    #[tokio::test]
    async fn insufficient_inventory_refuses_execution() {
        let client = client();
        let id = client.submit_intent(intent(PrivacyLevel::Standard)).await.unwrap();
        let mut poor = solver();
        poor.inventory.insert("OSMO".to_string(), 1);

        let err = client.execute_swap(&id, &mut poor).await.unwrap_err();
        assert_eq!(err.code(), 5002);
        assert_eq!(
            client.get_intent(&id).await.unwrap().status,
            IntentStatus::Pending
        );
    }

    #[tokio::test]
    async fn cancelled_intent_cannot_execute() {
        let client = client();
        let id = client.submit_intent(intent(PrivacyLevel::Standard)).await.unwrap();
        client.cancel_intent(&id).await;

        let err = client.execute_swap(&id, &mut solver()).await.unwrap_err();
        assert_eq!(err.code(), 4003);
    }

    #[tokio::test]
    async fn quote_and_find_routes_agree_on_the_best_route() {
        let client = client();
        let intent = intent(PrivacyLevel::Standard);
        let routes = client.find_routes(&intent).unwrap();
        let quote = client.get_quote(&intent).unwrap();
        assert_eq!(quote.hops.len(), routes[0].hops.len());
        assert_eq!(quote.estimated_output, routes[0].estimated_output);
        assert!((quote.score - routes[0].score).abs() < 1e-12);
    }

    #[tokio::test]
    async fn asset_catalog_covers_every_chain() {
        let client = client();
        let assets = client.supported_assets();
        assert_eq!(assets.len(), Chain::ALL.len());
        assert!(assets.iter().any(|a| a.symbol == "ZEC" && a.decimals == 8));
        assert!(
            assets
                .iter()
                .any(|a| a.chain == Chain::Osmosis && a.contract.as_deref() == Some("uosmo"))
        );
    }

    #[tokio::test]
    async fn failed_execution_is_still_persisted() {
        let client = client();
        let id = client.submit_intent(intent(PrivacyLevel::Standard)).await.unwrap();

        // Force a mid-setup failure: no destination address for the solver.
        let mut lame = solver();
        lame.addresses.remove(&Chain::Osmosis);
        let err = client.execute_swap(&id, &mut lame).await.unwrap_err();
        let Error::Swap { swap_id, .. } = err else {
            panic!("expected swap wrapper");
        };

        assert_eq!(
            client.get_intent(&id).await.unwrap().status,
            IntentStatus::Failed
        );
        let record = client.get_swap(&swap_id).await.unwrap();
        assert!(!record.is_completed());
        assert_eq!(lame.stats.total_swaps, 1);
        assert_eq!(lame.stats.success_rate, 0.0);
    }

    #[tokio::test]
    async fn expired_deadline_marks_intent_expired() {
        let client = client();
        let mut late = intent(PrivacyLevel::Standard);
        late.deadline_ms = now_unix_ms() + 50;
        let id = client.submit_intent(late).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let err = client.execute_swap(&id, &mut solver()).await.unwrap_err();
        assert_eq!(err.code(), 4002);
        assert_eq!(
            client.get_intent(&id).await.unwrap().status,
            IntentStatus::Expired
        );
    }

    #[tokio::test]
    async fn watch_address_reaches_the_adapter() {
        let client = client();
        let subscription = client
            .watch_address(Chain::Zcash, "t1watched", Box::new(|_tx| {}))
            .await
            .unwrap();
        subscription.unsubscribe();

        let err = client
            .watch_address(Chain::Mina, "B62qwatched", Box::new(|_tx| {}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 1001);
    }

    #[tokio::test]
    async fn start_and_shutdown_toggle_monitoring() {
        let client = client();
        client.start().await;
        client.shutdown().await;
    }
}
