//! Chain adapter capability surface.
//!
//! The core never builds, signs, or broadcasts chain-specific transactions
//! itself; it drives an abstract [`ChainAdapter`] looked up by [`Chain`] tag
//! in the [`AdapterRegistry`]. Implementations live outside this crate.

use crate::error::{Error, Result};
use crate::types::{Chain, HtlcStatus, hex_bytes32};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Connection configuration handed to [`ChainAdapter::initialize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub rpc_url: String,
    #[serde(default)]
    pub fallback_urls: Vec<String>,
}

/// Parameters for a plain transfer transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxParams {
    pub from: String,
    pub to: String,
    pub amount: u128,
    /// Asset symbol; `None` means the chain's native asset.
    pub asset: Option<String>,
    pub memo: Option<String>,
}

/// Parameters for creating an HTLC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtlcParams {
    pub sender: String,
    pub receiver: String,
    pub amount: u128,
    pub asset: Option<String>,
    #[serde(with = "hex_bytes32")]
    pub hashlock: [u8; 32],
    /// Unix-seconds refund deadline.
    pub timelock: u64,
}

/// A chain-specific transaction before signing. The payload is opaque to
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub chain: Chain,
    pub payload: Vec<u8>,
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTx {
    pub chain: Chain,
    pub payload: Vec<u8>,
}

/// Callback invoked with a transaction hash when activity is observed on a
/// watched address.
pub type AddressCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`ChainAdapter::subscribe_to_address`]; dropping it
/// without calling [`Subscription::unsubscribe`] leaves the watch running.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for dyn ChainAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainAdapter").field("chain", &self.chain()).finish()
    }
}

/// Capability set every supported chain exposes to the core.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain this adapter serves; used as the registry key.
    fn chain(&self) -> Chain;

    /// Connect to the chain. Must be called before any other operation.
    async fn initialize(&self, config: AdapterConfig) -> Result<()>;

    /// Derive the canonical address for a public key.
    async fn get_address(&self, public_key: &[u8]) -> Result<String>;

    /// Balance of `asset` (native if `None`) at `address`, in base units.
    async fn get_balance(&self, address: &str, asset: Option<&str>) -> Result<u128>;

    async fn build_transaction(&self, params: TxParams) -> Result<UnsignedTx>;

    async fn sign_transaction(&self, tx: UnsignedTx, private_key: &[u8]) -> Result<SignedTx>;

    /// Broadcast and return the transaction hash.
    async fn broadcast_transaction(&self, tx: SignedTx) -> Result<String>;

    async fn create_htlc(&self, params: HtlcParams) -> Result<UnsignedTx>;

    /// Build the claim transaction revealing `preimage`.
    async fn claim_htlc(&self, htlc_id: &str, preimage: &[u8; 32]) -> Result<UnsignedTx>;

    /// Build the refund transaction. Adapters reject this with
    /// [`Error::HtlcTimelockNotExpired`] while the timelock is live.
    async fn refund_htlc(&self, htlc_id: &str) -> Result<UnsignedTx>;

    async fn get_htlc_status(&self, htlc_id: &str) -> Result<HtlcStatus>;

    /// Block until `tx_hash` reaches the adapter's confirmation depth.
    async fn wait_for_confirmation(&self, tx_hash: &str) -> Result<()>;

    async fn subscribe_to_address(
        &self,
        address: &str,
        callback: AddressCallback,
    ) -> Result<Subscription>;
}

/// Process-scoped registry of chain adapters.
///
/// Registration happens during initialization; lookups are concurrent and
/// read-mostly afterwards.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<Chain, Arc<dyn ChainAdapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn ChainAdapter>) {
        let chain = adapter.chain();
        log::info!("registered adapter for {chain}");
        self.adapters
            .write()
            .expect("adapter registry lock poisoned")
            .insert(chain, adapter);
    }

    pub fn get(&self, chain: Chain) -> Result<Arc<dyn ChainAdapter>> {
        self.adapters
            .read()
            .expect("adapter registry lock poisoned")
            .get(&chain)
            .cloned()
            .ok_or(Error::AdapterNotFound(chain))
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.adapters
            .read()
            .expect("adapter registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }
}

/// Per-chain signing key material supplied by the embedding application.
///
/// The core only threads these bytes into [`ChainAdapter::sign_transaction`];
/// custody, derivation, and storage are the application's concern.
#[derive(Debug, Clone, Default)]
pub struct Keystore {
    keys: HashMap<Chain, Vec<u8>>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain: Chain, key: Vec<u8>) {
        self.keys.insert(chain, key);
    }

    pub fn get(&self, chain: Chain) -> Result<&[u8]> {
        self.keys
            .get(&chain)
            .map(|k| k.as_slice())
            .ok_or_else(|| Error::Other(format!("No signing key configured for chain {chain}")))
    }
}
