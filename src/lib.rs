//! OmniSwap SDK - Core Library
//!
//! Platform-agnostic orchestration for trustless, privacy-preserving
//! cross-chain swaps over Hash Time-Locked Contracts.
//!
//! This crate contains the swap kernel: the atomic-swap and Privacy Hub
//! state machines, the route optimizer, randomized timelock generation, the
//! automated refund manager, and the resilience primitives they share.
//! Per-chain transaction building, signing, and broadcasting live behind
//! the [`ChainAdapter`] capability trait and are implemented elsewhere;
//! swap persistence is abstracted through the [`SwapStorage`] trait so any
//! backend (filesystem, database, browser storage) can be plugged in.
//!
//! # Example
//!
//! ```rust,ignore
//! use omniswap_core::{ClientConfig, OmniSwap, SwapIntent};
//!
//! let client = OmniSwap::new(ClientConfig::default(), my_swap_storage)?;
//! client.register_adapter(my_zcash_adapter);
//! client.register_adapter(my_osmosis_adapter);
//! client.start().await;
//!
//! let intent_id = client.submit_intent(intent).await?;
//! let routes = client.find_routes(&intent)?;
//! let record = client.execute_swap(&intent_id, &mut solver).await?;
//! ```

pub mod adapter;
pub mod client;
pub mod crypto;
pub mod error;
pub mod hub;
pub mod intent;
pub mod refund;
pub mod retry;
pub mod router;
pub mod storage;
pub mod swap;
pub mod timelock;
pub mod types;

pub use adapter::{
    AdapterConfig, AdapterRegistry, ChainAdapter, HtlcParams, Keystore, SignedTx, Subscription,
    TxParams, UnsignedTx,
};
pub use client::{ClientConfig, OmniSwap, StoredSwap};
pub use error::{Error, Result};
pub use hub::{HubConfig, HubPhase, HubStatus, HubSwapExecution, PrivacyHubCoordinator};
pub use intent::IntentPool;
pub use refund::{RefundConfig, RefundEntry, RefundManager, RefundManagerState, RefundRecord};
pub use retry::{
    BatchOptions, CircuitBreaker, CircuitState, RetryPolicy, batch_with_retry, with_retry,
    with_retry_if, with_timeout,
};
pub use router::{RouteOptimizer, ScoreWeights};
pub use storage::{StorageFuture, SwapStorage};
pub use swap::{HtlcCoordinator, SwapExecution, SwapPhase, SwapStatus};
pub use timelock::TimelockParams;
pub use types::{
    Asset, Chain, DestLeg, HtlcState, HtlcStatus, IntentStatus, PrivacyLevel, Route, RouteHop,
    Solver, SourceLeg, StealthAddress, SwapIntent, SwapMechanism, UserAccount, format_amount,
    parse_amount, supported_assets, validate_address,
};
