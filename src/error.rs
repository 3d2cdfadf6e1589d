//! Error types for the OmniSwap core.
//!
//! Every error carries a stable numeric code grouped by family (adapter,
//! transaction, HTLC, swap, solver, privacy, network) so embedding
//! applications can branch on categories without string matching.

use crate::types::Chain;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the OmniSwap core.
#[derive(Error, Debug)]
pub enum Error {
    // 1xxx - chain adapters
    /// No adapter registered for the requested chain.
    #[error("No adapter registered for chain {0}")]
    AdapterNotFound(Chain),

    /// Adapter exists but `initialize` was never called.
    #[error("Adapter for chain {0} is not initialized")]
    AdapterNotInitialized(Chain),

    // 2xxx - transactions
    /// Transaction construction failed on an adapter.
    #[error("Failed to build transaction: {0}")]
    TransactionBuildFailed(String),

    /// Balance does not cover the requested amount.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    // 3xxx - HTLCs
    /// HTLC could not be created on-chain.
    #[error("Failed to create HTLC: {0}")]
    HtlcCreationFailed(String),

    /// The HTLC timelock has already expired; the claim window is closed.
    #[error("Timelock expired for HTLC {0}")]
    HtlcTimelockExpired(String),

    /// Refund requested before the HTLC timelock expired.
    #[error("Timelock has not expired yet for HTLC {0}")]
    HtlcTimelockNotExpired(String),

    // 4xxx - swaps
    /// The route optimizer found no viable path.
    #[error("No route found from {from} to {to}")]
    NoRouteFound { from: Chain, to: Chain },

    /// A previously obtained quote is no longer valid.
    #[error("Quote expired for swap {0}")]
    QuoteExpired(String),

    /// Intent failed validation on submission.
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    // 5xxx - solvers
    /// No solver is available to fill the intent.
    #[error("No solver available for intent {0}")]
    SolverUnavailable(String),

    /// The solver's inventory cannot cover the destination amount.
    #[error(
        "Solver {solver} has insufficient {asset} inventory: required {required}, available {available}"
    )]
    SolverInsufficientInventory {
        solver: String,
        asset: String,
        required: u128,
        available: u128,
    },

    // 6xxx - privacy
    /// Stealth address derivation failed.
    #[error("Failed to generate stealth address: {0}")]
    StealthAddressGenerationFailed(String),

    /// The configured hub chain cannot act as a shielded intermediary.
    #[error("Privacy hub unavailable: {0}")]
    PrivacyHubUnavailable(String),

    /// No candidate route meets the privacy threshold.
    #[error("No route meets the minimum privacy score")]
    NoPrivateRoute,

    // 7xxx - local plumbing
    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),

    // 9xxx - network
    /// Network/RPC error.
    #[error("Network error: {0}")]
    Network(String),

    /// An operation exceeded its deadline.
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The circuit breaker is open and rejecting calls.
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// Wrapper attaching the swap id to an error raised mid-execution.
    #[error("Swap {swap_id} failed: {source}")]
    Swap {
        swap_id: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach a swap id to an error for correlation.
    pub fn for_swap(swap_id: impl Into<String>, source: Error) -> Self {
        Error::Swap {
            swap_id: swap_id.into(),
            source: Box::new(source),
        }
    }

    /// Stable numeric code. Families: 1xxx adapter, 2xxx transaction,
    /// 3xxx HTLC, 4xxx swap, 5xxx solver, 6xxx privacy, 9xxx network.
    pub fn code(&self) -> u16 {
        match self {
            Error::AdapterNotFound(_) => 1001,
            Error::AdapterNotInitialized(_) => 1002,
            Error::TransactionBuildFailed(_) => 2001,
            Error::InsufficientBalance { .. } => 2002,
            Error::HtlcCreationFailed(_) => 3001,
            Error::HtlcTimelockExpired(_) => 3002,
            Error::HtlcTimelockNotExpired(_) => 3003,
            Error::NoRouteFound { .. } => 4001,
            Error::QuoteExpired(_) => 4002,
            Error::InvalidIntent(_) => 4003,
            Error::SolverUnavailable(_) => 5001,
            Error::SolverInsufficientInventory { .. } => 5002,
            Error::StealthAddressGenerationFailed(_) => 6001,
            Error::PrivacyHubUnavailable(_) => 6002,
            Error::NoPrivateRoute => 6003,
            Error::Storage(_) => 7001,
            Error::Serde(_) => 7002,
            Error::Other(_) => 7003,
            Error::Network(_) => 9001,
            Error::Timeout(_) => 9002,
            Error::CircuitOpen => 9003,
            Error::Swap { source, .. } => source.code(),
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Network failures and timeouts are transient; everything else needs a
    /// changed input or an expired timelock to make progress.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout(_) => true,
            Error::Swap { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Whether funds remain recoverable through the refund path.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::HtlcTimelockExpired(_) => true,
            Error::Swap { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Optional operator hint for resolving the error.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::AdapterNotFound(_) => Some("register an adapter for the chain before swapping"),
            Error::AdapterNotInitialized(_) => {
                Some("call initialize on the adapter with an RPC url")
            }
            Error::HtlcTimelockExpired(_) => Some("funds are recoverable via the refund manager"),
            Error::HtlcTimelockNotExpired(_) => Some("wait for the timelock before refunding"),
            Error::CircuitOpen => Some("wait for the reset timeout before retrying"),
            Error::Swap { source, .. } => source.remediation(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{:#}", err))
    }
}
