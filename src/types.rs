//! Shared types for the OmniSwap core.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Serde module for serializing `[u8; 32]` as hex strings.
pub(crate) mod hex_bytes32 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Current unix time in milliseconds.
pub fn now_unix_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Current unix time in seconds.
pub fn now_unix_secs() -> u64 {
    OffsetDateTime::now_utc().unix_timestamp() as u64
}

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Zcash,
    Miden,
    Aztec,
    Mina,
    Fhenix,
    Osmosis,
}

impl Chain {
    /// All supported chains.
    pub const ALL: [Chain; 6] = [
        Chain::Zcash,
        Chain::Miden,
        Chain::Aztec,
        Chain::Mina,
        Chain::Fhenix,
        Chain::Osmosis,
    ];

    /// Chains with native transaction-graph privacy.
    pub fn is_privacy(self) -> bool {
        matches!(self, Chain::Zcash | Chain::Miden | Chain::Aztec | Chain::Mina)
    }

    /// Chains with an EVM execution environment.
    pub fn is_evm(self) -> bool {
        matches!(self, Chain::Fhenix | Chain::Aztec)
    }

    /// Cosmos-SDK chains reachable over IBC.
    pub fn is_cosmos(self) -> bool {
        matches!(self, Chain::Osmosis)
    }

    /// Chains usable as a shielded-pool intermediary.
    pub fn is_hub_capable(self) -> bool {
        matches!(self, Chain::Zcash | Chain::Aztec | Chain::Miden)
    }
}

impl std::str::FromStr for Chain {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zcash" => Ok(Chain::Zcash),
            "miden" => Ok(Chain::Miden),
            "aztec" => Ok(Chain::Aztec),
            "mina" => Ok(Chain::Mina),
            "fhenix" => Ok(Chain::Fhenix),
            "osmosis" => Ok(Chain::Osmosis),
            _ => Err(crate::error::Error::Other(format!("Unknown chain: {}", s))),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Zcash => write!(f, "zcash"),
            Chain::Miden => write!(f, "miden"),
            Chain::Aztec => write!(f, "aztec"),
            Chain::Mina => write!(f, "mina"),
            Chain::Fhenix => write!(f, "fhenix"),
            Chain::Osmosis => write!(f, "osmosis"),
        }
    }
}

/// Asset metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub chain: Chain,
    /// Contract address or denom, where the chain has such a notion.
    pub contract: Option<String>,
}

impl Asset {
    /// The chain's native asset.
    pub fn native(chain: Chain) -> Self {
        let (symbol, name, decimals, contract) = match chain {
            Chain::Zcash => ("ZEC", "Zcash", 8, None),
            Chain::Miden => ("MIDEN", "Miden", 8, None),
            Chain::Aztec => ("AZTEC", "Aztec", 18, None),
            Chain::Mina => ("MINA", "Mina", 9, None),
            Chain::Fhenix => ("FHE", "Fhenix", 18, None),
            Chain::Osmosis => ("OSMO", "Osmosis", 6, Some("uosmo")),
        };
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            chain,
            contract: contract.map(str::to_string),
        }
    }
}

/// Native assets across all supported chains.
pub fn supported_assets() -> Vec<Asset> {
    Chain::ALL.iter().map(|chain| Asset::native(*chain)).collect()
}

/// How strongly routing should favor privacy-preserving paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Standard,
    Enhanced,
    Maximum,
}

impl PrivacyLevel {
    /// Weight given to the privacy sub-score during route scoring.
    pub fn privacy_weight(self) -> f64 {
        match self {
            PrivacyLevel::Standard => 0.2,
            PrivacyLevel::Enhanced => 0.4,
            PrivacyLevel::Maximum => 0.6,
        }
    }
}

/// Lifecycle status of a swap intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Matched,
    Executing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl IntentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IntentStatus::Completed
                | IntentStatus::Failed
                | IntentStatus::Expired
                | IntentStatus::Cancelled
        )
    }
}

/// A user identity with per-chain receive addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub addresses: HashMap<Chain, String>,
}

/// Source leg of an intent: what the user gives up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLeg {
    pub chain: Chain,
    pub asset: String,
    pub amount: u128,
}

/// Destination leg of an intent: the minimum the user will accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestLeg {
    pub chain: Chain,
    pub asset: String,
    pub min_amount: u128,
}

/// A user-declared swap: source amount in, minimum destination amount out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapIntent {
    pub id: String,
    pub user: UserAccount,
    pub source: SourceLeg,
    pub dest: DestLeg,
    /// Maximum tolerated slippage, exclusive bounds (0, 1).
    pub max_slippage: f64,
    /// Unix-ms deadline after which the intent expires.
    pub deadline_ms: i64,
    pub privacy_level: PrivacyLevel,
    pub status: IntentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl SwapIntent {
    /// Build a pending intent with a fresh id and timestamps.
    pub fn new(
        user: UserAccount,
        source: SourceLeg,
        dest: DestLeg,
        max_slippage: f64,
        deadline_ms: i64,
        privacy_level: PrivacyLevel,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: crate::crypto::generate_intent_id(),
            user,
            source,
            dest,
            max_slippage,
            deadline_ms,
            privacy_level,
            status: IntentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Historical performance counters for a solver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverStats {
    pub total_swaps: u64,
    /// Completed / attempted, in [0, 1].
    pub success_rate: f64,
    /// Mean wall-clock seconds per completed swap.
    pub average_time_secs: f64,
}

impl SolverStats {
    /// Fold one finished swap into the running counters.
    pub fn record_swap(&mut self, success: bool, elapsed_secs: f64) {
        let completed = (self.success_rate * self.total_swaps as f64).round();
        self.total_swaps += 1;
        let completed = completed + if success { 1.0 } else { 0.0 };
        self.success_rate = completed / self.total_swaps as f64;
        if success {
            // Average over successful swaps only.
            let prior = (completed - 1.0).max(0.0);
            self.average_time_secs =
                (self.average_time_secs * prior + elapsed_secs) / completed.max(1.0);
        }
    }
}

/// An actor that fills intents from its own inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solver {
    pub id: String,
    pub addresses: HashMap<Chain, String>,
    /// Asset symbol to available amount.
    pub inventory: HashMap<String, u128>,
    pub stats: SolverStats,
    pub stake_amount: u128,
    /// Fee taken by the solver, as a fraction.
    pub fee_rate: rust_decimal::Decimal,
}

impl Solver {
    pub fn new(
        addresses: HashMap<Chain, String>,
        inventory: HashMap<String, u128>,
        stake_amount: u128,
        fee_rate: rust_decimal::Decimal,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            addresses,
            inventory,
            stats: SolverStats::default(),
            stake_amount,
            fee_rate,
        }
    }

    /// Whether the solver's inventory covers `amount` of `asset`.
    pub fn has_inventory(&self, asset: &str, amount: u128) -> bool {
        self.inventory.get(asset).copied().unwrap_or(0) >= amount
    }
}

/// Mechanism used by a single route hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapMechanism {
    AtomicSwap,
    AmmSwap,
    IbcTransfer,
    Bridge,
    SolverFill,
}

/// One leg of a candidate route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHop {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub from_asset: String,
    pub to_asset: String,
    pub mechanism: SwapMechanism,
    pub venue: String,
    pub estimated_output: u128,
    pub fee: u128,
}

/// Fee aggregate across a route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol_fee: u128,
    pub network_fees: HashMap<Chain, u128>,
    pub solver_fee: u128,
    pub total: u128,
}

/// A scored candidate route through the liquidity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub hops: Vec<RouteHop>,
    pub estimated_output: u128,
    pub estimated_fees: FeeBreakdown,
    pub estimated_time_secs: u64,
    /// Cumulative slippage risk in [0, 1].
    pub slippage_risk: f64,
    /// Minimum available liquidity across hops.
    pub liquidity_depth: u128,
    pub price_impact: f64,
    /// 0 (fully transparent) to 100 (fully shielded).
    pub privacy_score: f64,
    /// Weighted composite used for ranking.
    pub score: f64,
}

/// On-chain state of an HTLC as reported by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtlcState {
    Pending,
    Locked,
    Claimed,
    Refunded,
    Expired,
}

/// Snapshot of a single HTLC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtlcStatus {
    pub id: String,
    pub state: HtlcState,
    pub tx_hash: Option<String>,
    pub claim_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,
    pub amount: u128,
    #[serde(with = "hex_bytes32")]
    pub hashlock: [u8; 32],
    /// Unix-seconds deadline after which refund becomes possible.
    pub timelock: u64,
}

/// A one-time address with its accompanying key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthAddress {
    pub chain: Chain,
    pub address: String,
    pub viewing_key: String,
    pub spending_key_hash: String,
    pub ephemeral_public_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Format a base-unit amount with the given number of decimals.
///
/// `format_amount(150_000_000, 8)` is `"1.5"`; trailing zeros are trimmed.
pub fn format_amount(amount: u128, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u128.pow(decimals as u32);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parse a decimal string into base units. Inverse of [`format_amount`].
pub fn parse_amount(s: &str, decimals: u8) -> crate::error::Result<u128> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(crate::error::Error::Other(format!("Invalid amount: {:?}", s)));
    }
    if frac.len() > decimals as usize {
        return Err(crate::error::Error::Other(format!(
            "Amount {:?} has more than {} decimal places",
            s, decimals
        )));
    }
    let parse_digits = |d: &str| -> crate::error::Result<u128> {
        if d.is_empty() {
            return Ok(0);
        }
        d.parse::<u128>()
            .map_err(|e| crate::error::Error::Other(format!("Invalid amount {:?}: {}", s, e)))
    };
    let whole = parse_digits(whole)?;
    let frac_units = parse_digits(frac)? * 10u128.pow((decimals as usize - frac.len()) as u32);
    let scale = 10u128.pow(decimals as u32);
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| crate::error::Error::Other(format!("Amount {:?} overflows", s)))
}

/// Check an address against the chain's wire format.
pub fn validate_address(chain: Chain, address: &str) -> bool {
    match chain {
        Chain::Zcash => {
            address.starts_with("t1") || address.starts_with("t3") || address.starts_with("zs")
        }
        Chain::Osmosis => address.starts_with("osmo1"),
        Chain::Fhenix | Chain::Aztec => {
            address.len() == 42
                && address.starts_with("0x")
                && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        }
        Chain::Mina => address.starts_with("B62"),
        // Miden account ids are rendered as 0x-prefixed 64-char hex.
        Chain::Miden => {
            address.len() == 66
                && address.starts_with("0x")
                && address[2..].chars().all(|c| c.is_ascii_hexdigit())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_subsets() {
        assert!(Chain::Zcash.is_privacy());
        assert!(Chain::Mina.is_privacy());
        assert!(!Chain::Osmosis.is_privacy());
        assert!(!Chain::Fhenix.is_privacy());

        assert!(Chain::Fhenix.is_evm());
        assert!(Chain::Aztec.is_evm());
        assert!(!Chain::Zcash.is_evm());

        assert!(Chain::Osmosis.is_cosmos());

        assert!(Chain::Zcash.is_hub_capable());
        assert!(Chain::Aztec.is_hub_capable());
        assert!(Chain::Miden.is_hub_capable());
        assert!(!Chain::Mina.is_hub_capable());
        assert!(!Chain::Osmosis.is_hub_capable());
    }

    #[test]
    fn chain_round_trips_through_strings() {
        for chain in Chain::ALL {
            let parsed: Chain = chain.to_string().parse().unwrap();
            assert_eq!(parsed, chain);
        }
        assert!("dogecoin".parse::<Chain>().is_err());
    }

    #[test]
    fn privacy_weights() {
        assert_eq!(PrivacyLevel::Standard.privacy_weight(), 0.2);
        assert_eq!(PrivacyLevel::Enhanced.privacy_weight(), 0.4);
        assert_eq!(PrivacyLevel::Maximum.privacy_weight(), 0.6);
    }

    #[test]
    fn format_parse_round_trip() {
        for decimals in [0u8, 1, 6, 8, 18] {
            for amount in [0u128, 1, 9, 10, 999, 100_000_000, 1_234_567_890_123_456_789] {
                let formatted = format_amount(amount, decimals);
                let parsed = parse_amount(&formatted, decimals).unwrap();
                assert_eq!(parsed, amount, "amount={} decimals={}", amount, decimals);
            }
        }
    }

    #[test]
    fn format_amount_trims_zeros() {
        assert_eq!(format_amount(150_000_000, 8), "1.5");
        assert_eq!(format_amount(100_000_000, 8), "1");
        assert_eq!(format_amount(1, 8), "0.00000001");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn parse_amount_rejects_garbage() {
        assert!(parse_amount("", 8).is_err());
        assert!(parse_amount("1.2.3", 8).is_err());
        assert!(parse_amount("abc", 8).is_err());
        assert!(parse_amount("1.123456789", 8).is_err());
    }

    #[test]
    fn address_validation_prefix_rules() {
        assert!(validate_address(Chain::Zcash, "t1abc"));
        assert!(validate_address(Chain::Zcash, "zs1qqq"));
        assert!(!validate_address(Chain::Zcash, "bc1qxyz"));

        assert!(validate_address(Chain::Osmosis, "osmo1xyz"));
        assert!(!validate_address(Chain::Osmosis, "cosmos1xyz"));

        assert!(validate_address(
            Chain::Fhenix,
            "0xC4323499B809fa8bF421970D9662D37804F23852"
        ));
        assert!(!validate_address(Chain::Fhenix, "0x1234"));
        assert!(!validate_address(
            Chain::Aztec,
            "0xZZ323499B809fa8bF421970D9662D37804F23852"
        ));

        assert!(validate_address(Chain::Mina, "B62qabc"));
        assert!(!validate_address(Chain::Mina, "mina1abc"));
    }

    #[test]
    fn solver_inventory_check() {
        let mut inventory = HashMap::new();
        inventory.insert("OSMO".to_string(), 1_000u128);
        let solver = Solver::new(
            HashMap::new(),
            inventory,
            0,
            rust_decimal_macros::dec!(0.002),
        );
        assert!(solver.has_inventory("OSMO", 1_000));
        assert!(!solver.has_inventory("OSMO", 1_001));
        assert!(!solver.has_inventory("ZEC", 1));
    }

    #[test]
    fn solver_stats_running_average() {
        let mut stats = SolverStats::default();
        stats.record_swap(true, 100.0);
        stats.record_swap(true, 200.0);
        assert_eq!(stats.total_swaps, 2);
        assert!((stats.success_rate - 1.0).abs() < f64::EPSILON);
        assert!((stats.average_time_secs - 150.0).abs() < 1e-9);

        stats.record_swap(false, 0.0);
        assert_eq!(stats.total_swaps, 3);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.average_time_secs - 150.0).abs() < 1e-9);
    }
}
