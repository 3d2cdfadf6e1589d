//! Privacy Hub coordination: two-secret swaps bridged by a shielded pool.
//!
//! A standard atomic swap leaks the same hashlock on both legs, so any
//! observer can re-link them. Here the two legs use independent secrets and
//! never share a hashlock: the solver claims the source leg with the first
//! secret, routes value through a shielded pool on a hub chain, waits a
//! random delay, and funds the destination leg from a one-time address
//! under the second hashlock. Settlement-layer correlation is broken even
//! though the swap itself remains atomic per leg.

use crate::adapter::{AdapterRegistry, ChainAdapter, HtlcParams, Keystore, TxParams};
use crate::crypto::{
    StealthAddressGenerator, generate_secret, generate_swap_id, hash_secret, htlc_id,
};
use crate::error::{Error, Result};
use crate::refund::{RefundEntry, RefundManager};
use crate::retry::{RetryPolicy, with_retry};
use crate::swap::StepStatus;
use crate::timelock::{TimelockParams, sample_offset};
use crate::types::{
    Chain, HtlcState, HtlcStatus, Solver, StealthAddress, SwapIntent, hex_bytes32, now_unix_ms,
    now_unix_secs,
};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Minimum gap kept between the source and destination timelocks.
const TIMELOCK_MARGIN_SECS: u64 = 300;

/// Privacy hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Shielded-pool chain; must be hub-capable (Zcash, Aztec, Miden).
    pub hub_chain: Chain,
    pub min_mixing_delay: Duration,
    pub max_mixing_delay: Duration,
    /// Split hub deposits into standard denominations.
    pub use_split_amounts: bool,
    /// Denominations for split deposits, largest first.
    pub split_denominations: Vec<u128>,
    /// Emit dummy shielded transfers during mixing.
    pub use_decoy_transactions: bool,
    pub decoy_count: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_chain: Chain::Zcash,
            min_mixing_delay: Duration::from_secs(30 * 60),
            max_mixing_delay: Duration::from_secs(2 * 60 * 60),
            use_split_amounts: false,
            split_denominations: vec![1_000_000_000, 100_000_000, 10_000_000, 1_000_000],
            use_decoy_transactions: false,
            decoy_count: 0,
        }
    }
}

/// Phase of a privacy hub swap's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubPhase {
    Initializing,
    GeneratingStealthAddresses,
    LockingSource,
    ConfirmingSourceLock,
    SolverClaimingSource,
    HubDepositing,
    HubMixing,
    HubWithdrawing,
    WaitingRandomDelay,
    LockingDestination,
    ConfirmingDestLock,
    UserClaimingDest,
    Completed,
    Refunding,
    Refunded,
    Failed,
}

/// Coarse status of a privacy hub swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubStatus {
    Pending,
    SourceLocked,
    HubMixing,
    DestLocked,
    Completed,
    Refunded,
    Failed,
}

/// One entry in the hub swap audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubStep {
    pub phase: HubPhase,
    pub status: StepStatus,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
}

/// Privacy guarantees observed on completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrivacyFlags {
    /// The two legs carried different hashlocks.
    pub correlation_broken: bool,
    /// The mixing delay met the configured minimum.
    pub timing_decorrelated: bool,
    /// One-time addresses were used on both sides.
    pub addresses_one_time: bool,
}

/// Execution record for a privacy hub swap.
///
/// The two secrets are only recorded once their respective claim broadcasts
/// have revealed them on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSwapExecution {
    pub swap_id: String,
    pub intent_id: String,
    pub solver_id: String,
    pub phase: HubPhase,
    pub status: HubStatus,
    pub steps: Vec<HubStep>,
    #[serde(with = "hex_bytes32")]
    pub source_hashlock: [u8; 32],
    #[serde(with = "hex_bytes32")]
    pub dest_hashlock: [u8; 32],
    pub source_secret: Option<[u8; 32]>,
    pub dest_secret: Option<[u8; 32]>,
    pub source_htlc: Option<HtlcStatus>,
    pub dest_htlc: Option<HtlcStatus>,
    pub hub_deposit_tx: Option<String>,
    pub hub_withdraw_tx: Option<String>,
    pub hub_mixing_started_ms: Option<i64>,
    pub hub_mixing_completed_ms: Option<i64>,
    pub user_stealth_address: Option<StealthAddress>,
    pub solver_stealth_address: Option<StealthAddress>,
    pub source_timelock: u64,
    pub dest_timelock: u64,
    pub random_delay_ms: u64,
    pub scheduled_dest_lock_ms: Option<i64>,
    pub privacy: PrivacyFlags,
    pub tx_hashes: HashMap<Chain, Vec<String>>,
    pub started_at_ms: i64,
    pub updated_at_ms: i64,
}

impl HubSwapExecution {
    fn begin_step(&mut self, phase: HubPhase) {
        self.phase = phase;
        self.updated_at_ms = now_unix_ms();
        self.steps.push(HubStep {
            phase,
            status: StepStatus::InProgress,
            started_at: self.updated_at_ms,
            completed_at: None,
            error: None,
        });
    }

    fn complete_step(&mut self) {
        self.updated_at_ms = now_unix_ms();
        if let Some(step) = self.steps.last_mut() {
            step.status = StepStatus::Completed;
            step.completed_at = Some(self.updated_at_ms);
        }
    }

    fn fail_step(&mut self, err: &Error) {
        self.updated_at_ms = now_unix_ms();
        if let Some(step) = self.steps.last_mut() {
            if step.status == StepStatus::InProgress {
                step.status = StepStatus::Failed;
                step.completed_at = Some(self.updated_at_ms);
                step.error = Some(err.to_string());
            }
        }
    }

    fn record_tx(&mut self, chain: Chain, tx_hash: String) {
        self.tx_hashes.entry(chain).or_default().push(tx_hash);
    }
}

/// Drives privacy hub swaps through their state machine.
pub struct PrivacyHubCoordinator {
    registry: Arc<AdapterRegistry>,
    keystore: Keystore,
    refunds: Arc<RefundManager>,
    stealth: StealthAddressGenerator,
    config: HubConfig,
    retry: RetryPolicy,
    source_timelock: TimelockParams,
    dest_timelock: TimelockParams,
    executions: RwLock<HashMap<String, HubSwapExecution>>,
}

impl std::fmt::Debug for PrivacyHubCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivacyHubCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PrivacyHubCoordinator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        keystore: Keystore,
        refunds: Arc<RefundManager>,
        config: HubConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if !config.hub_chain.is_hub_capable() {
            return Err(Error::PrivacyHubUnavailable(format!(
                "{} cannot act as a shielded intermediary",
                config.hub_chain
            )));
        }
        Ok(Self {
            registry,
            keystore,
            refunds,
            stealth: StealthAddressGenerator::new(),
            config,
            retry,
            source_timelock: TimelockParams::SOURCE,
            dest_timelock: TimelockParams::DEST,
            executions: RwLock::new(HashMap::new()),
        })
    }

    /// Execute a matched intent through the privacy hub.
    pub async fn initiate(&self, intent: &SwapIntent, solver: &Solver) -> Result<HubSwapExecution> {
        let swap_id = generate_swap_id();
        let source_secret = generate_secret();
        let dest_secret = generate_secret();
        let source_hashlock = hash_secret(&source_secret);
        let dest_hashlock = hash_secret(&dest_secret);
        debug_assert_ne!(source_hashlock, dest_hashlock);

        let now = now_unix_secs();
        let source_offset = sample_offset(&self.source_timelock);
        // Keep the destination window strictly inside the source window.
        let dest_offset =
            sample_offset(&self.dest_timelock).min(source_offset - TIMELOCK_MARGIN_SECS);
        let random_delay = self.sample_mixing_delay();

        let mut exec = HubSwapExecution {
            swap_id: swap_id.clone(),
            intent_id: intent.id.clone(),
            solver_id: solver.id.clone(),
            phase: HubPhase::Initializing,
            status: HubStatus::Pending,
            steps: Vec::new(),
            source_hashlock,
            dest_hashlock,
            source_secret: None,
            dest_secret: None,
            source_htlc: None,
            dest_htlc: None,
            hub_deposit_tx: None,
            hub_withdraw_tx: None,
            hub_mixing_started_ms: None,
            hub_mixing_completed_ms: None,
            user_stealth_address: None,
            solver_stealth_address: None,
            source_timelock: now + source_offset,
            dest_timelock: now + dest_offset,
            random_delay_ms: random_delay.as_millis() as u64,
            scheduled_dest_lock_ms: None,
            privacy: PrivacyFlags::default(),
            tx_hashes: HashMap::new(),
            started_at_ms: now_unix_ms(),
            updated_at_ms: now_unix_ms(),
        };
        exec.begin_step(HubPhase::Initializing);
        exec.complete_step();
        log::info!(
            "hub swap {} initiated for intent {} via {} (delay {:?})",
            swap_id,
            intent.id,
            self.config.hub_chain,
            random_delay
        );

        let result = self
            .run(&mut exec, intent, solver, &source_secret, &dest_secret)
            .await;
        match result {
            Ok(()) => {
                exec.phase = HubPhase::Completed;
                exec.status = HubStatus::Completed;
                exec.privacy = PrivacyFlags {
                    correlation_broken: exec.source_hashlock != exec.dest_hashlock,
                    timing_decorrelated: exec.random_delay_ms
                        >= self.config.min_mixing_delay.as_millis() as u64,
                    addresses_one_time: exec.user_stealth_address.is_some()
                        && exec.solver_stealth_address.is_some(),
                };
                exec.updated_at_ms = now_unix_ms();
                self.store(&exec).await;
                log::info!("hub swap {} completed", swap_id);
                Ok(exec)
            }
            Err(err) => {
                exec.fail_step(&err);
                exec.status = HubStatus::Failed;
                self.store(&exec).await;
                log::warn!("hub swap {} failed in {:?}: {}", swap_id, exec.phase, err);
                Err(Error::for_swap(swap_id, err))
            }
        }
    }

    pub async fn get_execution(&self, swap_id: &str) -> Option<HubSwapExecution> {
        self.executions.read().await.get(swap_id).cloned()
    }

    pub async fn list_executions(&self) -> Vec<HubSwapExecution> {
        self.executions.read().await.values().cloned().collect()
    }

    /// Flag a swap as undergoing refund recovery.
    pub async fn mark_refunding(&self, swap_id: &str) {
        self.set_exit(swap_id, HubPhase::Refunding, None).await;
    }

    /// Flag a swap as recovered through refunds.
    pub async fn mark_refunded(&self, swap_id: &str) {
        self.set_exit(swap_id, HubPhase::Refunded, Some(HubStatus::Refunded))
            .await;
    }

    async fn set_exit(&self, swap_id: &str, phase: HubPhase, status: Option<HubStatus>) {
        let mut executions = self.executions.write().await;
        if let Some(exec) = executions.get_mut(swap_id) {
            exec.phase = phase;
            if let Some(status) = status {
                exec.status = status;
            }
            exec.updated_at_ms = now_unix_ms();
        }
    }

    async fn store(&self, exec: &HubSwapExecution) {
        self.executions
            .write()
            .await
            .insert(exec.swap_id.clone(), exec.clone());
    }

    fn sample_mixing_delay(&self) -> Duration {
        let min = self.config.min_mixing_delay.as_millis() as u64;
        let max = self.config.max_mixing_delay.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(OsRng.gen_range(min..=max))
    }

    async fn run(
        &self,
        exec: &mut HubSwapExecution,
        intent: &SwapIntent,
        solver: &Solver,
        source_secret: &[u8; 32],
        dest_secret: &[u8; 32],
    ) -> Result<()> {
        let source_chain = intent.source.chain;
        let dest_chain = intent.dest.chain;
        let hub_chain = self.config.hub_chain;
        let source_adapter = self.registry.get(source_chain)?;
        let dest_adapter = self.registry.get(dest_chain)?;
        let hub_adapter = self.registry.get(hub_chain)?;

        let user_source = intent
            .user
            .addresses
            .get(&source_chain)
            .cloned()
            .ok_or_else(|| Error::InvalidIntent("User has no source-chain address".into()))?;
        let user_dest = intent
            .user
            .addresses
            .get(&dest_chain)
            .cloned()
            .ok_or_else(|| Error::InvalidIntent("User has no destination-chain address".into()))?;
        let solver_source = solver
            .addresses
            .get(&source_chain)
            .cloned()
            .ok_or_else(|| Error::SolverUnavailable(intent.id.clone()))?;
        let solver_dest = solver
            .addresses
            .get(&dest_chain)
            .cloned()
            .ok_or_else(|| Error::SolverUnavailable(intent.id.clone()))?;
        let solver_hub = solver.addresses.get(&hub_chain).cloned().ok_or_else(|| {
            Error::PrivacyHubUnavailable(format!("solver has no {hub_chain} address"))
        })?;

        // One-time addresses on both sides; nothing downstream reuses a
        // base address.
        exec.begin_step(HubPhase::GeneratingStealthAddresses);
        self.store(exec).await;
        let user_stealth = self.stealth.generate(source_chain, &user_source)?;
        let solver_stealth = self.stealth.generate(dest_chain, &solver_dest)?;
        exec.user_stealth_address = Some(user_stealth);
        exec.solver_stealth_address = Some(solver_stealth.clone());
        exec.complete_step();

        // User locks the source leg under the FIRST hashlock.
        exec.begin_step(HubPhase::LockingSource);
        self.store(exec).await;
        let source_params = HtlcParams {
            sender: user_source.clone(),
            receiver: solver_source,
            amount: intent.source.amount,
            asset: Some(intent.source.asset.clone()),
            hashlock: exec.source_hashlock,
            timelock: exec.source_timelock,
        };
        let source_htlc_id = htlc_id(source_chain, &exec.source_hashlock);
        let lock_tx = self
            .submit_htlc(&source_adapter, source_chain, source_params.clone())
            .await?;
        exec.record_tx(source_chain, lock_tx.clone());
        exec.source_htlc = Some(HtlcStatus {
            id: source_htlc_id.clone(),
            state: HtlcState::Locked,
            tx_hash: Some(lock_tx.clone()),
            claim_tx_hash: None,
            refund_tx_hash: None,
            amount: source_params.amount,
            hashlock: exec.source_hashlock,
            timelock: exec.source_timelock,
        });
        self.refunds
            .register(RefundEntry {
                swap_id: exec.swap_id.clone(),
                htlc_id: source_htlc_id.clone(),
                chain: source_chain,
                timelock: exec.source_timelock,
                amount: source_params.amount,
                refund_address: user_source,
            })
            .await;
        exec.complete_step();

        exec.begin_step(HubPhase::ConfirmingSourceLock);
        self.store(exec).await;
        self.confirm(&source_adapter, &lock_tx).await?;
        exec.status = HubStatus::SourceLocked;
        exec.complete_step();

        // Solver claims the source leg immediately, revealing the first
        // secret. The source side is now settled and cryptographically
        // finished; nothing that follows references it.
        exec.begin_step(HubPhase::SolverClaimingSource);
        self.store(exec).await;
        let claim_tx = self
            .submit_claim(&source_adapter, source_chain, &source_htlc_id, source_secret)
            .await?;
        exec.record_tx(source_chain, claim_tx.clone());
        exec.source_secret = Some(*source_secret);
        if let Some(source) = exec.source_htlc.as_mut() {
            source.state = HtlcState::Claimed;
            source.claim_tx_hash = Some(claim_tx);
        }
        self.refunds.unregister(&source_htlc_id).await;
        exec.complete_step();

        // Solver moves equivalent value into the shielded pool.
        exec.begin_step(HubPhase::HubDepositing);
        self.store(exec).await;
        let pool = shielded_pool_address(hub_chain);
        let deposit_amounts = if self.config.use_split_amounts {
            split_into_denominations(intent.dest.min_amount, &self.config.split_denominations)
        } else {
            vec![intent.dest.min_amount]
        };
        for (i, amount) in deposit_amounts.iter().enumerate() {
            let tx = self
                .submit_transfer(
                    &hub_adapter,
                    hub_chain,
                    TxParams {
                        from: solver_hub.clone(),
                        to: pool.clone(),
                        amount: *amount,
                        asset: None,
                        memo: None,
                    },
                )
                .await?;
            exec.record_tx(hub_chain, tx.clone());
            if i == 0 {
                exec.hub_deposit_tx = Some(tx);
            }
        }
        exec.complete_step();

        // Sit inside the pool for the sampled delay, optionally surrounded
        // by decoy traffic inflating the anonymity set.
        exec.begin_step(HubPhase::HubMixing);
        exec.status = HubStatus::HubMixing;
        exec.hub_mixing_started_ms = Some(now_unix_ms());
        exec.scheduled_dest_lock_ms =
            Some(now_unix_ms() + exec.random_delay_ms as i64);
        self.store(exec).await;
        if self.config.use_decoy_transactions {
            self.emit_decoys(exec, &hub_adapter, hub_chain, &solver_hub, &pool)
                .await?;
        }
        tokio::time::sleep(Duration::from_millis(exec.random_delay_ms)).await;
        exec.hub_mixing_completed_ms = Some(now_unix_ms());
        exec.complete_step();

        // Withdraw to the solver's one-time destination address.
        exec.begin_step(HubPhase::HubWithdrawing);
        self.store(exec).await;
        let withdraw_tx = self
            .submit_transfer(
                &hub_adapter,
                hub_chain,
                TxParams {
                    from: pool.clone(),
                    to: solver_stealth.address.clone(),
                    amount: intent.dest.min_amount,
                    asset: None,
                    memo: None,
                },
            )
            .await?;
        exec.record_tx(hub_chain, withdraw_tx.clone());
        exec.hub_withdraw_tx = Some(withdraw_tx);
        exec.complete_step();

        // Catch up to the scheduled lock time if the withdrawal came early.
        exec.begin_step(HubPhase::WaitingRandomDelay);
        self.store(exec).await;
        if let Some(scheduled) = exec.scheduled_dest_lock_ms {
            let remaining = scheduled - now_unix_ms();
            if remaining > 0 {
                tokio::time::sleep(Duration::from_millis(remaining as u64)).await;
            }
        }
        exec.complete_step();

        // Solver locks the destination leg under the SECOND hashlock, from
        // the one-time address.
        exec.begin_step(HubPhase::LockingDestination);
        self.store(exec).await;
        let dest_params = HtlcParams {
            sender: solver_stealth.address.clone(),
            receiver: user_dest,
            amount: intent.dest.min_amount,
            asset: Some(intent.dest.asset.clone()),
            hashlock: exec.dest_hashlock,
            timelock: exec.dest_timelock,
        };
        let dest_htlc_id = htlc_id(dest_chain, &exec.dest_hashlock);
        let dest_lock_tx = self
            .submit_htlc(&dest_adapter, dest_chain, dest_params.clone())
            .await?;
        exec.record_tx(dest_chain, dest_lock_tx.clone());
        exec.dest_htlc = Some(HtlcStatus {
            id: dest_htlc_id.clone(),
            state: HtlcState::Locked,
            tx_hash: Some(dest_lock_tx.clone()),
            claim_tx_hash: None,
            refund_tx_hash: None,
            amount: dest_params.amount,
            hashlock: exec.dest_hashlock,
            timelock: exec.dest_timelock,
        });
        self.refunds
            .register(RefundEntry {
                swap_id: exec.swap_id.clone(),
                htlc_id: dest_htlc_id.clone(),
                chain: dest_chain,
                timelock: exec.dest_timelock,
                amount: dest_params.amount,
                refund_address: solver_stealth.address.clone(),
            })
            .await;
        exec.complete_step();

        exec.begin_step(HubPhase::ConfirmingDestLock);
        self.store(exec).await;
        self.confirm(&dest_adapter, &dest_lock_tx).await?;
        exec.status = HubStatus::DestLocked;
        exec.complete_step();

        // User claims with the second secret; the first one never appears
        // on the destination chain.
        exec.begin_step(HubPhase::UserClaimingDest);
        self.store(exec).await;
        let dest_claim_tx = self
            .submit_claim(&dest_adapter, dest_chain, &dest_htlc_id, dest_secret)
            .await?;
        exec.record_tx(dest_chain, dest_claim_tx.clone());
        exec.dest_secret = Some(*dest_secret);
        if let Some(dest) = exec.dest_htlc.as_mut() {
            dest.state = HtlcState::Claimed;
            dest.claim_tx_hash = Some(dest_claim_tx);
        }
        self.refunds.unregister(&dest_htlc_id).await;
        exec.complete_step();

        Ok(())
    }

    /// Interleave dummy pool deposits and withdrawals.
    async fn emit_decoys(
        &self,
        exec: &mut HubSwapExecution,
        hub_adapter: &Arc<dyn ChainAdapter>,
        hub_chain: Chain,
        solver_hub: &str,
        pool: &str,
    ) -> Result<()> {
        let amount = self
            .config
            .split_denominations
            .last()
            .copied()
            .unwrap_or(1_000_000);
        for i in 0..self.config.decoy_count {
            let (from, to) = if i % 2 == 0 {
                (solver_hub.to_string(), pool.to_string())
            } else {
                (pool.to_string(), solver_hub.to_string())
            };
            let tx = self
                .submit_transfer(
                    hub_adapter,
                    hub_chain,
                    TxParams {
                        from,
                        to,
                        amount,
                        asset: None,
                        memo: None,
                    },
                )
                .await?;
            exec.record_tx(hub_chain, tx);
        }
        log::debug!(
            "emitted {} decoy transfer(s) on {}",
            self.config.decoy_count,
            hub_chain
        );
        Ok(())
    }

    async fn submit_htlc(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        chain: Chain,
        params: HtlcParams,
    ) -> Result<String> {
        let key = self.keystore.get(chain)?;
        let adapter = adapter.as_ref();
        let outcome = with_retry(&self.retry, || {
            let params = params.clone();
            async move {
                let unsigned = adapter.create_htlc(params).await?;
                let signed = adapter.sign_transaction(unsigned, key).await?;
                adapter.broadcast_transaction(signed).await
            }
        })
        .await?;
        Ok(outcome.value)
    }

    async fn submit_claim(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        chain: Chain,
        htlc_id: &str,
        secret: &[u8; 32],
    ) -> Result<String> {
        let key = self.keystore.get(chain)?;
        let adapter = adapter.as_ref();
        let outcome = with_retry(&self.retry, || async move {
            let unsigned = adapter.claim_htlc(htlc_id, secret).await?;
            let signed = adapter.sign_transaction(unsigned, key).await?;
            adapter.broadcast_transaction(signed).await
        })
        .await?;
        Ok(outcome.value)
    }

    async fn submit_transfer(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        chain: Chain,
        params: TxParams,
    ) -> Result<String> {
        let key = self.keystore.get(chain)?;
        let adapter = adapter.as_ref();
        let outcome = with_retry(&self.retry, || {
            let params = params.clone();
            async move {
                let unsigned = adapter.build_transaction(params).await?;
                let signed = adapter.sign_transaction(unsigned, key).await?;
                adapter.broadcast_transaction(signed).await
            }
        })
        .await?;
        Ok(outcome.value)
    }

    async fn confirm(&self, adapter: &Arc<dyn ChainAdapter>, tx_hash: &str) -> Result<()> {
        with_retry(&self.retry, || adapter.wait_for_confirmation(tx_hash))
            .await
            .map(|_| ())
    }
}

/// Conventional shielded-pool entry address on a hub chain.
fn shielded_pool_address(chain: Chain) -> String {
    format!("{chain}_shielded_pool")
}

/// Greedy split of `amount` into `denominations` (largest first), with any
/// remainder as a final odd-sized deposit.
fn split_into_denominations(amount: u128, denominations: &[u128]) -> Vec<u128> {
    let mut sorted: Vec<u128> = denominations.iter().copied().filter(|d| *d > 0).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut parts = Vec::new();
    let mut remaining = amount;
    for denom in sorted {
        while remaining >= denom {
            parts.push(denom);
            remaining -= denom;
        }
    }
    if remaining > 0 || parts.is_empty() {
        parts.push(remaining);
    }
    parts
}
