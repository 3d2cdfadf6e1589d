//! Standard atomic-swap coordination.
//!
//! One secret, one hashlock, two HTLCs. The user locks on the source chain,
//! the solver mirrors the lock on the destination chain under the same
//! hashlock, and the user's destination claim reveals the secret the solver
//! needs to collect the source leg. Timelocks are ordered so the user can
//! always claim before the solver's recovery window opens.

use crate::adapter::{AdapterRegistry, ChainAdapter, HtlcParams, Keystore};
use crate::crypto::{generate_secret, generate_swap_id, hash_secret, htlc_id};
use crate::error::{Error, Result};
use crate::refund::{RefundEntry, RefundManager};
use crate::retry::{RetryPolicy, with_retry};
use crate::timelock::{TimelockParams, sample_timelock};
use crate::types::{
    Chain, HtlcState, HtlcStatus, Solver, SwapIntent, hex_bytes32, now_unix_ms, now_unix_secs,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Phase of a standard swap's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    Initializing,
    LockingSource,
    ConfirmingLock,
    LockingDest,
    ConfirmingDest,
    ClaimingDest,
    Completing,
    Completed,
}

/// Overall outcome of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Completed,
    Refunded,
    Failed,
}

/// Progress of one step in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// One entry in the execution audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapStep {
    pub phase: SwapPhase,
    pub status: StepStatus,
    /// Unix-ms timestamps.
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub error: Option<String>,
}

/// Execution record for a standard atomic swap.
///
/// The secret is only filled in once the destination claim broadcast has
/// revealed it on-chain anyway; records stored mid-flight never carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExecution {
    pub swap_id: String,
    pub intent_id: String,
    pub solver_id: String,
    pub phase: SwapPhase,
    pub status: SwapStatus,
    pub steps: Vec<SwapStep>,
    #[serde(with = "hex_bytes32")]
    pub hashlock: [u8; 32],
    pub secret: Option<[u8; 32]>,
    pub source_htlc: Option<HtlcStatus>,
    pub dest_htlc: Option<HtlcStatus>,
    /// Transaction hashes per chain, in broadcast order.
    pub tx_hashes: HashMap<Chain, Vec<String>>,
    pub source_timelock: u64,
    pub dest_timelock: u64,
    pub started_at_ms: i64,
    pub updated_at_ms: i64,
}

impl SwapExecution {
    fn begin_step(&mut self, phase: SwapPhase) {
        self.phase = phase;
        self.updated_at_ms = now_unix_ms();
        self.steps.push(SwapStep {
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

/// Drives standard atomic swaps through their state machine.
pub struct HtlcCoordinator {
    registry: Arc<AdapterRegistry>,
    keystore: Keystore,
    refunds: Arc<RefundManager>,
    retry: RetryPolicy,
    source_timelock: TimelockParams,
    executions: RwLock<HashMap<String, SwapExecution>>,
}

impl HtlcCoordinator {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        keystore: Keystore,
        refunds: Arc<RefundManager>,
        retry: RetryPolicy,
        source_timelock: TimelockParams,
    ) -> Self {
        Self {
            registry,
            keystore,
            refunds,
            retry,
            source_timelock,
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Execute a matched intent against a solver.
    ///
    /// On failure the execution record stays at the failing phase and any
    /// locked HTLC is already registered with the refund manager; recovery
    /// happens through timelock expiry, not here.
    pub async fn initiate(&self, intent: &SwapIntent, solver: &Solver) -> Result<SwapExecution> {
        let swap_id = generate_swap_id();
        let secret = generate_secret();
        let hashlock = hash_secret(&secret);
        let source_timelock = sample_timelock(&self.source_timelock);
        // Half the source window: the user claims the destination well
        // before the solver could recover the source leg.
        let now = now_unix_secs();
        let dest_timelock = now + (source_timelock - now) / 2;

        let mut exec = SwapExecution {
            swap_id: swap_id.clone(),
            intent_id: intent.id.clone(),
            solver_id: solver.id.clone(),
            phase: SwapPhase::Initializing,
            status: SwapStatus::Pending,
            steps: Vec::new(),
            hashlock,
            secret: None,
            source_htlc: None,
            dest_htlc: None,
            tx_hashes: HashMap::new(),
            source_timelock,
            dest_timelock,
            started_at_ms: now_unix_ms(),
            updated_at_ms: now_unix_ms(),
        };
        exec.begin_step(SwapPhase::Initializing);
        exec.complete_step();
        log::info!(
            "swap {} initiated for intent {} with solver {}",
            swap_id,
            intent.id,
            solver.id
        );

        let result = self.run(&mut exec, intent, solver, &secret).await;
        match result {
            Ok(()) => {
                exec.phase = SwapPhase::Completed;
                exec.status = SwapStatus::Completed;
                exec.updated_at_ms = now_unix_ms();
                self.store(&exec).await;
                log::info!("swap {} completed", swap_id);
                Ok(exec)
            }
            Err(err) => {
                exec.fail_step(&err);
                exec.status = SwapStatus::Failed;
                self.store(&exec).await;
                log::warn!("swap {} failed in {:?}: {}", swap_id, exec.phase, err);
                Err(Error::for_swap(swap_id, err))
            }
        }
    }

    pub async fn get_execution(&self, swap_id: &str) -> Option<SwapExecution> {
        self.executions.read().await.get(swap_id).cloned()
    }

    pub async fn list_executions(&self) -> Vec<SwapExecution> {
        self.executions.read().await.values().cloned().collect()
    }

    async fn store(&self, exec: &SwapExecution) {
        self.executions
            .write()
            .await
            .insert(exec.swap_id.clone(), exec.clone());
    }

    async fn run(
        &self,
        exec: &mut SwapExecution,
        intent: &SwapIntent,
        solver: &Solver,
        secret: &[u8; 32],
    ) -> Result<()> {
        let source_chain = intent.source.chain;
        let dest_chain = intent.dest.chain;
        let source_adapter = self.registry.get(source_chain)?;
        let dest_adapter = self.registry.get(dest_chain)?;

        let user_source = address_of(&intent.user.addresses, source_chain)
            .ok_or_else(|| Error::InvalidIntent("User has no source-chain address".into()))?;
        let user_dest = address_of(&intent.user.addresses, dest_chain)
            .ok_or_else(|| Error::InvalidIntent("User has no destination-chain address".into()))?;
        let solver_source = address_of(&solver.addresses, source_chain)
            .ok_or_else(|| Error::SolverUnavailable(intent.id.clone()))?;
        let solver_dest = address_of(&solver.addresses, dest_chain)
            .ok_or_else(|| Error::SolverUnavailable(intent.id.clone()))?;

        // User locks the source leg; the solver is the receiver.
        exec.begin_step(SwapPhase::LockingSource);
        self.store(exec).await;
        let source_params = HtlcParams {
            sender: user_source.clone(),
            receiver: solver_source,
            amount: intent.source.amount,
            asset: Some(intent.source.asset.clone()),
            hashlock: exec.hashlock,
            timelock: exec.source_timelock,
        };
        let source_htlc_id = htlc_id(source_chain, &exec.hashlock);
        let lock_tx = self
            .lock_htlc(&source_adapter, source_chain, source_params.clone())
            .await?;
        exec.record_tx(source_chain, lock_tx.clone());
        exec.source_htlc = Some(HtlcStatus {
            id: source_htlc_id.clone(),
            state: HtlcState::Locked,
            tx_hash: Some(lock_tx.clone()),
            claim_tx_hash: None,
            refund_tx_hash: None,
            amount: source_params.amount,
            hashlock: exec.hashlock,
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

        exec.begin_step(SwapPhase::ConfirmingLock);
        self.store(exec).await;
        self.confirm(&source_adapter, &lock_tx).await?;
        exec.complete_step();

        // Solver mirrors the lock on the destination leg under the same
        // hashlock, with the shorter timelock.
        exec.begin_step(SwapPhase::LockingDest);
        self.store(exec).await;
        let dest_params = HtlcParams {
            sender: solver_dest.clone(),
            receiver: user_dest,
            amount: intent.dest.min_amount,
            asset: Some(intent.dest.asset.clone()),
            hashlock: exec.hashlock,
            timelock: exec.dest_timelock,
        };
        let dest_htlc_id = htlc_id(dest_chain, &exec.hashlock);
        let dest_lock_tx = self
            .lock_htlc(&dest_adapter, dest_chain, dest_params.clone())
            .await?;
        exec.record_tx(dest_chain, dest_lock_tx.clone());
        exec.dest_htlc = Some(HtlcStatus {
            id: dest_htlc_id.clone(),
            state: HtlcState::Locked,
            tx_hash: Some(dest_lock_tx.clone()),
            claim_tx_hash: None,
            refund_tx_hash: None,
            amount: dest_params.amount,
            hashlock: exec.hashlock,
            timelock: exec.dest_timelock,
        });
        self.refunds
            .register(RefundEntry {
                swap_id: exec.swap_id.clone(),
                htlc_id: dest_htlc_id.clone(),
                chain: dest_chain,
                timelock: exec.dest_timelock,
                amount: dest_params.amount,
                refund_address: solver_dest,
            })
            .await;
        exec.complete_step();

        exec.begin_step(SwapPhase::ConfirmingDest);
        self.store(exec).await;
        self.confirm(&dest_adapter, &dest_lock_tx).await?;
        exec.complete_step();

        // User claims the destination, revealing the secret on-chain.
        exec.begin_step(SwapPhase::ClaimingDest);
        self.store(exec).await;
        let claim_tx = self
            .claim_htlc(&dest_adapter, dest_chain, &dest_htlc_id, secret)
            .await?;
        exec.record_tx(dest_chain, claim_tx.clone());
        exec.secret = Some(*secret);
        if let Some(dest) = exec.dest_htlc.as_mut() {
            dest.state = HtlcState::Claimed;
            dest.claim_tx_hash = Some(claim_tx);
        }
        // The destination leg is spent; nothing left to refund there.
        self.refunds.unregister(&dest_htlc_id).await;
        exec.complete_step();

        // The solver claims the source leg out-of-band with the revealed
        // secret; record whatever is already observable.
        exec.begin_step(SwapPhase::Completing);
        self.store(exec).await;
        if let Ok(status) = source_adapter.get_htlc_status(&source_htlc_id).await {
            if status.state == HtlcState::Claimed {
                self.refunds.unregister(&source_htlc_id).await;
            }
            exec.source_htlc = Some(status);
        }
        exec.complete_step();

        Ok(())
    }

    /// create -> sign -> broadcast, each retried on transient failures.
    async fn lock_htlc(
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
        log::debug!("locked HTLC on {} in tx {}", chain, outcome.value);
        Ok(outcome.value)
    }

    async fn claim_htlc(
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
        log::debug!("claimed HTLC {} on {} in tx {}", htlc_id, chain, outcome.value);
        Ok(outcome.value)
    }

    async fn confirm(&self, adapter: &Arc<dyn ChainAdapter>, tx_hash: &str) -> Result<()> {
        with_retry(&self.retry, || adapter.wait_for_confirmation(tx_hash))
            .await
            .map(|_| ())
    }
}

fn address_of(addresses: &HashMap<Chain, String>, chain: Chain) -> Option<String> {
    addresses.get(&chain).cloned()
}
