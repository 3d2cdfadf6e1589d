//! Automated refunds for expired HTLCs.
//!
//! Coordinators register every HTLC they lock and forget about it; the
//! manager owns recovery from there. A single periodic pass scans for
//! entries whose timelock (plus a safety buffer) has passed and drives the
//! adapter's refund flow with bounded concurrency. Entries hold no secrets,
//! only what is needed to build a refund.

use crate::adapter::{AdapterRegistry, Keystore};
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{Chain, now_unix_ms, now_unix_secs};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Serde module rendering amounts as decimal strings for portability.
mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything needed to refund one HTLC. No secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEntry {
    pub swap_id: String,
    pub htlc_id: String,
    pub chain: Chain,
    /// Unix-seconds timelock; refundable once this (plus buffer) passes.
    pub timelock: u64,
    #[serde(with = "amount_string")]
    pub amount: u128,
    pub refund_address: String,
}

/// Outcome of one refund attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub htlc_id: String,
    pub chain: Chain,
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    /// Unix-ms attempt time.
    pub timestamp: i64,
}

/// Serialized manager state for persistence across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundManagerState {
    pub pending_refunds: Vec<RefundEntry>,
    pub refund_history: Vec<RefundRecord>,
}

/// Aggregate counters exposed by [`RefundManager::get_stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefundStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: u64,
    pub failed: u64,
    pub total_attempts: u64,
    pub success_rate: f64,
}

/// Refund manager tuning knobs.
#[derive(Debug, Clone)]
pub struct RefundConfig {
    pub check_interval: Duration,
    /// Extra slack past the timelock before attempting a refund.
    pub refund_buffer: Duration,
    pub max_concurrent_refunds: usize,
    /// Stop retrying an entry after this many failed passes, if set.
    pub max_attempts_per_entry: Option<u32>,
    pub retry: RetryPolicy,
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            refund_buffer: Duration::from_secs(5),
            max_concurrent_refunds: 3,
            max_attempts_per_entry: None,
            retry: RetryPolicy::standard(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Pending,
    Processing,
}

#[derive(Debug, Clone)]
struct EntrySlot {
    entry: RefundEntry,
    state: EntryState,
    attempts: u32,
}

type AttemptListener = Box<dyn Fn(&str, Chain, bool) + Send + Sync>;
type ErrorListener = Box<dyn Fn(&Error, &str) + Send + Sync>;

/// Watches registered HTLCs and refunds them once their timelocks expire.
pub struct RefundManager {
    config: RefundConfig,
    registry: Arc<AdapterRegistry>,
    keystore: Keystore,
    entries: RwLock<HashMap<String, EntrySlot>>,
    history: RwLock<Vec<RefundRecord>>,
    completed: AtomicU64,
    failed: AtomicU64,
    total_attempts: AtomicU64,
    pass_active: AtomicBool,
    monitor: Mutex<Option<JoinHandle<()>>>,
    on_refund_attempt: Option<AttemptListener>,
    on_error: Option<ErrorListener>,
}

impl RefundManager {
    pub fn new(config: RefundConfig, registry: Arc<AdapterRegistry>, keystore: Keystore) -> Self {
        Self {
            config,
            registry,
            keystore,
            entries: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_attempts: AtomicU64::new(0),
            pass_active: AtomicBool::new(false),
            monitor: Mutex::new(None),
            on_refund_attempt: None,
            on_error: None,
        }
    }

    /// Observe every refund attempt: `(swap_id, chain, success)`.
    pub fn with_attempt_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, Chain, bool) + Send + Sync + 'static,
    {
        self.on_refund_attempt = Some(Box::new(listener));
        self
    }

    /// Observe refund errors with a short context string.
    pub fn with_error_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Error, &str) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(listener));
        self
    }

    /// Track an HTLC for eventual refund. Re-registering an id resets its
    /// attempt counter.
    pub async fn register(&self, entry: RefundEntry) {
        log::debug!(
            "tracking HTLC {} on {} for refund at {}",
            entry.htlc_id,
            entry.chain,
            entry.timelock
        );
        self.entries.write().await.insert(
            entry.htlc_id.clone(),
            EntrySlot {
                entry,
                state: EntryState::Pending,
                attempts: 0,
            },
        );
    }

    /// Stop tracking an HTLC (typically because it was claimed).
    pub async fn unregister(&self, htlc_id: &str) {
        if self.entries.write().await.remove(htlc_id).is_some() {
            log::debug!("stopped tracking HTLC {htlc_id}");
        }
    }

    /// Spawn the periodic monitoring task. Idempotent.
    pub async fn start_monitoring(self: &Arc<Self>) {
        let mut monitor = self.monitor.lock().await;
        if monitor.is_some() {
            return;
        }
        let manager = Arc::clone(self);
        let interval = self.config.check_interval;
        log::info!("refund monitoring started, interval {:?}", interval);
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                manager.check_refunds().await;
            }
        }));
    }

    /// Stop the periodic monitoring task.
    pub async fn stop_monitoring(&self) {
        if let Some(handle) = self.monitor.lock().await.take() {
            handle.abort();
            log::info!("refund monitoring stopped");
        }
    }

    /// Run one refund pass. Returns how many entries were attempted.
    ///
    /// Only one pass runs at a time; a pass that finds the previous one
    /// still in flight returns immediately.
    pub async fn check_refunds(&self) -> usize {
        if self.pass_active.swap(true, Ordering::SeqCst) {
            log::debug!("refund pass already in progress, skipping tick");
            return 0;
        }

        let eligible = self.take_eligible().await;
        let attempted = eligible.len();
        if attempted > 0 {
            log::info!("processing {attempted} eligible refund(s)");
            futures::stream::iter(eligible)
                .map(|entry| self.process_entry(entry))
                .buffer_unordered(self.config.max_concurrent_refunds.max(1))
                .collect::<Vec<()>>()
                .await;
        }

        self.pass_active.store(false, Ordering::SeqCst);
        attempted
    }

    /// Refund a specific HTLC immediately, ignoring the local timelock
    /// check. The adapter still decides on-chain eligibility.
    pub async fn force_refund(&self, htlc_id: &str) -> Result<String> {
        let entry = {
            let mut entries = self.entries.write().await;
            let slot = entries
                .get_mut(htlc_id)
                .ok_or_else(|| Error::Other(format!("No refund entry for HTLC {htlc_id}")))?;
            slot.state = EntryState::Processing;
            slot.entry.clone()
        };
        log::warn!("forcing refund of HTLC {htlc_id}");
        match self.attempt_refund(&entry).await {
            Ok(tx_hash) => {
                self.finish(entry, true, Some(tx_hash.clone()), None).await;
                Ok(tx_hash)
            }
            Err(err) => {
                self.finish(entry, false, None, Some(err.to_string())).await;
                Err(err)
            }
        }
    }

    pub async fn get_pending_refunds(&self) -> Vec<RefundEntry> {
        self.entries
            .read()
            .await
            .values()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    pub async fn get_eligible_refunds(&self) -> Vec<RefundEntry> {
        let cutoff = self.eligibility_cutoff();
        self.entries
            .read()
            .await
            .values()
            .filter(|slot| self.is_eligible(slot, cutoff))
            .map(|slot| slot.entry.clone())
            .collect()
    }

    pub async fn get_refund_history(&self) -> Vec<RefundRecord> {
        self.history.read().await.clone()
    }

    pub async fn get_stats(&self) -> RefundStats {
        let entries = self.entries.read().await;
        let processing = entries
            .values()
            .filter(|slot| slot.state == EntryState::Processing)
            .count();
        let completed = self.completed.load(Ordering::SeqCst);
        let total_attempts = self.total_attempts.load(Ordering::SeqCst);
        RefundStats {
            pending: entries.len() - processing,
            processing,
            completed,
            failed: self.failed.load(Ordering::SeqCst),
            total_attempts,
            success_rate: if total_attempts == 0 {
                0.0
            } else {
                completed as f64 / total_attempts as f64
            },
        }
    }

    /// Snapshot the queue and history for persistence.
    pub async fn export_state(&self) -> RefundManagerState {
        let mut pending_refunds: Vec<RefundEntry> = self
            .entries
            .read()
            .await
            .values()
            .map(|slot| slot.entry.clone())
            .collect();
        pending_refunds.sort_by(|a, b| a.htlc_id.cmp(&b.htlc_id));
        RefundManagerState {
            pending_refunds,
            refund_history: self.history.read().await.clone(),
        }
    }

    /// Rebuild the queue and history from a previous export.
    pub async fn import_state(&self, state: RefundManagerState) {
        let mut entries = self.entries.write().await;
        entries.clear();
        for entry in state.pending_refunds {
            entries.insert(
                entry.htlc_id.clone(),
                EntrySlot {
                    entry,
                    state: EntryState::Pending,
                    attempts: 0,
                },
            );
        }
        *self.history.write().await = state.refund_history;
    }

    fn eligibility_cutoff(&self) -> u64 {
        now_unix_secs().saturating_sub(self.config.refund_buffer.as_secs())
    }

    fn is_eligible(&self, slot: &EntrySlot, cutoff: u64) -> bool {
        slot.state == EntryState::Pending
            && slot.entry.timelock <= cutoff
            && self
                .config
                .max_attempts_per_entry
                .is_none_or(|max| slot.attempts < max)
    }

    /// Claim eligible entries by flipping them to Processing under the lock.
    async fn take_eligible(&self) -> Vec<RefundEntry> {
        let cutoff = self.eligibility_cutoff();
        let mut entries = self.entries.write().await;
        let mut eligible = Vec::new();
        for slot in entries.values_mut() {
            if self.is_eligible(slot, cutoff) {
                slot.state = EntryState::Processing;
                slot.attempts += 1;
                eligible.push(slot.entry.clone());
            }
        }
        eligible
    }

    async fn process_entry(&self, entry: RefundEntry) {
        match self.attempt_refund(&entry).await {
            Ok(tx_hash) => {
                log::info!(
                    "refunded HTLC {} on {} in tx {}",
                    entry.htlc_id,
                    entry.chain,
                    tx_hash
                );
                self.finish(entry, true, Some(tx_hash), None).await;
            }
            Err(err) => {
                log::warn!(
                    "refund of HTLC {} on {} failed: {}",
                    entry.htlc_id,
                    entry.chain,
                    err
                );
                if let Some(listener) = &self.on_error {
                    listener(&err, &format!("refund {}", entry.htlc_id));
                }
                self.finish(entry, false, None, Some(err.to_string())).await;
            }
        }
    }

    /// Build, sign, and broadcast the refund, retrying transient failures.
    async fn attempt_refund(&self, entry: &RefundEntry) -> Result<String> {
        let adapter = self.registry.get(entry.chain)?;
        let key = self.keystore.get(entry.chain)?;
        let adapter = adapter.as_ref();
        let htlc_id = entry.htlc_id.as_str();
        let outcome = with_retry(&self.config.retry, || async move {
            let unsigned = adapter.refund_htlc(htlc_id).await?;
            let signed = adapter.sign_transaction(unsigned, key).await?;
            adapter.broadcast_transaction(signed).await
        })
        .await?;
        Ok(outcome.value)
    }

    /// Record the outcome: successful entries leave the queue, failed ones
    /// go back to Pending for the next pass.
    async fn finish(
        &self,
        entry: RefundEntry,
        success: bool,
        tx_hash: Option<String>,
        error: Option<String>,
    ) {
        self.total_attempts.fetch_add(1, Ordering::SeqCst);
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.entries.write().await.remove(&entry.htlc_id);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.write().await;
            if let Some(slot) = entries.get_mut(&entry.htlc_id) {
                slot.state = EntryState::Pending;
            }
        }
        if let Some(listener) = &self.on_refund_attempt {
            listener(&entry.swap_id, entry.chain, success);
        }
        self.history.write().await.push(RefundRecord {
            htlc_id: entry.htlc_id,
            chain: entry.chain,
            success,
            tx_hash,
            error,
            timestamp: now_unix_ms(),
        });
    }
}
