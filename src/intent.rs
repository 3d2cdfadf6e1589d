//! Validated storage and solver matching for swap intents.

use crate::error::{Error, Result};
use crate::types::{IntentStatus, Solver, SwapIntent, now_unix_ms};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Holds submitted intents until a coordinator takes over execution.
///
/// Operations are serializable per intent id; there is no cross-intent
/// ordering.
#[derive(Default)]
pub struct IntentPool {
    intents: RwLock<HashMap<String, SwapIntent>>,
}

impl IntentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a pending intent, returning its id.
    pub async fn submit(&self, intent: SwapIntent) -> Result<String> {
        validate(&intent)?;
        let id = intent.id.clone();
        log::info!(
            "intent {} submitted: {} {} ({}) -> min {} {} ({})",
            id,
            intent.source.amount,
            intent.source.asset,
            intent.source.chain,
            intent.dest.min_amount,
            intent.dest.asset,
            intent.dest.chain
        );
        self.intents.write().await.insert(id.clone(), intent);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Option<SwapIntent> {
        self.intents.read().await.get(id).cloned()
    }

    /// Cancel an intent unless it already reached a terminal status.
    /// Unknown ids and repeated cancels are no-ops.
    pub async fn cancel(&self, id: &str) {
        let mut intents = self.intents.write().await;
        if let Some(intent) = intents.get_mut(id) {
            if !intent.status.is_terminal() {
                intent.status = IntentStatus::Cancelled;
                intent.updated_at = OffsetDateTime::now_utc();
                log::info!("intent {} cancelled", id);
            }
        }
    }

    /// Pair an intent with a solver if the solver's inventory covers the
    /// minimum destination amount. Returns whether the match happened.
    pub async fn match_solver(&self, id: &str, solver: &Solver) -> bool {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents.get_mut(id) else {
            return false;
        };
        if intent.status != IntentStatus::Pending {
            return false;
        }
        if !solver.has_inventory(&intent.dest.asset, intent.dest.min_amount) {
            log::debug!(
                "solver {} cannot cover {} {} for intent {}",
                solver.id,
                intent.dest.min_amount,
                intent.dest.asset,
                id
            );
            return false;
        }
        intent.status = IntentStatus::Matched;
        intent.updated_at = OffsetDateTime::now_utc();
        log::info!("intent {} matched with solver {}", id, solver.id);
        true
    }

    /// Move an intent to a new status, bumping `updated_at`.
    pub async fn set_status(&self, id: &str, status: IntentStatus) {
        let mut intents = self.intents.write().await;
        if let Some(intent) = intents.get_mut(id) {
            intent.status = status;
            intent.updated_at = OffsetDateTime::now_utc();
        }
    }

    pub async fn list(&self) -> Vec<SwapIntent> {
        self.intents.read().await.values().cloned().collect()
    }

    pub async fn list_by_status(&self, status: IntentStatus) -> Vec<SwapIntent> {
        self.intents
            .read()
            .await
            .values()
            .filter(|intent| intent.status == status)
            .cloned()
            .collect()
    }
}

fn validate(intent: &SwapIntent) -> Result<()> {
    if intent.source.amount == 0 {
        return Err(Error::InvalidIntent("Source amount must be positive".into()));
    }
    if intent.deadline_ms <= now_unix_ms() {
        return Err(Error::InvalidIntent("Deadline must be in the future".into()));
    }
    if intent.max_slippage <= 0.0 || intent.max_slippage >= 1.0 {
        return Err(Error::InvalidIntent(
            "Slippage must be between 0 and 1".into(),
        ));
    }
    Ok(())
}
