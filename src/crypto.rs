//! Cryptographic primitives for swap orchestration.
//!
//! Hashlocks are SHA-256 only: every chain this crate coordinates
//! (and every HTLC implementation worth interoperating with) verifies
//! SHA-256 preimages. Secrets come from the OS CSPRNG.

use crate::error::{Error, Result};
use crate::types::{Chain, StealthAddress, now_unix_ms};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Tag for stealth viewing-key derivation.
const VIEW_TAG: &str = "omniswap/stealth/view";
/// Tag for stealth spending-key-hash derivation.
const SPEND_TAG: &str = "omniswap/stealth/spend";
/// Tag for stealth one-time address derivation.
const ADDRESS_TAG: &str = "omniswap/stealth/address";

/// Generate a 32-byte secret from the OS CSPRNG.
pub fn generate_secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    secret
}

/// SHA-256 hashlock over a secret.
pub fn hash_secret(secret: &[u8; 32]) -> [u8; 32] {
    let digest = Sha256::digest(secret);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// BIP340-style tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`.
fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// New swap id: `swap_<unix-ms>_<16 hex chars>`.
pub fn generate_swap_id() -> String {
    let mut suffix = [0u8; 8];
    OsRng.fill_bytes(&mut suffix);
    format!("swap_{}_{}", now_unix_ms(), hex::encode(suffix))
}

/// New intent id: `intent_<swap-id>_<unix-ms>`.
pub fn generate_intent_id() -> String {
    format!("intent_{}_{}", generate_swap_id(), now_unix_ms())
}

/// New route id: `route_<unix-ms>_<random suffix>`.
pub fn generate_route_id() -> String {
    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    format!("route_{}_{}", now_unix_ms(), hex::encode(suffix))
}

/// Deterministic HTLC id: `htlc_<chain>_<hashlock prefix>`.
///
/// Both the coordinator and the chain adapter can derive it independently
/// from the hashlock, so no id needs to travel out-of-band.
pub fn htlc_id(chain: Chain, hashlock: &[u8; 32]) -> String {
    format!("htlc_{}_{}", chain, hex::encode(&hashlock[..8]))
}

/// Derives one-time addresses that cannot be linked to the base address.
///
/// Each call draws a fresh ephemeral key; viewing and spending material are
/// tagged hashes over the base address and the ephemeral key, rendered in
/// the target chain's address format.
#[derive(Debug, Clone, Copy, Default)]
pub struct StealthAddressGenerator;

impl StealthAddressGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a one-time address for `chain` derived from `base_address`.
    pub fn generate(&self, chain: Chain, base_address: &str) -> Result<StealthAddress> {
        if base_address.is_empty() {
            return Err(Error::StealthAddressGenerationFailed(format!(
                "empty base address for chain {chain}"
            )));
        }

        let mut ephemeral = [0u8; 32];
        OsRng.fill_bytes(&mut ephemeral);
        let ephemeral_public = hash_secret(&ephemeral);

        let mut material = Vec::with_capacity(base_address.len() + 32);
        material.extend_from_slice(base_address.as_bytes());
        material.extend_from_slice(&ephemeral_public);

        let viewing_key = tagged_hash(VIEW_TAG, &material);
        let spending_key_hash = tagged_hash(SPEND_TAG, &material);
        let address_bytes = tagged_hash(ADDRESS_TAG, &material);

        Ok(StealthAddress {
            chain,
            address: render_address(chain, &address_bytes),
            viewing_key: hex::encode(viewing_key),
            spending_key_hash: hex::encode(spending_key_hash),
            ephemeral_public_key: hex::encode(ephemeral_public),
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

/// Render raw address bytes in the chain's wire format.
fn render_address(chain: Chain, bytes: &[u8; 32]) -> String {
    match chain {
        Chain::Zcash => format!("zs1{}", hex::encode(&bytes[..20])),
        Chain::Osmosis => format!("osmo1{}", hex::encode(&bytes[..20])),
        Chain::Fhenix | Chain::Aztec => format!("0x{}", hex::encode(&bytes[..20])),
        Chain::Mina => format!("B62q{}", hex::encode(&bytes[..28])),
        Chain::Miden => format!("0x{}", hex::encode(bytes)),
    }
}
