//! Randomized HTLC timelock generation.
//!
//! Fixed timelocks make swap legs trivially correlatable: every source lock
//! expires exactly N hours after its destination lock. Drawing each timelock
//! from a clamped log-normal distribution keeps expiries unpredictable while
//! guaranteeing the source window always exceeds the destination window.

use crate::types::now_unix_secs;
use rand::Rng;
use rand::rngs::OsRng;
use std::time::Duration;

/// Parameters for one leg's timelock distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelockParams {
    pub min: Duration,
    pub median: Duration,
    pub max: Duration,
    /// Log-space standard deviation.
    pub sigma: f64,
}

impl TimelockParams {
    /// Source leg: 30 minutes to 4 hours, median 90 minutes.
    pub const SOURCE: TimelockParams = TimelockParams {
        min: Duration::from_secs(30 * 60),
        median: Duration::from_secs(90 * 60),
        max: Duration::from_secs(4 * 60 * 60),
        sigma: 0.45,
    };

    /// Destination leg: 15 to 90 minutes, median 45 minutes.
    pub const DEST: TimelockParams = TimelockParams {
        min: Duration::from_secs(15 * 60),
        median: Duration::from_secs(45 * 60),
        max: Duration::from_secs(90 * 60),
        sigma: 0.35,
    };
}

/// Sample a future unix-second timestamp: `now + offset` with the offset
/// drawn log-normally and clamped to `[min, max]`.
pub fn sample_timelock(params: &TimelockParams) -> u64 {
    now_unix_secs() + sample_offset(params)
}

/// Sample just the offset in seconds. Always within `[min, max]`.
pub fn sample_offset(params: &TimelockParams) -> u64 {
    let z = standard_normal();
    let value = params.median.as_secs_f64() * (params.sigma * z).exp();
    value.clamp(params.min.as_secs_f64(), params.max.as_secs_f64()) as u64
}

/// Standard normal draw via Box-Muller over the OS CSPRNG.
fn standard_normal() -> f64 {
    // gen() yields [0, 1); shift to (0, 1] so ln is finite.
    let u1: f64 = 1.0 - OsRng.r#gen::<f64>();
    let u2: f64 = OsRng.r#gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
