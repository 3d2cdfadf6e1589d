//! Resilience primitives: retry with backoff, timeouts, circuit breaking,
//! and bounded-concurrency batching.
//!
//! Adapter calls cross chain RPC boundaries and fail for transient reasons;
//! everything that talks to an adapter goes through these wrappers.

use crate::error::{Error, Result};
use futures::StreamExt;
use rand::Rng;
use rand::rngs::OsRng;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Backoff schedule for retried operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Scale each delay by uniform(0.5, 1.0) to avoid thundering herds.
    pub jitter: bool,
    /// Per-attempt deadline, applied around each invocation.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// 3 attempts starting at 500ms.
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        }
    }

    /// 5 attempts starting at 1s.
    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        }
    }

    /// 10 attempts starting at 500ms.
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        }
    }

    /// 5 attempts starting at 5s, for slow chains.
    pub fn patient() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Deterministic delay after a failed attempt `n` (1-based):
    /// `min(initial * multiplier^(n-1), max)`, before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(exp);
        delay.min(self.max_delay)
    }
}

/// Successful result plus how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub value: T,
    pub attempts: u32,
}

/// Retry `op` per `policy`, retrying only errors the taxonomy marks
/// transient ([`Error::is_retryable`]).
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(policy, |err, _| err.is_retryable(), |_, _, _| {}, op).await
}

/// Retry with a custom predicate and an observer invoked before each sleep.
///
/// `should_retry(err, attempt)` decides whether to continue; `on_retry`
/// receives `(attempt, delay, err)` for the attempt that just failed.
pub async fn with_retry_if<T, F, Fut, P, O>(
    policy: &RetryPolicy,
    should_retry: P,
    on_retry: O,
    mut op: F,
) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error, u32) -> bool,
    O: Fn(u32, Duration, &Error),
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = match policy.attempt_timeout {
            Some(limit) => with_timeout(limit, op()).await,
            None => op().await,
        };
        let err = match result {
            Ok(value) => return Ok(RetryOutcome { value, attempts: attempt }),
            Err(err) => err,
        };
        if attempt >= policy.max_attempts || !should_retry(&err, attempt) {
            return Err(err);
        }
        let mut delay = policy.delay_for_attempt(attempt);
        if policy.jitter {
            delay = delay.mul_f64(0.5 + OsRng.r#gen::<f64>() * 0.5);
        }
        log::debug!(
            "attempt {}/{} failed ({}), retrying in {:?}",
            attempt,
            policy.max_attempts,
            err,
            delay
        );
        on_retry(attempt, delay, &err);
        tokio::time::sleep(delay).await;
    }
}

/// Race a future against a deadline; expiry yields [`Error::Timeout`].
pub async fn with_timeout<T, Fut>(limit: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Fails fast once a dependency has failed `failure_threshold` times in a
/// row; after `reset_timeout` a single probe call decides whether to close
/// again.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
    on_state_change: Option<Box<dyn Fn(CircuitState) + Send + Sync>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            on_state_change: None,
        }
    }

    /// Register a callback invoked on every state transition.
    pub fn with_state_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Box::new(listener));
        self
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock poisoned").state
    }

    fn transition(&self, inner: &mut BreakerInner, next: CircuitState) {
        if inner.state != next {
            log::info!("circuit breaker {:?} -> {:?}", inner.state, next);
            inner.state = next;
            if let Some(listener) = &self.on_state_change {
                listener(next);
            }
        }
    }

    /// Run `op` through the breaker. While Open, fails fast with
    /// [`Error::CircuitOpen`] without invoking `op`.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        {
            let mut inner = self.inner.lock().expect("breaker lock poisoned");
            if inner.state == CircuitState::Open {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed < self.reset_timeout {
                    return Err(Error::CircuitOpen);
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        match op().await {
            Ok(value) => {
                let mut inner = self.inner.lock().expect("breaker lock poisoned");
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
                Ok(value)
            }
            Err(err) => {
                let mut inner = self.inner.lock().expect("breaker lock poisoned");
                match inner.state {
                    CircuitState::HalfOpen => {
                        inner.opened_at = Some(Instant::now());
                        self.transition(&mut inner, CircuitState::Open);
                    }
                    CircuitState::Closed => {
                        inner.consecutive_failures += 1;
                        if inner.consecutive_failures >= self.failure_threshold {
                            inner.opened_at = Some(Instant::now());
                            self.transition(&mut inner, CircuitState::Open);
                        }
                    }
                    CircuitState::Open => {
                        inner.opened_at = Some(Instant::now());
                    }
                }
                Err(err)
            }
        }
    }
}

/// Options for [`batch_with_retry`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    pub stop_on_error: bool,
    pub policy: RetryPolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            stop_on_error: false,
            policy: RetryPolicy::standard(),
        }
    }
}

/// Run `op` over `items` with bounded concurrency, retrying each item per
/// the policy. The result vector is index-aligned with the input; `None`
/// marks items never attempted because `stop_on_error` fired first.
pub async fn batch_with_retry<I, T, F, Fut>(
    items: Vec<I>,
    options: &BatchOptions,
    op: F,
) -> Vec<Option<Result<T>>>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let op = &op;
    let policy = &options.policy;
    let total = items.len();
    let mut results: Vec<Option<Result<T>>> = (0..total).map(|_| None).collect();

    let mut stream = futures::stream::iter(items.into_iter().enumerate().map(|(index, item)| {
        async move {
            let result = with_retry(policy, || op(item.clone()))
                .await
                .map(|outcome| outcome.value);
            (index, result)
        }
    }))
    .buffer_unordered(options.concurrency.max(1));

    while let Some((index, result)) = stream.next().await {
        let failed = result.is_err();
        results[index] = Some(result);
        if failed && options.stop_on_error {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_schedule_is_capped_exponential() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: None,
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(3));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn retries_until_success_and_counts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::fast()
        };
        let calls_in = calls.clone();
        let outcome = with_retry(&policy, move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Network("flaky".into()))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let err = with_retry(&RetryPolicy::fast(), move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::InvalidIntent("bad".into()))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), 4003);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn observer_sees_exact_delays_without_jitter() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: None,
        };
        let observed_in = observed.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let outcome = with_retry_if(
            &policy,
            |_, _| true,
            move |_, delay, _| observed_in.lock().unwrap().push(delay),
            move || {
                let calls = calls_in.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(Error::Network("flaky".into()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.attempts, 3);
        let delays = observed.lock().unwrap().clone();
        assert_eq!(
            delays,
            vec![Duration::from_millis(5), Duration::from_millis(10)]
        );
    }

    #[tokio::test]
    async fn jittered_delays_stay_in_half_to_full_band() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: true,
            attempt_timeout: None,
        };
        for _ in 0..10 {
            let observed = Arc::new(Mutex::new(Vec::new()));
            let observed_in = observed.clone();
            let _ = with_retry_if(
                &policy,
                |_, _| true,
                move |_, delay, _| observed_in.lock().unwrap().push(delay),
                || async { Err::<(), _>(Error::Network("down".into())) },
            )
            .await;
            for delay in observed.lock().unwrap().iter() {
                assert!(*delay >= Duration::from_millis(50));
                assert!(*delay <= Duration::from_millis(100));
            }
        }
    }

    #[tokio::test]
    async fn timeout_maps_to_timeout_error() {
        let err = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(10)));
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_fails_fast() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            let _ = breaker
                .call(|| async { Err::<(), _>(Error::Network("down".into())) })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // Fourth call must fail fast without invoking the operation.
        let invoked = Arc::new(AtomicU32::new(0));
        let invoked_in = invoked.clone();
        let err = breaker
            .call(move || {
                let invoked = invoked_in.clone();
                async move {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CircuitOpen));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn breaker_half_open_probe_closes_on_success() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let transitions_in = transitions.clone();
        let breaker = CircuitBreaker::new(2, Duration::from_millis(20))
            .with_state_listener(move |state| transitions_in.lock().unwrap().push(state));

        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>(Error::Network("down".into())) })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let seen = transitions.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                CircuitState::Open,
                CircuitState::HalfOpen,
                CircuitState::Closed
            ]
        );
    }

    #[tokio::test]
    async fn breaker_half_open_probe_reopens_on_failure() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Network("down".into())) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = breaker
            .call(|| async { Err::<(), _>(Error::Network("still down".into())) })
            .await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn batch_preserves_input_order_and_collects_errors() {
        let options = BatchOptions {
            concurrency: 2,
            stop_on_error: false,
            policy: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::fast()
            },
        };
        let results = batch_with_retry(vec![1u32, 2, 3, 4], &options, |n| async move {
            if n % 2 == 0 {
                Err(Error::InvalidIntent(format!("even {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;
        assert_eq!(results.len(), 4);
        assert_eq!(*results[0].as_ref().unwrap().as_ref().unwrap(), 10);
        assert!(results[1].as_ref().unwrap().is_err());
        assert_eq!(*results[2].as_ref().unwrap().as_ref().unwrap(), 30);
        assert!(results[3].as_ref().unwrap().is_err());
    }
}
