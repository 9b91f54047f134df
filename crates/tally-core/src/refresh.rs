//! Refresh coordination (circuit breaker)
//!
//! Guards any operation that talks to an external provider: at most one
//! refresh runs at a time, sessions are capped to a refresh budget, and
//! back-to-back refreshes are held apart by a cooldown. The coordinator
//! knows nothing about date ranges or providers; it wraps an arbitrary
//! async operation.
//!
//! Instances are constructible and injectable so tests can build fresh
//! ones; production wiring typically shares one per process. State is
//! per-process only — running multiple processes against the same cache
//! requires an external lock, which this module does not provide.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Bounds on refresh frequency
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum non-forced refreshes per session
    pub max_refreshes_per_session: u32,
    /// Minimum spacing between refresh starts
    pub min_refresh_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_refreshes_per_session: 25,
            min_refresh_interval: Duration::from_secs(2),
        }
    }
}

impl RefreshConfig {
    /// Build from environment, falling back to defaults
    ///
    /// - `TALLY_MAX_REFRESHES`: session refresh budget
    /// - `TALLY_REFRESH_COOLDOWN_MS`: minimum spacing between refreshes
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_refreshes_per_session = std::env::var("TALLY_MAX_REFRESHES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_refreshes_per_session);
        let min_refresh_interval = std::env::var("TALLY_REFRESH_COOLDOWN_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_refresh_interval);
        Self {
            max_refreshes_per_session,
            min_refresh_interval,
        }
    }
}

/// What to do when a refresh is requested while one is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Refuse the second caller with a throttle error
    Reject,
    /// Wait for the in-flight refresh, then run, returning this caller's
    /// own result
    Queue,
}

/// Pure verdict of a refresh admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    Allowed,
    AlreadyRefreshing,
    LimitReached { count: u32, max: u32 },
    CoolingDown { remaining: Duration },
}

impl RefreshDecision {
    pub fn allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    fn deny_message(&self) -> String {
        match self {
            Self::Allowed => unreachable!("allowed decision has no denial message"),
            Self::AlreadyRefreshing => "refresh already in progress".to_string(),
            Self::LimitReached { count, max } => {
                format!("session refresh limit reached ({} of {})", count, max)
            }
            Self::CoolingDown { remaining } => {
                format!("cooling down, retry in {}ms", remaining.as_millis())
            }
        }
    }
}

/// Snapshot of coordinator counters for status displays
#[derive(Debug, Clone)]
pub struct RefreshStats {
    pub is_refreshing: bool,
    pub refresh_count: u32,
    pub consecutive_errors: u32,
    /// Time since the last refresh started, if any
    pub since_last_refresh: Option<Duration>,
}

/// Internal mutable state under a single lock so transitions stay atomic
#[derive(Debug)]
struct CoordinatorState {
    is_refreshing: bool,
    refresh_count: u32,
    last_refresh_start: Option<Instant>,
    consecutive_errors: u32,
}

impl CoordinatorState {
    fn new() -> Self {
        Self {
            is_refreshing: false,
            refresh_count: 0,
            last_refresh_start: None,
            consecutive_errors: 0,
        }
    }
}

/// Mutual-exclusion and rate-limit gate for provider refreshes
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<RwLock<CoordinatorState>>,
    /// Held across an in-flight operation; Queue mode waits on it, Reject
    /// mode try-locks it, so the two modes exclude each other too.
    run_lock: Arc<Mutex<()>>,
    config: RefreshConfig,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new(RefreshConfig::default())
    }
}

impl RefreshCoordinator {
    pub fn new(config: RefreshConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CoordinatorState::new())),
            run_lock: Arc::new(Mutex::new(())),
            config,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Side-effect-free admission check
    ///
    /// `force` bypasses the session limit and the cooldown, but never an
    /// in-flight refresh.
    pub async fn can_refresh(&self, force: bool) -> RefreshDecision {
        let state = self.inner.read().await;
        Self::decide(&state, &self.config, force)
    }

    fn decide(state: &CoordinatorState, config: &RefreshConfig, force: bool) -> RefreshDecision {
        if state.is_refreshing {
            return RefreshDecision::AlreadyRefreshing;
        }
        if force {
            return RefreshDecision::Allowed;
        }
        if state.refresh_count >= config.max_refreshes_per_session {
            return RefreshDecision::LimitReached {
                count: state.refresh_count,
                max: config.max_refreshes_per_session,
            };
        }
        if let Some(last) = state.last_refresh_start {
            let elapsed = last.elapsed();
            if elapsed < config.min_refresh_interval {
                return RefreshDecision::CoolingDown {
                    remaining: config.min_refresh_interval - elapsed,
                };
            }
        }
        RefreshDecision::Allowed
    }

    /// Check and transition to refreshing in one atomic step
    ///
    /// Fails with `Error::Throttled` when admission is denied.
    pub async fn try_start(&self, force: bool) -> Result<()> {
        let mut state = self.inner.write().await;
        let decision = Self::decide(&state, &self.config, force);
        if !decision.allowed() {
            warn!(?decision, force, "refresh denied");
            return Err(Error::Throttled(decision.deny_message()));
        }

        state.is_refreshing = true;
        state.refresh_count += 1;
        state.last_refresh_start = Some(Instant::now());
        debug!(refresh_count = state.refresh_count, force, "refresh started");
        Ok(())
    }

    /// Mark the in-flight refresh finished
    ///
    /// Success zeroes the consecutive error count; failure increments it.
    /// Failures are recorded but do not block future refreshes beyond the
    /// normal cooldown. Callers wrapping a timeout must call this on the
    /// timeout path too, or the coordinator stays refreshing until
    /// [`reset`](Self::reset).
    pub async fn complete(&self, success: bool) {
        let mut state = self.inner.write().await;
        state.is_refreshing = false;
        if success {
            state.consecutive_errors = 0;
        } else {
            state.consecutive_errors += 1;
            warn!(
                consecutive_errors = state.consecutive_errors,
                "refresh finished with error"
            );
        }
    }

    /// Operator escape hatch: force idle and zero every counter
    pub async fn reset(&self) {
        let mut state = self.inner.write().await;
        *state = CoordinatorState::new();
        info!("refresh coordinator reset");
    }

    /// Snapshot current counters
    pub async fn stats(&self) -> RefreshStats {
        let state = self.inner.read().await;
        RefreshStats {
            is_refreshing: state.is_refreshing,
            refresh_count: state.refresh_count,
            consecutive_errors: state.consecutive_errors,
            since_last_refresh: state.last_refresh_start.map(|t| t.elapsed()),
        }
    }

    /// Run `operation` under the coordinator's guard
    ///
    /// Reject mode refuses immediately when a refresh is in flight; Queue
    /// mode waits its turn. Either way the operation then passes the
    /// admission check (with its own `force` flag — queuing grants
    /// ordering, not exemption) before running, and its outcome is
    /// recorded.
    pub async fn run<T, F>(&self, mode: ConcurrencyMode, force: bool, operation: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let _slot = match mode {
            ConcurrencyMode::Reject => match self.run_lock.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    warn!("refresh rejected, another refresh is in flight");
                    return Err(Error::Throttled("refresh already in progress".to_string()));
                }
            },
            ConcurrencyMode::Queue => self.run_lock.lock().await,
        };

        self.try_start(force).await?;
        let result = operation.await;
        self.complete(result.is_ok()).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unlimited() -> RefreshConfig {
        RefreshConfig {
            max_refreshes_per_session: u32::MAX,
            min_refresh_interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_session_limit_and_force_bypass() {
        let coordinator = RefreshCoordinator::new(RefreshConfig {
            max_refreshes_per_session: 3,
            min_refresh_interval: Duration::ZERO,
        });

        for _ in 0..3 {
            coordinator
                .run(ConcurrencyMode::Reject, false, async { Ok(()) })
                .await
                .unwrap();
        }

        // Fourth non-forced attempt is over budget.
        let decision = coordinator.can_refresh(false).await;
        assert_eq!(
            decision,
            RefreshDecision::LimitReached { count: 3, max: 3 }
        );
        let err = coordinator
            .run(ConcurrencyMode::Reject, false, async { Ok(()) })
            .await
            .unwrap_err();
        assert!(err.is_throttled());

        // Forced refresh still proceeds.
        assert!(coordinator.can_refresh(true).await.allowed());
        coordinator
            .run(ConcurrencyMode::Reject, true, async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cooldown_blocks_until_interval_passes() {
        let coordinator = RefreshCoordinator::new(RefreshConfig {
            max_refreshes_per_session: u32::MAX,
            min_refresh_interval: Duration::from_secs(60),
        });

        coordinator
            .run(ConcurrencyMode::Reject, false, async { Ok(()) })
            .await
            .unwrap();

        match coordinator.can_refresh(false).await {
            RefreshDecision::CoolingDown { remaining } => {
                assert!(remaining <= Duration::from_secs(60));
            }
            other => panic!("expected cooldown, got {:?}", other),
        }

        // Force bypasses the cooldown.
        coordinator
            .run(ConcurrencyMode::Reject, true, async { Ok(()) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reject_mode_admits_exactly_one() {
        let coordinator = RefreshCoordinator::new(unlimited());
        let executed = Arc::new(AtomicU32::new(0));

        let (first, second) = tokio::join!(
            coordinator.run(ConcurrencyMode::Reject, false, {
                let executed = executed.clone();
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(())
                }
            }),
            coordinator.run(ConcurrencyMode::Reject, false, {
                let executed = executed.clone();
                async move {
                    executed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent caller may refresh");
        assert_eq!(executed.load(Ordering::SeqCst), 1);
        assert!([first, second]
            .into_iter()
            .find_map(|r| r.err())
            .unwrap()
            .is_throttled());
    }

    #[tokio::test]
    async fn test_queue_mode_serializes_both_callers() {
        let coordinator = RefreshCoordinator::new(unlimited());
        let in_flight = Arc::new(AtomicU32::new(0));
        let overlapped = Arc::new(AtomicU32::new(0));

        let op = |in_flight: Arc<AtomicU32>, overlapped: Arc<AtomicU32>| async move {
            if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                overlapped.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        };

        let (first, second) = tokio::join!(
            coordinator.run(
                ConcurrencyMode::Queue,
                false,
                op(in_flight.clone(), overlapped.clone())
            ),
            coordinator.run(
                ConcurrencyMode::Queue,
                false,
                op(in_flight.clone(), overlapped.clone())
            ),
        );

        first.unwrap();
        second.unwrap();
        assert_eq!(overlapped.load(Ordering::SeqCst), 0, "queued refreshes must not overlap");

        let stats = coordinator.stats().await;
        assert_eq!(stats.refresh_count, 2);
    }

    #[tokio::test]
    async fn test_failure_counting_and_reset() {
        let coordinator = RefreshCoordinator::new(unlimited());

        for expected in 1..=2u32 {
            let result: Result<()> = coordinator
                .run(ConcurrencyMode::Reject, false, async {
                    Err(Error::Provider("boom".to_string()))
                })
                .await;
            assert!(matches!(result, Err(Error::Provider(_))));
            assert_eq!(coordinator.stats().await.consecutive_errors, expected);
        }

        // A failure does not block the next attempt.
        coordinator
            .run(ConcurrencyMode::Reject, false, async { Ok(()) })
            .await
            .unwrap();
        let stats = coordinator.stats().await;
        assert_eq!(stats.consecutive_errors, 0);
        assert_eq!(stats.refresh_count, 3);

        coordinator.reset().await;
        let stats = coordinator.stats().await;
        assert_eq!(stats.refresh_count, 0);
        assert_eq!(stats.consecutive_errors, 0);
        assert!(!stats.is_refreshing);
        assert!(stats.since_last_refresh.is_none());
    }

    #[tokio::test]
    async fn test_stuck_refresh_recovers_via_reset() {
        let coordinator = RefreshCoordinator::new(unlimited());

        // Simulate an operation that never called complete().
        coordinator.try_start(false).await.unwrap();
        assert_eq!(
            coordinator.can_refresh(true).await,
            RefreshDecision::AlreadyRefreshing
        );

        coordinator.reset().await;
        assert!(coordinator.can_refresh(false).await.allowed());
    }

    #[tokio::test]
    async fn test_can_refresh_is_pure() {
        let coordinator = RefreshCoordinator::new(unlimited());

        for _ in 0..5 {
            assert!(coordinator.can_refresh(false).await.allowed());
        }
        let stats = coordinator.stats().await;
        assert_eq!(stats.refresh_count, 0);
        assert!(!stats.is_refreshing);
    }
}
