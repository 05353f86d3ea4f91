//! Reconnect state machine for the relational backend.
//!
//! Every statement goes through [`ConnectionSupervisor::ensure_connected`]
//! first. While a backoff deadline is pending the call fails immediately
//! without touching the backend, so a burst of requests during an outage
//! costs nothing and the backend sees at most one attempt per deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::retry::BackoffPolicy;

/// Opens and probes the backend's connection handle.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Send;

    async fn open(&self) -> Result<Self::Handle, StoreError>;
    async fn is_valid(&self, handle: &mut Self::Handle, timeout: Duration) -> bool;
    async fn close(&self, handle: Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    BackoffWaiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The existing handle passed its liveness probe.
    Reused,
    /// A new handle was opened. `after_outage` is set when more than one
    /// attempt failed before this one succeeded.
    Reconnected { after_outage: bool },
}

pub struct ConnectionSupervisor<C: Connector> {
    connector: C,
    policy: BackoffPolicy,
    clock: Arc<dyn Clock>,
    handle: Option<C::Handle>,
    state: ConnectionState,
    failures: u32,
    next_attempt: Option<Instant>,
}

impl<C: Connector> ConnectionSupervisor<C> {
    pub fn new(connector: C, policy: BackoffPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            connector,
            policy,
            clock,
            handle: None,
            state: ConnectionState::Disconnected,
            failures: 0,
            next_attempt: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed connection attempts since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// The live handle, if the last `ensure_connected` succeeded.
    pub fn handle_mut(&mut self) -> Option<&mut C::Handle> {
        self.handle.as_mut()
    }

    pub async fn ensure_connected(&mut self) -> Result<EnsureOutcome, StoreError> {
        if self.state == ConnectionState::BackoffWaiting {
            if let Some(deadline) = self.next_attempt {
                if self.clock.now() < deadline {
                    return Err(StoreError::BackendUnavailable);
                }
            }
        }

        if let Some(handle) = self.handle.as_mut() {
            if self
                .connector
                .is_valid(handle, self.policy.valid_timeout())
                .await
            {
                self.mark_connected();
                return Ok(EnsureOutcome::Reused);
            }
            tracing::debug!("Connection failed liveness probe, reopening");
            if let Some(stale) = self.handle.take() {
                self.connector.close(stale).await;
            }
        }

        match self.connector.open().await {
            Ok(handle) => {
                let after_outage = self.failures > 1;
                if self.failures > 0 {
                    tracing::info!(
                        "Reconnected to database after {} failed attempts",
                        self.failures
                    );
                }
                self.handle = Some(handle);
                self.mark_connected();
                Ok(EnsureOutcome::Reconnected { after_outage })
            }
            Err(err) => {
                self.failures += 1;
                let delay = self.policy.delay_for(self.failures);
                self.next_attempt = Some(self.clock.now() + delay);
                self.state = ConnectionState::BackoffWaiting;
                if BackoffPolicy::is_loud_failure(self.failures) {
                    tracing::warn!(
                        "Database connection failed (attempt {}), retrying in {:?}: {}",
                        self.failures,
                        delay,
                        err
                    );
                } else {
                    tracing::debug!(
                        "Database connection failed (attempt {}), retrying in {:?}: {}",
                        self.failures,
                        delay,
                        err
                    );
                }
                Err(StoreError::BackendUnavailable)
            }
        }
    }

    /// Close the handle and forget any backoff.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.connector.close(handle).await;
        }
        self.state = ConnectionState::Disconnected;
        self.failures = 0;
        self.next_attempt = None;
    }

    fn mark_connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.failures = 0;
        self.next_attempt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        down: AtomicBool,
        opens: AtomicUsize,
        probes: AtomicUsize,
    }

    struct FakeConnector(Arc<FakeBackend>);

    #[async_trait]
    impl Connector for FakeConnector {
        type Handle = usize;

        async fn open(&self) -> Result<usize, StoreError> {
            let attempt = self.0.opens.fetch_add(1, Ordering::SeqCst);
            if self.0.down.load(Ordering::SeqCst) {
                Err(StoreError::Config("connection refused".to_string()))
            } else {
                Ok(attempt)
            }
        }

        async fn is_valid(&self, _handle: &mut usize, _timeout: Duration) -> bool {
            self.0.probes.fetch_add(1, Ordering::SeqCst);
            !self.0.down.load(Ordering::SeqCst)
        }

        async fn close(&self, _handle: usize) {}
    }

    fn supervisor() -> (
        ConnectionSupervisor<FakeConnector>,
        Arc<FakeBackend>,
        Arc<ManualClock>,
    ) {
        let backend = Arc::new(FakeBackend::default());
        let clock = Arc::new(ManualClock::new());
        let supervisor = ConnectionSupervisor::new(
            FakeConnector(backend.clone()),
            BackoffPolicy::default(),
            clock.clone(),
        );
        (supervisor, backend, clock)
    }

    #[tokio::test]
    async fn test_first_connect_and_reuse() {
        let (mut supervisor, backend, _clock) = supervisor();
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);

        let outcome = supervisor.ensure_connected().await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Reconnected { after_outage: false });
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        let outcome = supervisor.ensure_connected().await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Reused);
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
        assert!(supervisor.handle_mut().is_some());
    }

    #[tokio::test]
    async fn test_backoff_deadline_follows_policy() {
        let (mut supervisor, backend, clock) = supervisor();
        backend.down.store(true, Ordering::SeqCst);
        let policy = BackoffPolicy::default();

        for attempt in 1..=3u32 {
            let before = clock.now();
            assert!(matches!(
                supervisor.ensure_connected().await,
                Err(StoreError::BackendUnavailable)
            ));
            assert_eq!(supervisor.failures(), attempt);
            assert_eq!(supervisor.state(), ConnectionState::BackoffWaiting);
            assert_eq!(
                supervisor.next_attempt(),
                Some(before + policy.delay_for(attempt))
            );
            clock.advance(policy.delay_for(attempt));
        }
        assert_eq!(backend.opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_attempts_before_deadline() {
        let (mut supervisor, backend, clock) = supervisor();
        backend.down.store(true, Ordering::SeqCst);

        assert!(supervisor.ensure_connected().await.is_err());
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);

        for _ in 0..50 {
            assert!(matches!(
                supervisor.ensure_connected().await,
                Err(StoreError::BackendUnavailable)
            ));
        }
        clock.advance(Duration::from_secs(19));
        assert!(supervisor.ensure_connected().await.is_err());
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(1));
        assert!(supervisor.ensure_connected().await.is_err());
        assert_eq!(backend.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dead_handle_is_replaced() {
        let (mut supervisor, backend, clock) = supervisor();
        supervisor.ensure_connected().await.unwrap();

        backend.down.store(true, Ordering::SeqCst);
        assert!(supervisor.ensure_connected().await.is_err());
        assert!(supervisor.handle_mut().is_none());
        assert_eq!(supervisor.failures(), 1);

        backend.down.store(false, Ordering::SeqCst);
        clock.advance(Duration::from_secs(20));
        let outcome = supervisor.ensure_connected().await.unwrap();
        // a single failed attempt is a hiccup, not an outage
        assert_eq!(outcome, EnsureOutcome::Reconnected { after_outage: false });
        assert_eq!(supervisor.failures(), 0);
    }

    #[tokio::test]
    async fn test_reconnect_after_outage_is_flagged() {
        let (mut supervisor, backend, clock) = supervisor();
        backend.down.store(true, Ordering::SeqCst);
        assert!(supervisor.ensure_connected().await.is_err());
        clock.advance(Duration::from_secs(20));
        assert!(supervisor.ensure_connected().await.is_err());
        assert_eq!(supervisor.failures(), 2);

        backend.down.store(false, Ordering::SeqCst);
        clock.advance(Duration::from_secs(40));
        let outcome = supervisor.ensure_connected().await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Reconnected { after_outage: true });
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert_eq!(supervisor.next_attempt(), None);
    }

    #[tokio::test]
    async fn test_shutdown_resets_state() {
        let (mut supervisor, _backend, _clock) = supervisor();
        supervisor.ensure_connected().await.unwrap();
        supervisor.shutdown().await;
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert!(supervisor.handle_mut().is_none());
    }
}
