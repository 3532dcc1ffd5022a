//! Device-flow state machine: initiation, poll scheduling, cancellation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::outcome::{self, PollOutcome, GENERIC_FAILURE_MESSAGE};
use crate::session::DeviceSession;
use crate::transport::DeviceFlowTransport;

/// Host callback invoked exactly once when authentication completes,
/// before the controller transitions to [`ControllerState::Succeeded`].
/// Hosts typically refresh their cached "is authenticated" flag here.
pub type OnAuthenticatedFn = Arc<dyn Fn() + Send + Sync>;

/// Host callback invoked whenever a new session publishes its user code.
/// This is the subscription point for
/// [`ClipboardRelay`](crate::clipboard::ClipboardRelay).
pub type OnCodeFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Externally observable controller state.
///
/// Invariant: a pending poll task exists iff the state is
/// `AwaitingAuthorization` and no terminal outcome has been applied for
/// that session.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerState {
    /// No session; ready to start.
    Idle,
    /// Initiation call in flight; no session exists yet.
    Initiating,
    /// Session active; polling on the server-dictated cadence.
    AwaitingAuthorization {
        session: DeviceSession,
        last_error: Option<String>,
    },
    /// Terminal failure. Fully recoverable via [`DeviceFlowController::start`].
    Failed { message: String },
    /// Authentication completed.
    Succeeded,
}

struct Inner {
    /// Bumped by every `start()` and `cancel()`. A poll or initiation result
    /// captured under an older generation is discarded, never applied.
    generation: u64,
    session: Option<DeviceSession>,
    /// Single-slot pending timer: the self-rescheduling poll task. Always
    /// aborted before being replaced.
    poll_task: Option<JoinHandle<()>>,
}

/// Lock `Inner`, recovering the guard if a panicking holder poisoned it.
/// Nothing awaits while holding this lock, so it is never contended across
/// suspension points and `Drop` can always reach the pending timer.
fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs exactly one OAuth device-flow session at a time, end-to-end.
///
/// All public methods are `&self`; interior mutability via `Arc<Mutex<_>>`
/// and a `watch` channel lets the hosting wizard step share the controller
/// with its render loop. Errors never escape: every failure becomes
/// [`ControllerState`] data.
///
/// # Example
///
/// ```ignore
/// let controller = DeviceFlowController::new(transport)
///     .with_on_authenticated(Arc::new(|| config.refresh_github()));
/// controller.start().await;
/// // ... wizard step unmounts:
/// controller.cancel();
/// ```
pub struct DeviceFlowController {
    transport: Arc<dyn DeviceFlowTransport>,
    on_authenticated: Option<OnAuthenticatedFn>,
    on_code: Option<OnCodeFn>,
    inner: Arc<Mutex<Inner>>,
    state_tx: watch::Sender<ControllerState>,
    state_rx: watch::Receiver<ControllerState>,
}

impl DeviceFlowController {
    pub fn new(transport: Arc<dyn DeviceFlowTransport>) -> Self {
        let (state_tx, state_rx) = watch::channel(ControllerState::Idle);
        Self {
            transport,
            on_authenticated: None,
            on_code: None,
            inner: Arc::new(Mutex::new(Inner {
                generation: 0,
                session: None,
                poll_task: None,
            })),
            state_tx,
            state_rx,
        }
    }

    /// Set the callback invoked once on successful authentication.
    pub fn with_on_authenticated(mut self, callback: OnAuthenticatedFn) -> Self {
        self.on_authenticated = Some(callback);
        self
    }

    /// Set the callback invoked when a new session's user code is published.
    pub fn with_on_code(mut self, callback: OnCodeFn) -> Self {
        self.on_code = Some(callback);
        self
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes via a [`watch::Receiver`].
    ///
    /// Callers can `.changed().await` on the returned receiver to be
    /// notified of every transition.
    pub fn watch_state(&self) -> watch::Receiver<ControllerState> {
        self.state_rx.clone()
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<DeviceSession> {
        lock(&self.inner).session.clone()
    }

    /// Start a new device-flow session.
    ///
    /// Any active session is superseded first: its pending timer is aborted
    /// and its in-flight results, if any, are discarded when they resolve.
    /// On successful initiation the first poll is scheduled one full
    /// interval out — never immediately (RFC 8628 guidance). On initiation
    /// failure the state becomes [`ControllerState::Failed`] and nothing is
    /// scheduled; the caller may start again.
    pub async fn start(&self) {
        let generation = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            if let Some(task) = inner.poll_task.take() {
                task.abort();
            }
            inner.session = None;
            let _ = self.state_tx.send(ControllerState::Initiating);
            inner.generation
        };

        let result = self.transport.start_device_flow().await;

        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            tracing::debug!(generation, "initiation result discarded: session superseded");
            return;
        }
        match result {
            Ok(session) => {
                tracing::debug!(
                    interval_secs = session.interval_secs,
                    "device flow started; first poll after one full interval"
                );
                inner.session = Some(session.clone());
                inner.poll_task = Some(self.spawn_poll_task(generation, session.clone()));
                if let Some(on_code) = &self.on_code {
                    on_code(&session.user_code);
                }
                let _ = self.state_tx.send(ControllerState::AwaitingAuthorization {
                    session,
                    last_error: None,
                });
            }
            Err(error) => {
                tracing::warn!(error = %error, "device flow initiation failed");
                let _ = self.state_tx.send(ControllerState::Failed {
                    message: error.to_string(),
                });
            }
        }
    }

    /// Cancel the active session, if any.
    ///
    /// Clears the pending poll timer, discards the session, and transitions
    /// to [`ControllerState::Idle`]. Idempotent: calling while idle is a
    /// no-op. A poll call already in flight when `cancel()` runs resolves
    /// into nothing — its session is no longer current.
    pub fn cancel(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        if let Some(task) = inner.poll_task.take() {
            task.abort();
        }
        inner.session = None;
        self.state_tx.send_if_modified(|state| {
            if *state == ControllerState::Idle {
                false
            } else {
                *state = ControllerState::Idle;
                true
            }
        });
    }

    /// Spawn the self-rescheduling poll loop for `session`.
    ///
    /// The task sleeps one interval, polls, classifies, and either applies a
    /// terminal outcome or reschedules itself. Results are applied only while
    /// `generation` is still current.
    fn spawn_poll_task(&self, generation: u64, session: DeviceSession) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let transport = Arc::clone(&self.transport);
        let state_tx = self.state_tx.clone();
        let on_authenticated = self.on_authenticated.clone();

        tokio::spawn(async move {
            let mut session = session;
            loop {
                tokio::time::sleep(Duration::from_secs(session.interval_secs.max(1))).await;

                let outcome = outcome::classify(transport.poll_device_flow(&session).await);

                let mut inner = lock(&inner);
                if inner.generation != generation {
                    tracing::debug!(generation, "poll result discarded: session superseded");
                    return;
                }
                match outcome {
                    PollOutcome::AuthorizationPending => {
                        tracing::debug!(
                            interval_secs = session.interval_secs,
                            "authorization pending; rescheduling"
                        );
                    }
                    PollOutcome::SlowDown => {
                        // Server backoff contract: +5s, permanent for this session.
                        session.interval_secs += 5;
                        tracing::debug!(
                            interval_secs = session.interval_secs,
                            "slow_down received; interval increased"
                        );
                        if let Some(active) = inner.session.as_mut() {
                            active.interval_secs = session.interval_secs;
                        }
                        let _ = state_tx.send(ControllerState::AwaitingAuthorization {
                            session: session.clone(),
                            last_error: None,
                        });
                    }
                    PollOutcome::Success => {
                        inner.session = None;
                        inner.poll_task = None;
                        if let Some(callback) = &on_authenticated {
                            callback();
                        }
                        let _ = state_tx.send(ControllerState::Succeeded);
                        return;
                    }
                    terminal => {
                        let message = terminal
                            .failure_message()
                            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
                        tracing::warn!(%message, "device flow ended with failure");
                        inner.session = None;
                        inner.poll_task = None;
                        let _ = state_tx.send(ControllerState::Failed { message });
                        return;
                    }
                }
            }
        })
    }
}

impl Drop for DeviceFlowController {
    /// Host-level teardown must not leak a timer firing into a dead state.
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if let Some(task) = inner.poll_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::AuthError;
    use crate::session::PollSignal;

    struct FailingTransport;

    #[async_trait]
    impl DeviceFlowTransport for FailingTransport {
        async fn start_device_flow(&self) -> Result<DeviceSession, AuthError> {
            Err(AuthError::Network("connection refused".to_string()))
        }

        async fn poll_device_flow(
            &self,
            _session: &DeviceSession,
        ) -> Result<PollSignal, AuthError> {
            Err(AuthError::Network("connection refused".to_string()))
        }
    }

    fn controller() -> DeviceFlowController {
        DeviceFlowController::new(Arc::new(FailingTransport))
    }

    #[tokio::test]
    async fn new_controller_starts_idle() {
        let controller = controller();
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn cancel_when_idle_is_a_no_op() {
        let controller = controller();
        controller.cancel();
        controller.cancel();
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn cancel_does_not_wake_watchers_when_already_idle() {
        let controller = controller();
        let mut rx = controller.watch_state();
        let _ = rx.borrow_and_update();

        controller.cancel();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn initiation_failure_becomes_failed_state() {
        let controller = controller();
        controller.start().await;
        match controller.state() {
            ControllerState::Failed { message } => {
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        // No session was ever created.
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn failed_state_is_restartable() {
        let controller = controller();
        controller.start().await;
        assert!(matches!(controller.state(), ControllerState::Failed { .. }));
        controller.cancel();
        assert_eq!(controller.state(), ControllerState::Idle);
    }
}
