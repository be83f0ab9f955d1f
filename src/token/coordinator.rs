//! Refresh Coordinator
//!
//! Owns the session lifecycle and guarantees at most one refresh exchange is
//! in flight at any moment. Callers arriving while a refresh runs either join
//! its outcome ([`RefreshCoordinator::refresh`]) or park in the
//! [`RequestQueue`] ([`RefreshCoordinator::enqueue_if_refreshing`]).
//!
//! A refresh cycle ends in one of three ways:
//!
//! - **Success**: the new pair is committed atomically, the retry counter is
//!   reset and parked calls are replayed, started in submission order.
//! - **Rejection** (the backend refused the refresh token): the session is
//!   cleared immediately and parked calls fail with `TOKEN_EXPIRED`.
//! - **Transient failure**: the session is kept and parked calls fail with the
//!   same error, until the retry budget is spent and the session is cleared.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::core::{HttpTransport, TokenCodec};
use crate::error::AuthError;
use crate::flows::{is_refresh_rejection, RefreshExchange};
use crate::telemetry::{AuthMetrics, SessionEvent, SessionEventBus};
use crate::token::queue::{DrainBatch, QueuedCallHandle, Replay, RequestQueue};
use crate::token::CredentialStore;
use crate::types::{
    AuthClientConfig, Session, SessionState, StoredCredentials, TokenClaims, TokenPair,
};

type SharedRefresh = Shared<BoxFuture<'static, Result<(), AuthError>>>;

const REASON_REJECTED: &str = "refresh_rejected";
const REASON_EXHAUSTED: &str = "refresh_retries_exhausted";
const REASON_MISSING: &str = "missing_refresh_token";

/// Outcome of offering a call to the queue.
pub enum Admission {
    /// A refresh is running; the handle resolves once it settles.
    Queued(QueuedCallHandle),
    /// No refresh is running; the replay is handed back untouched.
    NotRefreshing(Replay),
}

struct CycleState {
    session: SessionState,
    /// Consecutive failed refresh attempts.
    attempts: u32,
    generation: u64,
    /// Bumped whenever a login commits a new record.
    epoch: u64,
    in_flight: Option<(u64, SharedRefresh)>,
}

impl CycleState {
    fn is_current(&self, generation: u64) -> bool {
        matches!(&self.in_flight, Some((current, _)) if *current == generation)
    }
}

enum Start {
    Join(SharedRefresh),
    Denied(AuthError),
}

struct Inner<T: HttpTransport, S: CredentialStore> {
    config: Arc<AuthClientConfig>,
    exchange: RefreshExchange<T>,
    store: Arc<S>,
    queue: RequestQueue,
    events: SessionEventBus,
    metrics: Arc<dyn AuthMetrics>,
    state: Mutex<CycleState>,
    /// Serializes credential commits against session teardown.
    commit_lock: tokio::sync::Mutex<()>,
}

/// Single-flight owner of the session credentials.
pub struct RefreshCoordinator<T: HttpTransport + 'static, S: CredentialStore + 'static> {
    inner: Arc<Inner<T, S>>,
}

impl<T: HttpTransport + 'static, S: CredentialStore + 'static> Clone for RefreshCoordinator<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: HttpTransport + 'static, S: CredentialStore + 'static> RefreshCoordinator<T, S> {
    /// Create a coordinator with no session. Call [`restore`](Self::restore)
    /// to pick up persisted credentials.
    pub fn new(
        config: Arc<AuthClientConfig>,
        transport: Arc<T>,
        store: Arc<S>,
        events: SessionEventBus,
        metrics: Arc<dyn AuthMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange: RefreshExchange::new(Arc::clone(&config), transport),
                config,
                store,
                queue: RequestQueue::new(),
                events,
                metrics,
                state: Mutex::new(CycleState {
                    session: SessionState::Unauthenticated,
                    attempts: 0,
                    generation: 0,
                    epoch: 0,
                    in_flight: None,
                }),
                commit_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.state.lock().session
    }

    /// Consecutive failed refresh attempts since the last success.
    pub fn failed_attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.state.lock().in_flight.is_some()
    }

    /// Calls currently parked behind the in-flight refresh.
    pub fn queued_calls(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Make sure the stored access token is usable for the next call.
    ///
    /// Joins a running refresh if there is one, otherwise refreshes when the
    /// token is missing, undecodable or within the configured threshold of
    /// expiry. `Ok` means a fresh token is in the store.
    pub async fn ensure_fresh(&self) -> Result<(), AuthError> {
        let running = {
            let state = self.inner.state.lock();
            match &state.in_flight {
                Some((_, cycle)) => Some(cycle.clone()),
                None if !state.session.has_credentials() => {
                    return Err(AuthError::token_expired("no active session"));
                }
                None => None,
            }
        };

        if let Some(cycle) = running {
            debug!("Waiting on in-flight refresh");
            return cycle.await;
        }

        let token = self.inner.store.get_token().await?;
        let stale = match &token {
            Some(token) => {
                TokenCodec::will_expire_soon(token, self.inner.config.refresh_threshold, Utc::now())
            }
            None => true,
        };

        if !stale {
            return Ok(());
        }

        debug!("Access token missing or close to expiry, refreshing");
        self.refresh().await
    }

    /// Refresh the session, or join the refresh already in flight.
    ///
    /// Every caller that overlaps one cycle receives that cycle's outcome;
    /// only one exchange reaches the backend.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let start = {
            let mut state = self.inner.state.lock();
            if let Some((_, cycle)) = &state.in_flight {
                debug!("Joining in-flight refresh");
                Start::Join(cycle.clone())
            } else if !state.session.has_credentials() {
                Start::Denied(AuthError::token_expired("no active session to refresh"))
            } else {
                state.attempts += 1;
                if state.attempts > self.inner.config.max_refresh_retries {
                    state.attempts = 0;
                    Start::Denied(AuthError::token_expired("refresh retry budget exceeded"))
                } else {
                    Start::Join(self.start_cycle(&mut state))
                }
            }
        };

        match start {
            Start::Join(cycle) => cycle.await,
            Start::Denied(error) => {
                debug!(error = %error, "Refresh not started");
                Err(error)
            }
        }
    }

    /// Park `replay` behind the running refresh, or hand it back if none runs.
    pub fn enqueue_if_refreshing(&self, replay: Replay) -> Admission {
        let state = self.inner.state.lock();
        if state.in_flight.is_none() {
            return Admission::NotRefreshing(replay);
        }
        self.inner.metrics.record_queued_call();
        Admission::Queued(self.inner.queue.enqueue(replay))
    }

    /// Mark a login as started. Returns the state to restore if it fails.
    pub fn begin_authenticating(&self) -> SessionState {
        let mut state = self.inner.state.lock();
        let previous = state.session;
        if !previous.has_credentials() {
            state.session = SessionState::Authenticating;
        }
        previous
    }

    /// Undo [`begin_authenticating`](Self::begin_authenticating) after a failed login.
    pub fn abort_authenticating(&self, previous: SessionState) {
        let mut state = self.inner.state.lock();
        if state.session == SessionState::Authenticating {
            state.session = previous;
        }
    }

    /// Commit a freshly issued pair from a login and mark the session live.
    ///
    /// A refresh still running for an earlier session is superseded: its
    /// tokens are discarded and its parked calls replay with the new pair.
    pub async fn establish(&self, pair: TokenPair, identity: TokenClaims) -> Result<(), AuthError> {
        let subject = identity.sub.clone();
        let commit_guard = self.inner.commit_lock.lock().await;

        self.inner
            .store
            .commit(StoredCredentials::issued(pair.bearer, pair.refresh, identity))
            .await?;

        let superseded = {
            let mut state = self.inner.state.lock();
            state.session = SessionState::Authenticated;
            state.attempts = 0;
            state.epoch += 1;
            state.in_flight.take().map(|_| self.inner.queue.take_all())
        };
        drop(commit_guard);

        info!(subject = %subject, "Session established");
        self.inner.events.emit(SessionEvent::LoggedIn { subject });

        if let Some(batch) = superseded {
            if batch.len() > 0 {
                tokio::spawn(batch.replay_all());
            }
        }
        Ok(())
    }

    /// Clear the session on request. Parked calls fail with `TOKEN_EXPIRED`.
    pub async fn end_session(&self) {
        let batch = {
            let _commit_guard = self.inner.commit_lock.lock().await;
            let batch = {
                let mut state = self.inner.state.lock();
                self.inner.begin_logout(&mut state)
            };
            if let Err(e) = self.inner.store.clear_all().await {
                warn!(error = %e, "Failed to clear credential store on logout");
            }
            batch
        };

        batch.reject_all(AuthError::token_expired("logged out"));
        info!("Session ended");
        self.inner.events.emit(SessionEvent::LoggedOut);
    }

    /// Adopt credentials persisted by an earlier run.
    ///
    /// Returns whether a usable record was found. An incomplete or malformed
    /// record is cleared.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let record = self.inner.store.load().await?;
        let found = record.is_some();
        let usable = record
            .filter(StoredCredentials::is_complete)
            .and_then(|r| r.access_token)
            .map(|token| TokenCodec::validate_structure(&token))
            .unwrap_or(false);

        if usable {
            let mut state = self.inner.state.lock();
            if !state.session.has_credentials() {
                state.session = SessionState::Authenticated;
                state.attempts = 0;
            }
            debug!("Restored persisted session");
        } else if found {
            warn!("Discarding unusable persisted credentials");
            self.inner.store.clear_all().await?;
        }

        Ok(usable)
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Result<Session, AuthError> {
        let live = self.session_state().has_credentials();
        let Some(record) = self.inner.store.load().await? else {
            return Ok(Session::anonymous());
        };

        let identity = record.identity.clone().or_else(|| {
            record
                .access_token
                .as_ref()
                .and_then(TokenCodec::extract_identity)
        });
        let well_formed = record
            .access_token
            .as_ref()
            .map(TokenCodec::validate_structure)
            .unwrap_or(false);

        Ok(Session {
            authenticated: live && well_formed && record.is_complete(),
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            identity,
        })
    }

    fn start_cycle(&self, state: &mut CycleState) -> SharedRefresh {
        state.generation += 1;
        state.session = SessionState::Refreshing;
        let generation = state.generation;
        let attempt = state.attempts;

        let task = tokio::spawn(Arc::clone(&self.inner).run_cycle(generation, attempt));
        let inner = Arc::clone(&self.inner);
        let cycle = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = AuthError::Unknown {
                        status: None,
                        message: format!("refresh task failed: {}", e),
                    };
                    inner.abandon_cycle(generation, error.clone());
                    Err(error)
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some((generation, cycle.clone()));
        cycle
    }
}

impl<T: HttpTransport + 'static, S: CredentialStore + 'static> Inner<T, S> {
    async fn run_cycle(self: Arc<Self>, generation: u64, attempt: u32) -> Result<(), AuthError> {
        info!(
            attempt,
            max = self.config.max_refresh_retries,
            "Refreshing session"
        );
        self.metrics.record_refresh_attempt(attempt);

        let refresh_token = match self.store.get_refresh_token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return self.reject_cycle(generation, REASON_MISSING).await,
            Err(e) => return self.fail_cycle(generation, e.into()).await,
        };

        match self.exchange.exchange(&refresh_token).await {
            Ok((pair, identity)) => self.complete_cycle(generation, pair, identity).await,
            Err(error) if is_refresh_rejection(&error) => {
                debug!(error = %error, "Refresh token refused by backend");
                self.reject_cycle(generation, REASON_REJECTED).await
            }
            Err(error) => self.fail_cycle(generation, error).await,
        }
    }

    async fn complete_cycle(
        &self,
        generation: u64,
        pair: TokenPair,
        identity: TokenClaims,
    ) -> Result<(), AuthError> {
        let commit_guard = self.commit_lock.lock().await;
        if !self.state.lock().is_current(generation) {
            debug!("Session changed while refreshing, discarding issued tokens");
            return Err(session_ended());
        }

        let subject = identity.sub.clone();
        let record = StoredCredentials::issued(pair.bearer, pair.refresh, identity);
        if let Err(e) = self.store.commit(record).await {
            warn!(error = %e, "Failed to persist refreshed credentials");
            drop(commit_guard);
            return self.fail_cycle(generation, e.into()).await;
        }

        let batch = {
            let mut state = self.state.lock();
            state.attempts = 0;
            state.session = SessionState::Authenticated;
            state.in_flight = None;
            self.queue.take_all()
        };
        drop(commit_guard);

        self.metrics.record_refresh(true);
        info!(subject = %subject, replaying = batch.len(), "Session refreshed");
        self.events.emit(SessionEvent::Refreshed { subject });

        if batch.len() > 0 {
            tokio::spawn(batch.replay_all());
        }
        Ok(())
    }

    async fn fail_cycle(&self, generation: u64, error: AuthError) -> Result<(), AuthError> {
        self.metrics.record_refresh(false);
        let max = self.config.max_refresh_retries;

        let (batch, attempts, exhausted_at) = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return Err(session_ended());
            }
            let attempts = state.attempts;
            if attempts >= max {
                let epoch = state.epoch;
                (self.begin_logout(&mut state), attempts, Some(epoch))
            } else {
                state.session = SessionState::Authenticated;
                state.in_flight = None;
                (self.queue.take_all(), attempts, None)
            }
        };

        if let Some(epoch) = exhausted_at {
            warn!(attempts, error = %error, "Refresh retries exhausted, forcing logout");
            let error = self
                .finish_forced_logout(batch, REASON_EXHAUSTED, epoch)
                .await;
            return Err(error);
        }

        warn!(
            attempt = attempts,
            max,
            error_code = error.code(),
            "Refresh failed, keeping session"
        );
        batch.reject_all(error.clone());
        Err(error)
    }

    async fn reject_cycle(&self, generation: u64, reason: &str) -> Result<(), AuthError> {
        self.metrics.record_refresh(false);

        let (batch, epoch) = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return Err(session_ended());
            }
            let epoch = state.epoch;
            (self.begin_logout(&mut state), epoch)
        };

        warn!(reason, "Refresh refused, forcing logout");
        Err(self.finish_forced_logout(batch, reason, epoch).await)
    }

    fn abandon_cycle(&self, generation: u64, error: AuthError) {
        let batch = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            state.session = SessionState::Authenticated;
            state.in_flight = None;
            self.queue.take_all()
        };
        batch.reject_all(error);
    }

    fn begin_logout(&self, state: &mut CycleState) -> DrainBatch {
        state.session = SessionState::LoggedOut;
        state.attempts = 0;
        state.in_flight = None;
        self.queue.take_all()
    }

    /// Clear the store for a logout decided at `epoch`, unless a login has
    /// committed a newer record since.
    async fn finish_forced_logout(
        &self,
        batch: DrainBatch,
        reason: &str,
        epoch: u64,
    ) -> AuthError {
        {
            let _commit_guard = self.commit_lock.lock().await;
            let superseded = self.state.lock().epoch != epoch;
            if superseded {
                debug!("Session re-established during forced logout, keeping new credentials");
            } else if let Err(e) = self.store.clear_all().await {
                warn!(error = %e, "Failed to clear credential store on forced logout");
            }
        }

        let error = AuthError::token_expired(format!("session ended ({})", reason));
        batch.reject_all(error.clone());
        self.metrics.record_forced_logout(reason);
        self.events.emit(SessionEvent::ForcedLogout {
            reason: reason.to_string(),
        });
        error
    }
}

fn session_ended() -> AuthError {
    AuthError::token_expired("session ended during refresh")
}
