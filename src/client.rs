//! Authenticated Client
//!
//! High-level client combining login/logout with authenticated JSON calls that
//! keep the session alive transparently.
//!
//! Every authenticated call is made fresh first (proactive refresh inside the
//! configured threshold). A 401 on the call is recovered at most once: the
//! call either rides along with the refresh already in flight, replays with a
//! token another caller already obtained, or triggers the refresh itself.
//! A second 401 is surfaced to the caller.

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::core::{
    create_transport, send_with_deadline, HttpMethod, HttpResponse, HttpTransport,
    ReqwestHttpTransport,
};
use crate::error::{create_error_from_response, AuthError, AuthResult, UnauthorizedContext};
use crate::flows::{build_request, LogoutFlow, PasswordLoginFlow};
use crate::telemetry::{AuthMetrics, NoOpMetrics, SessionEvent, SessionEventBus};
use crate::token::{Admission, CredentialStore, InMemoryCredentialStore, RefreshCoordinator, Replay};
use crate::types::{AuthClientConfig, LoginRequest, Session, SessionState, Token, TokenClaims};

/// Per-call options.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Send without a bearer and never refresh. A 401 then means the
    /// submitted credentials were wrong.
    pub skip_auth: bool,
    /// Overrides the configured timeout for this call.
    pub timeout: Option<Duration>,
    /// Extra headers. `authorization` is always owned by the client.
    pub headers: HashMap<String, String>,
}

impl RequestOptions {
    /// Options for a call made without session credentials.
    pub fn unauthenticated() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A call resolved against the base URL, ready to be sent or replayed.
#[derive(Clone)]
struct PreparedCall {
    method: HttpMethod,
    url: String,
    body: Option<String>,
    options: RequestOptions,
}

/// Client for a backend behind bearer/refresh token auth.
pub struct AuthenticatedClient<
    T: HttpTransport + 'static = ReqwestHttpTransport,
    S: CredentialStore + 'static = InMemoryCredentialStore,
> {
    config: Arc<AuthClientConfig>,
    transport: Arc<T>,
    store: Arc<S>,
    coordinator: RefreshCoordinator<T, S>,
    metrics: Arc<dyn AuthMetrics>,
}

impl<T: HttpTransport + 'static, S: CredentialStore + 'static> Clone for AuthenticatedClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            coordinator: self.coordinator.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl AuthenticatedClient<ReqwestHttpTransport, InMemoryCredentialStore> {
    /// Create a client with the reqwest transport and an in-memory store.
    pub fn new(config: AuthClientConfig) -> AuthResult<Self> {
        let transport = create_transport(Some(config.timeout))?;
        Ok(Self::with_components(
            config,
            transport,
            InMemoryCredentialStore::new(),
        ))
    }
}

impl<T: HttpTransport + 'static, S: CredentialStore + 'static> AuthenticatedClient<T, S> {
    /// Create a client with custom implementations.
    pub fn with_components(config: AuthClientConfig, transport: T, store: S) -> Self {
        Self::from_parts(
            Arc::new(config),
            Arc::new(transport),
            Arc::new(store),
            Arc::new(NoOpMetrics),
        )
    }

    /// Create a client over shared components.
    pub fn from_parts(
        config: Arc<AuthClientConfig>,
        transport: Arc<T>,
        store: Arc<S>,
        metrics: Arc<dyn AuthMetrics>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&store),
            SessionEventBus::default(),
            Arc::clone(&metrics),
        );

        Self {
            config,
            transport,
            store,
            coordinator,
            metrics,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<T, S> {
        &self.coordinator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        self.coordinator.session_state()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Log in with username and password.
    ///
    /// Returns the identity carried by the issued access token.
    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AuthResult<TokenClaims> {
        let request = LoginRequest::new(username, password);
        if request.username.trim().is_empty() {
            return Err(AuthError::Validation {
                message: "username is required".to_string(),
            });
        }

        let previous = self.coordinator.begin_authenticating();
        let flow = PasswordLoginFlow::new(Arc::clone(&self.config), Arc::clone(&self.transport));

        let outcome = match flow.login(request).await {
            Ok((pair, identity)) => self
                .coordinator
                .establish(pair, identity.clone())
                .await
                .map(|_| identity),
            Err(error) => Err(error),
        };

        if let Err(error) = &outcome {
            self.coordinator.abort_authenticating(previous);
            self.metrics.record_error(error.code());
            warn!(error_code = error.code(), "Login failed");
        }
        outcome
    }

    /// End the session.
    ///
    /// The backend is told first when there is a token to send; the local
    /// session is cleared whether or not that succeeds.
    pub async fn logout(&self) {
        match self.store.get_token().await {
            Ok(Some(token)) => {
                let flow = LogoutFlow::new(Arc::clone(&self.config), Arc::clone(&self.transport));
                if let Err(e) = flow.notify(&token).await {
                    warn!(error_code = e.code(), error = %e, "Backend logout failed, clearing local session");
                }
            }
            Ok(None) => debug!("No access token held, skipping backend logout"),
            Err(e) => warn!(error = %e, "Could not read access token for logout"),
        }

        self.coordinator.end_session().await;
    }

    /// Pick up credentials persisted by an earlier run.
    pub async fn restore_session(&self) -> AuthResult<bool> {
        self.coordinator.restore().await
    }

    pub async fn session(&self) -> AuthResult<Session> {
        self.coordinator.session().await
    }

    /// Identity of the live session, if any.
    pub async fn identity(&self) -> AuthResult<Option<TokenClaims>> {
        let session = self.session().await?;
        Ok(session.identity.filter(|_| session.authenticated))
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session()
            .await
            .map(|s| s.authenticated)
            .unwrap_or(false)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Issue a JSON call and decode its 2xx body into `R`.
    ///
    /// An empty 2xx body decodes as JSON `null`.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> AuthResult<R> {
        let context = if options.skip_auth {
            UnauthorizedContext::Login
        } else {
            UnauthorizedContext::Session
        };

        let outcome = match self.prepare(method, path, body, options) {
            Ok(call) => self
                .dispatch(call)
                .await
                .and_then(|response| decode_response(response, context)),
            Err(error) => Err(error),
        };

        if let Err(error) = &outcome {
            self.metrics.record_error(error.code());
            debug!(method = %method, path, error_code = error.code(), "Request failed");
        }
        outcome
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> AuthResult<R> {
        self.execute(HttpMethod::Get, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AuthResult<R> {
        let body = to_body(body)?;
        self.execute(HttpMethod::Post, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AuthResult<R> {
        let body = to_body(body)?;
        self.execute(HttpMethod::Put, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AuthResult<R> {
        let body = to_body(body)?;
        self.execute(HttpMethod::Patch, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> AuthResult<R> {
        self.execute(HttpMethod::Delete, path, None, RequestOptions::default())
            .await
    }

    fn prepare(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> AuthResult<PreparedCall> {
        let url = self.config.resolve(path)?;
        if !options.skip_auth && !self.config.is_backend_origin(&url) {
            warn!(
                host = url.host_str().unwrap_or_default(),
                "Refusing to send session credentials to foreign origin"
            );
            return Err(AuthError::Validation {
                message: format!(
                    "{} is outside the backend origin; use RequestOptions::unauthenticated() for foreign hosts",
                    url.origin().ascii_serialization()
                ),
            });
        }

        Ok(PreparedCall {
            method,
            url: url.to_string(),
            body: body.map(|b| b.to_string()),
            options,
        })
    }

    async fn dispatch(&self, call: PreparedCall) -> AuthResult<HttpResponse> {
        if !call.options.skip_auth {
            self.coordinator.ensure_fresh().await?;
        }

        let (response, sent_with) = self.send_once(&call).await?;
        if response.status != 401 || call.options.skip_auth {
            return Ok(response);
        }

        debug!(method = %call.method, url = %call.url, "Request rejected with 401, recovering session");

        match self.coordinator.enqueue_if_refreshing(self.replay_of(call)) {
            Admission::Queued(handle) => handle.await,
            Admission::NotRefreshing(replay) => {
                let current = self.store.get_token().await?;
                if current.is_some() && current != sent_with {
                    debug!("Session refreshed since the request was sent, replaying");
                    return replay().await;
                }
                self.coordinator.refresh().await?;
                replay().await
            }
        }
    }

    /// Send once with the current token. No 401 handling.
    async fn send_once(&self, call: &PreparedCall) -> AuthResult<(HttpResponse, Option<Token>)> {
        let bearer = if call.options.skip_auth {
            None
        } else {
            match self.store.get_token().await? {
                Some(token) => Some(token),
                None => return Err(AuthError::token_expired("no access token available")),
            }
        };

        let request = build_request(
            &self.config,
            call.method,
            call.url.clone(),
            call.body.clone(),
            bearer.as_ref(),
            &call.options.headers,
            call.options.timeout,
        );

        let started = Instant::now();
        let result = send_with_deadline(self.transport.as_ref(), request).await;
        self.metrics.record_request(
            call.method,
            result.as_ref().ok().map(|r| r.status),
            started.elapsed().as_secs_f64() * 1000.0,
        );

        Ok((result?, bearer))
    }

    fn replay_of(&self, call: PreparedCall) -> Replay {
        let client = self.clone();
        Box::new(move || {
            async move { client.send_once(&call).await.map(|(response, _)| response) }.boxed()
        })
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> AuthResult<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| AuthError::Validation {
        message: format!("request body could not be encoded: {}", e),
    })
}

fn decode_response<R: DeserializeOwned>(
    response: HttpResponse,
    context: UnauthorizedContext,
) -> AuthResult<R> {
    if !response.is_success() {
        return Err(create_error_from_response(
            response.status,
            &response.body,
            context,
        ));
    }

    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };

    serde_json::from_str(body)
        .map_err(|e| AuthError::parsing(format!("unexpected response body: {}", e)))
}

/// Create an authenticated client with default implementations.
pub fn authenticated_client(config: AuthClientConfig) -> AuthResult<AuthenticatedClient> {
    AuthenticatedClient::new(config)
}
