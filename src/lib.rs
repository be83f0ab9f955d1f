//! Authenticated Request Layer
//!
//! Client-side session handling for a backend protected by short-lived bearer
//! tokens and long-lived refresh tokens.
//!
//! # Features
//!
//! - Username/password login and best-effort logout
//! - Authenticated JSON calls with a bearer attached automatically
//! - Proactive refresh when the access token is close to expiry
//! - Single-flight refresh: concurrent 401s cause exactly one refresh exchange
//! - Queued calls replayed in order once the refresh succeeds
//! - Bounded refresh retries ending in a forced logout
//! - Closed error taxonomy with stable codes
//!
//! # Example
//!
//! ```rust,ignore
//! use toll_auth_client::{auth_client_config, AuthenticatedClient, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = auth_client_config()
//!         .from_env()
//!         .base_url("https://peajes.example.com/api")
//!         .build()?;
//!
//!     let client = AuthenticatedClient::new(config)?;
//!     let mut events = client.subscribe();
//!
//!     let identity = client.login("operador1", "clave").await?;
//!     println!("Signed in as {}", identity.display_name());
//!
//!     let peajes: Vec<serde_json::Value> = client.get("/peajes").await?;
//!     println!("{} toll plazas", peajes.len());
//!
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let SessionEvent::ForcedLogout { reason } = event {
//!                 eprintln!("Session ended: {}", reason);
//!             }
//!         }
//!     });
//!
//!     client.logout().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: tokens, claims, session records, wire bodies and configuration
//! - `error`: error taxonomy and HTTP status mapping
//! - `core`: HTTP transport and token decoding
//! - `flows`: login, refresh and logout exchanges
//! - `token`: credential storage, refresh coordination and the request queue
//! - `telemetry`: metrics hooks and session events
//! - `builders`: fluent configuration builder
//! - `client`: high-level client combining all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod telemetry;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{authenticated_client, AuthenticatedClient, RequestOptions};

// Re-export builders
pub use builders::{auth_client_config, AuthClientConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_response, ApiErrorBody, AuthError,
    AuthResult, ConfigurationError, ErrorKind, StorageError, UnauthorizedContext,
};

// Re-export types
pub use types::{
    // Config
    AuthClientConfig, AuthEndpoints, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_TIMEOUT_MS,
    MAX_REFRESH_RETRIES,
    // Token
    Token, TokenClaims,
    // Session
    Session, SessionState, StoredCredentials,
    // Wire
    AuthResponse, LoginRequest, RefreshRequest, TokenPair,
};

// Re-export core components
pub use core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Codec
    TokenCodec,
};

// Re-export flows
pub use flows::{LogoutFlow, PasswordLoginFlow, RefreshExchange};

// Re-export token management
pub use token::{
    // Storage
    CredentialStore, InMemoryCredentialStore, MockCredentialStore,
    // Coordinator
    Admission, RefreshCoordinator,
    // Queue
    QueuedCallHandle, Replay, RequestQueue,
};

// Re-export telemetry
pub use telemetry::{
    // Metrics
    create_in_memory_metrics, no_op_metrics, AuthMetrics, InMemoryMetrics, MetricEntry,
    MetricLabels, NoOpMetrics,
    // Events
    SessionEvent, SessionEventBus,
};
