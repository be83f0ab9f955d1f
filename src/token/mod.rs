//! Token Management
//!
//! Session credential lifecycle:
//!
//! - **Credential Storage**: atomic persistence of the token pair and identity
//! - **Refresh Coordinator**: single-flight refresh with bounded retries
//! - **Request Queue**: calls parked while a refresh is in flight

pub mod coordinator;
pub mod queue;
pub mod storage;

// Credential Storage
pub use storage::{CredentialStore, InMemoryCredentialStore, MockCredentialStore};

// Refresh Coordinator
pub use coordinator::{Admission, RefreshCoordinator};

// Request Queue
pub use queue::{QueuedCallHandle, QueuedOutcome, Replay, RequestQueue};
