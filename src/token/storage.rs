//! Credential Storage
//!
//! Storage interface for the session's credential record, plus an in-memory
//! implementation and a recording mock.
//!
//! Every write goes through [`CredentialStore::commit`], which replaces the
//! whole [`StoredCredentials`] record at once. The single-field helpers are
//! load-modify-commit wrappers over it, so a failure can never leave an access
//! token persisted without its refresh token.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::types::{StoredCredentials, Token, TokenClaims};

/// Credential store interface.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the current record, if any.
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError>;

    /// Atomically replace the stored record.
    async fn commit(&self, record: StoredCredentials) -> Result<(), StorageError>;

    /// Remove all credential material.
    async fn clear_all(&self) -> Result<(), StorageError>;

    async fn get_token(&self) -> Result<Option<Token>, StorageError> {
        Ok(self.load().await?.and_then(|r| r.access_token))
    }

    async fn get_refresh_token(&self) -> Result<Option<Token>, StorageError> {
        Ok(self.load().await?.and_then(|r| r.refresh_token))
    }

    async fn get_identity(&self) -> Result<Option<TokenClaims>, StorageError> {
        Ok(self.load().await?.and_then(|r| r.identity))
    }

    async fn save_token(&self, token: Token) -> Result<(), StorageError> {
        let mut record = self.load().await?.unwrap_or_else(StoredCredentials::empty);
        record.access_token = Some(token);
        self.commit(record).await
    }

    async fn save_refresh_token(&self, token: Token) -> Result<(), StorageError> {
        let mut record = self.load().await?.unwrap_or_else(StoredCredentials::empty);
        record.refresh_token = Some(token);
        self.commit(record).await
    }

    async fn save_identity(&self, identity: TokenClaims) -> Result<(), StorageError> {
        let mut record = self.load().await?.unwrap_or_else(StoredCredentials::empty);
        record.identity = Some(identity);
        self.commit(record).await
    }
}

/// In-memory credential store.
///
/// Optionally size-limited, to model media such as cookies that reject
/// records above a byte budget. Records are measured in their JSON encoding.
pub struct InMemoryCredentialStore {
    record: Mutex<Option<StoredCredentials>>,
    capacity: Option<usize>,
}

impl InMemoryCredentialStore {
    /// Create new unbounded in-memory store.
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
            capacity: None,
        }
    }

    /// Create a store rejecting records larger than `limit` bytes.
    pub fn with_capacity(limit: usize) -> Self {
        Self {
            record: Mutex::new(None),
            capacity: Some(limit),
        }
    }

    fn check_capacity(&self, record: &StoredCredentials) -> Result<(), StorageError> {
        let Some(limit) = self.capacity else {
            return Ok(());
        };

        let size = serde_json::to_vec(record)
            .map_err(|e| StorageError::WriteFailed {
                message: e.to_string(),
            })?
            .len();

        if size > limit {
            return Err(StorageError::CapacityExceeded { size, limit });
        }
        Ok(())
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        Ok(self.record.lock().clone())
    }

    async fn commit(&self, record: StoredCredentials) -> Result<(), StorageError> {
        self.check_capacity(&record)?;
        *self.record.lock() = Some(record);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        *self.record.lock() = None;
        Ok(())
    }
}

/// Mock credential store for testing.
#[derive(Default)]
pub struct MockCredentialStore {
    record: Mutex<Option<StoredCredentials>>,
    commit_history: Mutex<Vec<StoredCredentials>>,
    clear_count: Mutex<usize>,
    next_error: Mutex<Option<StorageError>>,
    fail_commits: Mutex<bool>,
}

impl MockCredentialStore {
    /// Create new mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the record.
    pub fn with_record(record: StoredCredentials) -> Self {
        let store = Self::default();
        *store.record.lock() = Some(record);
        store
    }

    /// Fail the next operation with `error`.
    pub fn set_next_error(&self, error: StorageError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Make every commit fail.
    pub fn set_fail_commits(&self, fail: bool) -> &Self {
        *self.fail_commits.lock() = fail;
        self
    }

    /// Records committed so far.
    pub fn get_commit_history(&self) -> Vec<StoredCredentials> {
        self.commit_history.lock().clone()
    }

    /// Number of `clear_all` calls.
    pub fn clear_count(&self) -> usize {
        *self.clear_count.lock()
    }

    /// Current record without going through the trait.
    pub fn snapshot(&self) -> Option<StoredCredentials> {
        self.record.lock().clone()
    }

    fn check_error(&self) -> Result<(), StorageError> {
        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        self.check_error()?;
        Ok(self.record.lock().clone())
    }

    async fn commit(&self, record: StoredCredentials) -> Result<(), StorageError> {
        self.check_error()?;
        if *self.fail_commits.lock() {
            return Err(StorageError::WriteFailed {
                message: "Mock commit failure".to_string(),
            });
        }
        self.commit_history.lock().push(record.clone());
        *self.record.lock() = Some(record);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        self.check_error()?;
        *self.clear_count.lock() += 1;
        *self.record.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::test_tokens::token_for;
    use crate::core::TokenCodec;

    fn issued(sub: &str) -> StoredCredentials {
        let access = token_for(sub, 3600);
        let identity = TokenCodec::decode(&access).unwrap();
        StoredCredentials::issued(access, Token::new("r.e.f"), identity)
    }

    #[tokio::test]
    async fn test_in_memory_commit_and_load() {
        let store = InMemoryCredentialStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.commit(issued("operador1")).await.unwrap();

        assert_eq!(store.get_refresh_token().await.unwrap(), Some(Token::new("r.e.f")));
        assert_eq!(store.get_identity().await.unwrap().unwrap().sub, "operador1");
        assert!(store.get_token().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_single_field_saves_keep_other_fields() {
        let store = InMemoryCredentialStore::new();
        store.commit(issued("operador1")).await.unwrap();

        store.save_token(Token::new("n.e.w")).await.unwrap();

        let record = store.load().await.unwrap().unwrap();
        assert_eq!(record.access_token, Some(Token::new("n.e.w")));
        assert_eq!(record.refresh_token, Some(Token::new("r.e.f")));
        assert!(record.identity.is_some());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let store = InMemoryCredentialStore::new();
        store.commit(issued("operador1")).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert!(store.get_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_limit_rejects_whole_record() {
        let store = InMemoryCredentialStore::with_capacity(64);
        let result = store.commit(issued("operador1")).await;

        assert!(matches!(
            result,
            Err(StorageError::CapacityExceeded { limit: 64, .. })
        ));
        // Nothing partially written.
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_records_commits() {
        let store = MockCredentialStore::new();
        store.commit(issued("a")).await.unwrap();
        store.clear_all().await.unwrap();

        assert_eq!(store.get_commit_history().len(), 1);
        assert_eq!(store.clear_count(), 1);
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_mock_commit_failure_keeps_previous_record() {
        let store = MockCredentialStore::with_record(issued("a"));
        store.set_fail_commits(true);

        assert!(store.commit(issued("b")).await.is_err());
        assert_eq!(store.snapshot().unwrap().identity.unwrap().sub, "a");
    }
}
