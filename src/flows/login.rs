//! Password Login Flow
//!
//! `POST /login {username, password}` exchanged for a token pair.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{send_with_deadline, HttpMethod, HttpTransport};
use crate::error::{AuthError, UnauthorizedContext};
use crate::flows::{build_request, parse_token_response};
use crate::types::{AuthClientConfig, LoginRequest, TokenClaims, TokenPair};

/// Username/password login against the backend.
pub struct PasswordLoginFlow<T: HttpTransport> {
    config: Arc<AuthClientConfig>,
    transport: Arc<T>,
}

impl<T: HttpTransport> PasswordLoginFlow<T> {
    /// Create new login flow.
    pub fn new(config: Arc<AuthClientConfig>, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// Exchange credentials for a validated token pair and its identity.
    ///
    /// A 401 (or a failed envelope without status) is `INVALID_CREDENTIALS`;
    /// no refresh is ever attempted from here.
    pub async fn login(&self, request: LoginRequest) -> Result<(TokenPair, TokenClaims), AuthError> {
        let url = self.config.resolve(&self.config.endpoints.login)?;
        let body = serde_json::to_string(&request).map_err(|e| AuthError::Validation {
            message: format!("login request could not be encoded: {}", e),
        })?;

        debug!(username = %request.username, "Submitting login");

        let http_request = build_request(
            &self.config,
            HttpMethod::Post,
            url.to_string(),
            Some(body),
            None,
            &HashMap::new(),
            None,
        );

        let response = send_with_deadline(self.transport.as_ref(), http_request).await?;
        parse_token_response(&response, UnauthorizedContext::Login)
    }
}
