//! Refresh Exchange
//!
//! `POST /refresh {refresh}` exchanged for a new token pair. Single-flight and
//! retry accounting live in the [`RefreshCoordinator`](crate::token::RefreshCoordinator);
//! this type performs exactly one exchange per call.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{send_with_deadline, HttpMethod, HttpTransport};
use crate::error::{AuthError, ErrorKind, UnauthorizedContext};
use crate::flows::{build_request, parse_token_response};
use crate::types::{AuthClientConfig, RefreshRequest, Token, TokenClaims, TokenPair};

/// One refresh exchange against the backend.
pub struct RefreshExchange<T: HttpTransport> {
    config: Arc<AuthClientConfig>,
    transport: Arc<T>,
}

impl<T: HttpTransport> RefreshExchange<T> {
    pub fn new(config: Arc<AuthClientConfig>, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// Trade `refresh_token` for a new validated token pair.
    pub async fn exchange(&self, refresh_token: &Token) -> Result<(TokenPair, TokenClaims), AuthError> {
        let url = self.config.resolve(&self.config.endpoints.refresh)?;
        let body = serde_json::to_string(&RefreshRequest {
            refresh: refresh_token.clone(),
        })
        .map_err(|e| AuthError::Validation {
            message: format!("refresh request could not be encoded: {}", e),
        })?;

        debug!(url = %url, "Exchanging refresh token");

        let request = build_request(
            &self.config,
            HttpMethod::Post,
            url.to_string(),
            Some(body),
            None,
            &HashMap::new(),
            None,
        );

        let response = send_with_deadline(self.transport.as_ref(), request).await?;
        parse_token_response(&response, UnauthorizedContext::Session)
    }
}

/// Whether a refresh failure means the refresh token itself was refused.
///
/// Rejections end the session immediately; anything else counts against the
/// retry budget.
pub fn is_refresh_rejection(error: &AuthError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::TokenExpired | ErrorKind::InvalidCredentials | ErrorKind::AccessDenied
    )
}
