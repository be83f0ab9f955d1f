//! Auth Flows
//!
//! Network exchanges with the auth endpoints:
//!
//! - **Login**: username/password for a token pair
//! - **Refresh**: refresh token for a new token pair
//! - **Logout**: best-effort server-side session end
//!
//! Flows only talk to the backend; persisting what they return is the job of
//! the [`RefreshCoordinator`](crate::token::RefreshCoordinator).

pub mod login;
pub mod logout;
pub mod refresh;

use std::collections::HashMap;
use std::time::Duration;

use crate::core::{HttpMethod, HttpRequest, HttpResponse, TokenCodec};
use crate::error::{create_error_from_response, AuthError, UnauthorizedContext};
use crate::types::{AuthClientConfig, AuthResponse, Token, TokenClaims, TokenPair};

pub use login::PasswordLoginFlow;
pub use logout::LogoutFlow;
pub use refresh::{is_refresh_rejection, RefreshExchange};

/// Build a JSON request against the configured backend.
pub(crate) fn build_request(
    config: &AuthClientConfig,
    method: HttpMethod,
    url: String,
    body: Option<String>,
    bearer: Option<&Token>,
    extra_headers: &HashMap<String, String>,
    timeout: Option<Duration>,
) -> HttpRequest {
    let mut headers = HashMap::new();
    headers.insert("accept".to_string(), "application/json".to_string());

    if body.is_some() {
        headers.insert("content-type".to_string(), "application/json".to_string());
    }
    if let Some(user_agent) = &config.user_agent {
        headers.insert("user-agent".to_string(), user_agent.clone());
    }
    for (key, value) in extra_headers {
        headers.insert(key.to_lowercase(), value.clone());
    }
    // Set last so caller headers cannot replace the session credential.
    if let Some(token) = bearer {
        headers.insert("authorization".to_string(), token.authorization_header());
    }

    HttpRequest {
        method,
        url,
        headers,
        body,
        timeout: Some(timeout.unwrap_or(config.timeout)),
    }
}

/// Parse a login/refresh response into a validated token pair and identity.
pub(crate) fn parse_token_response(
    response: &HttpResponse,
    context: UnauthorizedContext,
) -> Result<(TokenPair, TokenClaims), AuthError> {
    if !response.is_success() {
        return Err(create_error_from_response(
            response.status,
            &response.body,
            context,
        ));
    }

    let envelope: AuthResponse = serde_json::from_str(&response.body)
        .map_err(|e| AuthError::parsing(format!("malformed auth response: {}", e)))?;

    if !envelope.success {
        // A failed envelope without a status is a rejection of what was sent.
        let status = envelope.status.unwrap_or(401);
        return Err(create_error_from_response(status, &response.body, context));
    }

    let pair = envelope
        .data
        .ok_or_else(|| AuthError::parsing("auth response carried no token pair"))?;

    if !TokenCodec::validate_structure(&pair.bearer) {
        return Err(AuthError::parsing("issued access token is malformed"));
    }
    if pair.refresh.is_empty() {
        return Err(AuthError::parsing("issued refresh token is empty"));
    }

    let identity = TokenCodec::extract_identity(&pair.bearer)
        .ok_or_else(|| AuthError::parsing("issued access token carries no readable identity"))?;

    Ok((pair, identity))
}
