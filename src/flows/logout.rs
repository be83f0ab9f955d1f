//! Logout Flow
//!
//! Tells the backend the session is over. The local session is cleared
//! whatever the outcome, so failures here are reported, never fatal.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{send_with_deadline, HttpMethod, HttpTransport};
use crate::error::{create_error_from_response, AuthError, UnauthorizedContext};
use crate::flows::build_request;
use crate::types::{AuthClientConfig, Token};

pub struct LogoutFlow<T: HttpTransport> {
    config: Arc<AuthClientConfig>,
    transport: Arc<T>,
}

impl<T: HttpTransport> LogoutFlow<T> {
    pub fn new(config: Arc<AuthClientConfig>, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// `POST /logout` carrying the current access token.
    pub async fn notify(&self, access_token: &Token) -> Result<(), AuthError> {
        let url = self.config.resolve(&self.config.endpoints.logout)?;
        let request = build_request(
            &self.config,
            HttpMethod::Post,
            url.to_string(),
            None,
            Some(access_token),
            &HashMap::new(),
            None,
        );

        let response = send_with_deadline(self.transport.as_ref(), request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(create_error_from_response(
                response.status,
                &response.body,
                UnauthorizedContext::Session,
            ))
        }
    }
}
