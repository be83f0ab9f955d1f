//! Integration tests using WireMock
//!
//! These tests drive the client through the reqwest transport against a mock
//! backend, covering login, authenticated calls, refresh and logout over real
//! HTTP.

mod refresh;
mod session;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use std::time::Duration;
use toll_auth_client::{auth_client_config, AuthenticatedClient, Token};
use wiremock::{MockServer, ResponseTemplate};

/// Helper to start a mock backend
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Helper to create a client pointed at the mock backend
pub fn client_for(server: &MockServer) -> AuthenticatedClient {
    let config = auth_client_config()
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("valid config");

    AuthenticatedClient::new(config).expect("Failed to build client")
}

/// Unsigned token for `sub` expiring `ttl_secs` from now
pub fn mint_token(sub: &str, ttl_secs: i64) -> Token {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "sub": sub,
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
        "role": "SUPERVISOR",
        "permissions": ["peajes.ver", "tarifas.editar"],
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    Token::new(format!("{}.{}.firma", header, body))
}

/// Helper to create a token pair response
pub fn pair_response(bearer: &Token, refresh: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {"bearer": bearer.expose(), "refresh": refresh}
    }))
}

/// Helper to create error response templates
pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "success": false,
        "message": message,
        "status": status
    }))
}
