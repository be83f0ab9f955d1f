//! Integration tests for login, authenticated calls and logout

use super::*;
use serde_json::{json, Value};
use toll_auth_client::{AuthError, SessionState};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_login_then_authenticated_call() {
    let mock_server = setup_mock_server().await;
    let bearer = mint_token("supervisor3", 3600);

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "supervisor3", "password": "clave"})))
        .respond_with(pair_response(&bearer, "refresh-1"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/peajes"))
        .and(header("authorization", bearer.authorization_header().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "nombre": "Peaje Norte"},
            {"id": 2, "nombre": "Peaje Sur"}
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let identity = client.login("supervisor3", "clave").await.unwrap();

    assert_eq!(identity.sub, "supervisor3");
    assert!(identity.has_permission("tarifas.editar"));
    assert_eq!(client.session_state(), SessionState::Authenticated);

    let peajes: Vec<Value> = client.get("/peajes").await.unwrap();
    assert_eq!(peajes.len(), 2);
    assert_eq!(peajes[1]["nombre"], "Peaje Sur");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(error_response(401, "Usuario o clave incorrectos"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.login("supervisor3", "mala").await;

    assert_eq!(
        result.unwrap_err(),
        AuthError::InvalidCredentials {
            message: "Usuario o clave incorrectos".to_string()
        }
    );
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_logout_notifies_backend_and_clears_session() {
    let mock_server = setup_mock_server().await;
    let bearer = mint_token("supervisor3", 3600);

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(pair_response(&bearer, "refresh-1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/logout"))
        .and(header("authorization", bearer.authorization_header().as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/peajes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.login("supervisor3", "clave").await.unwrap();
    client.logout().await;

    assert_eq!(client.session_state(), SessionState::LoggedOut);
    assert!(client.identity().await.unwrap().is_none());

    let error = client.get::<Value>("/peajes").await.unwrap_err();
    assert_eq!(error.code(), "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_server_error_is_mapped() {
    let mock_server = setup_mock_server().await;
    let bearer = mint_token("supervisor3", 3600);

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(pair_response(&bearer, "refresh-1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reportes"))
        .respond_with(error_response(503, "Mantenimiento programado"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.login("supervisor3", "clave").await.unwrap();

    let error = client.get::<Value>("/reportes").await.unwrap_err();
    assert_eq!(
        error,
        AuthError::ServiceUnavailable {
            status: 503,
            message: "Mantenimiento programado".to_string()
        }
    );
    assert!(error.is_retryable());
}
