//! Integration tests for session refresh

use super::*;
use serde_json::{json, Value};
use toll_auth_client::{SessionEvent, SessionState};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_expired_token_is_refreshed_before_call() {
    let mock_server = setup_mock_server().await;
    let expired = mint_token("supervisor3", -60);
    let fresh = mint_token("supervisor3", 3600);

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(pair_response(&expired, "refresh-1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .and(body_json(json!({"refresh": "refresh-1"})))
        .respond_with(pair_response(&fresh, "refresh-2"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tarifas"))
        .and(header("authorization", fresh.authorization_header().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"categoria": "A", "monto": 2.5})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.login("supervisor3", "clave").await.unwrap();

    let tarifa: Value = client.get("/tarifas").await.unwrap();
    assert_eq!(tarifa["categoria"], "A");

    let session = client.session().await.unwrap();
    assert_eq!(session.refresh_token.unwrap().expose(), "refresh-2");
}

#[tokio::test]
async fn test_concurrent_401s_trigger_single_refresh() {
    let mock_server = setup_mock_server().await;
    let revoked = mint_token("supervisor3", 3600);
    let fresh = mint_token("supervisor3", 7200);

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(pair_response(&revoked, "refresh-1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tarifas"))
        .and(header("authorization", revoked.authorization_header().as_str()))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tarifas"))
        .and(header("authorization", fresh.authorization_header().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(5)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(pair_response(&fresh, "refresh-2").set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.login("supervisor3", "clave").await.unwrap();

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get::<Value>("/tarifas").await })
        })
        .collect();

    for call in futures::future::join_all(calls).await {
        assert_eq!(call.unwrap().unwrap(), json!({"ok": true}));
    }
}

#[tokio::test]
async fn test_rejected_refresh_forces_logout() {
    let mock_server = setup_mock_server().await;
    let bearer = mint_token("supervisor3", 3600);

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(pair_response(&bearer, "refresh-1"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cuentas"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refresh"))
        .respond_with(error_response(401, "Refresh token revocado"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.login("supervisor3", "clave").await.unwrap();
    let mut events = client.subscribe();

    let error = client.get::<Value>("/cuentas").await.unwrap_err();

    assert_eq!(error.code(), "TOKEN_EXPIRED");
    assert_eq!(client.session_state(), SessionState::LoggedOut);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::ForcedLogout {
            reason: "refresh_rejected".to_string()
        }
    );
}
