//! Credential and password outcomes for every backend on both listeners.

use bytes::Bytes;
use http::HeaderMap;

use terminal_gateway::auth::{Grant, ListenerPort};
use terminal_gateway::endpoints::BackendName;
use terminal_gateway::proto::{frdrpc, litrpc, lnrpc, looprpc, poolrpc};
use terminal_gateway::{ErrorCode, GatewayError};

use crate::common::{auth_headers, dummy_credential, Harness, UI_PASSWORD, WRONG_PASSWORD};

const PORTS: [ListenerPort; 2] = [ListenerPort::Gateway, ListenerPort::Core];

/// One read method per backend that verifies credentials.
const CREDENTIAL_METHODS: [(BackendName, &str); 4] = [
    (BackendName::Lnd, lnrpc::GET_INFO),
    (BackendName::Faraday, frdrpc::REVENUE_REPORT),
    (BackendName::Loop, looprpc::LIST_SWAPS),
    (BackendName::Pool, poolrpc::GET_INFO),
];

async fn outcome(
    harness: &Harness,
    port: ListenerPort,
    method: &str,
    headers: HeaderMap,
) -> Result<(), GatewayError> {
    harness
        .call(port, method, headers, Bytes::new())
        .await
        .map(|_| ())
}

#[tokio::test]
async fn test_missing_credential_on_every_backend() {
    let harness = Harness::new();
    for port in PORTS {
        for (_, method) in CREDENTIAL_METHODS {
            let err = outcome(&harness, port, method, HeaderMap::new())
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::MissingCredential, "{method} on {port}");
            assert_eq!(err.to_string(), "expected 1 macaroon, got 0");
        }
        let err = outcome(&harness, port, litrpc::LIST_SESSIONS, HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "expected 1 macaroon, got 0", "sessions on {port}");
    }
}

#[tokio::test]
async fn test_two_credentials_are_refused() {
    let harness = Harness::new();
    let mut headers = auth_headers(Some(&harness.macaroon(BackendName::Loop)), None);
    headers.append("macaroon", harness.macaroon(BackendName::Loop).parse().unwrap());
    let err = outcome(&harness, ListenerPort::Core, looprpc::LIST_SWAPS, headers)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "expected 1 macaroon, got 2");
}

#[tokio::test]
async fn test_malformed_credential_on_every_backend() {
    let harness = Harness::new();
    for port in PORTS {
        for (_, method) in CREDENTIAL_METHODS {
            let headers = auth_headers(Some(&dummy_credential()), None);
            let err = outcome(&harness, port, method, headers).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::MalformedCredential, "{method} on {port}");
            assert_eq!(err.to_string(), "unable to unmarshal macaroon: packet too short");
        }
    }
}

#[tokio::test]
async fn test_unknown_root_key_on_every_backend() {
    let harness = Harness::new();
    for port in PORTS {
        for (backend, method) in CREDENTIAL_METHODS {
            let headers = auth_headers(Some(&harness.foreign_macaroon(backend)), None);
            let err = outcome(&harness, port, method, headers).await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::UnknownRootKey, "{method} on {port}");
            assert!(
                err.to_string()
                    .starts_with("cannot get macaroon: root key with id"),
                "{err}"
            );
        }
    }
}

#[tokio::test]
async fn test_valid_native_credential_on_every_backend() {
    let harness = Harness::new();
    for port in PORTS {
        for (backend, method) in CREDENTIAL_METHODS {
            let credential = harness.macaroon(backend);
            let headers = auth_headers(Some(&credential), None);
            harness
                .call(port, method, headers, Bytes::new())
                .await
                .unwrap_or_else(|e| panic!("{method} on {port}: {e}"));

            match harness.daemon(backend).last_grant() {
                Some(Grant::Credential(verified)) => {
                    assert!(!verified.super_credential);
                    assert_eq!(verified.encoded, credential);
                    assert_eq!(verified.delegated, backend != BackendName::Lnd);
                }
                other => panic!("unexpected grant {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_credential_for_another_daemon_is_unknown() {
    let harness = Harness::new();
    let loop_credential = harness.macaroon(BackendName::Loop);
    let headers = auth_headers(Some(&loop_credential), None);
    let err = outcome(&harness, ListenerPort::Core, poolrpc::GET_INFO, headers)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownRootKey);
}

#[tokio::test]
async fn test_password_substitutes_on_gateway_port() {
    let harness = Harness::new();
    for (backend, method) in CREDENTIAL_METHODS {
        let headers = auth_headers(None, Some(UI_PASSWORD));
        outcome(&harness, ListenerPort::Gateway, method, headers)
            .await
            .unwrap_or_else(|e| panic!("{method}: {e}"));
        assert_eq!(harness.daemon(backend).last_grant(), Some(Grant::Password));
    }
}

#[tokio::test]
async fn test_password_substitutes_for_invalid_credential_on_gateway_port() {
    let harness = Harness::new();
    let headers = auth_headers(Some(&dummy_credential()), Some(UI_PASSWORD));
    outcome(&harness, ListenerPort::Gateway, looprpc::LIST_SWAPS, headers)
        .await
        .unwrap();
    assert_eq!(
        harness.daemon(BackendName::Loop).last_grant(),
        Some(Grant::Password)
    );
}

#[tokio::test]
async fn test_password_never_substitutes_on_core_port() {
    let harness = Harness::new();
    for (backend, method) in CREDENTIAL_METHODS {
        let headers = auth_headers(None, Some(UI_PASSWORD));
        let err = outcome(&harness, ListenerPort::Core, method, headers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingCredential, "{method}");

        let headers = auth_headers(Some(&harness.foreign_macaroon(backend)), Some(UI_PASSWORD));
        let err = outcome(&harness, ListenerPort::Core, method, headers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownRootKey, "{method}");
    }
}

#[tokio::test]
async fn test_wrong_password_falls_through_to_credential() {
    let harness = Harness::new();
    let headers = auth_headers(None, Some(WRONG_PASSWORD));
    let err = outcome(&harness, ListenerPort::Gateway, lnrpc::GET_INFO, headers)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingCredential);

    let headers = auth_headers(Some(&harness.macaroon(BackendName::Lnd)), Some(WRONG_PASSWORD));
    outcome(&harness, ListenerPort::Gateway, lnrpc::GET_INFO, headers)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_session_surface_on_core_port_needs_dummy_credential_and_password() {
    let harness = Harness::new();

    let headers = auth_headers(Some(&dummy_credential()), Some(UI_PASSWORD));
    outcome(&harness, ListenerPort::Core, litrpc::LIST_SESSIONS, headers)
        .await
        .unwrap();

    let headers = auth_headers(Some(&dummy_credential()), Some(WRONG_PASSWORD));
    let err = outcome(&harness, ListenerPort::Core, litrpc::LIST_SESSIONS, headers)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidPassword);

    let headers = auth_headers(Some(&dummy_credential()), None);
    let err = outcome(&harness, ListenerPort::Core, litrpc::LIST_SESSIONS, headers)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthenticated);
}

#[tokio::test]
async fn test_session_surface_on_gateway_port_takes_password_alone() {
    let harness = Harness::new();
    let headers = auth_headers(None, Some(UI_PASSWORD));
    outcome(&harness, ListenerPort::Gateway, litrpc::LIST_SESSIONS, headers)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_method_is_refused() {
    let harness = Harness::new();
    let headers = auth_headers(Some(&harness.macaroon(BackendName::Lnd)), Some(UI_PASSWORD));
    let err = outcome(&harness, ListenerPort::Gateway, "/lnrpc.Lightning/Nope", headers)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "/lnrpc.Lightning/Nope: unknown permissions required for method"
    );
}

#[tokio::test]
async fn test_call_reaches_owning_daemon_once() {
    let harness = Harness::new();
    let headers = auth_headers(Some(&harness.macaroon(BackendName::Loop)), Some(UI_PASSWORD));
    outcome(&harness, ListenerPort::Gateway, looprpc::LIST_SWAPS, headers)
        .await
        .unwrap();
    let calls = harness.daemon(BackendName::Loop).calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].full_method, looprpc::LIST_SWAPS);
}

#[tokio::test]
async fn test_auxiliary_daemons_check_their_own_credentials() {
    let harness = Harness::new();
    for (backend, method) in CREDENTIAL_METHODS {
        if backend == BackendName::Lnd {
            continue;
        }
        let headers = auth_headers(Some(&harness.macaroon(backend)), None);
        outcome(&harness, ListenerPort::Core, method, headers)
            .await
            .unwrap_or_else(|e| panic!("{method}: {e}"));

        let headers = auth_headers(Some(&harness.foreign_macaroon(backend)), None);
        let err = outcome(&harness, ListenerPort::Core, method, headers)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownRootKey, "{method}");
        assert_eq!(harness.daemon(backend).calls().len(), 2, "{method}");
    }
}
