//! Session lifecycle through the `litrpc.Sessions` surface.

use bytes::Bytes;
use chrono::{Duration, Utc};
use prost::Message;

use terminal_gateway::auth::ListenerPort;
use terminal_gateway::proto::litrpc::{
    self, AddSessionRequest, AddSessionResponse, ListSessionsResponse, RevokeSessionRequest,
    SessionState, SessionType,
};
use terminal_gateway::proto::{lnrpc, looprpc};
use terminal_gateway::ErrorCode;

use crate::common::{auth_headers, Harness, UI_PASSWORD};

async fn add_session(harness: &Harness, session_type: SessionType) -> AddSessionResponse {
    let request = AddSessionRequest {
        label: "mobile".to_string(),
        session_type: session_type as i32,
        expiry_timestamp_seconds: (Utc::now() + Duration::hours(2)).timestamp() as u64,
    };
    let reply = harness
        .call(
            ListenerPort::Gateway,
            litrpc::ADD_SESSION,
            auth_headers(None, Some(UI_PASSWORD)),
            Bytes::from(request.encode_to_vec()),
        )
        .await
        .unwrap();
    AddSessionResponse::decode(reply.message).unwrap()
}

async fn list_sessions(harness: &Harness) -> ListSessionsResponse {
    let reply = harness
        .call(
            ListenerPort::Gateway,
            litrpc::LIST_SESSIONS,
            auth_headers(None, Some(UI_PASSWORD)),
            Bytes::new(),
        )
        .await
        .unwrap();
    ListSessionsResponse::decode(reply.message).unwrap()
}

#[tokio::test]
async fn test_session_macaroon_opens_daemons() {
    let harness = Harness::new();
    let added = add_session(&harness, SessionType::TypeMacaroonAdmin).await;
    let session = added.session.unwrap();
    assert_eq!(session.label, "mobile");
    assert_eq!(session.session_state, SessionState::StateCreated as i32);

    for method in [lnrpc::GET_INFO, lnrpc::ADD_INVOICE, looprpc::LIST_SWAPS] {
        harness
            .call(
                ListenerPort::Core,
                method,
                auth_headers(Some(&added.macaroon), None),
                Bytes::new(),
            )
            .await
            .unwrap_or_else(|e| panic!("{method}: {e}"));
    }
}

#[tokio::test]
async fn test_read_only_session_cannot_write() {
    let harness = Harness::new();
    let added = add_session(&harness, SessionType::TypeMacaroonReadonly).await;

    harness
        .call(
            ListenerPort::Core,
            lnrpc::GET_INFO,
            auth_headers(Some(&added.macaroon), None),
            Bytes::new(),
        )
        .await
        .unwrap();

    let err = harness
        .call(
            ListenerPort::Core,
            lnrpc::ADD_INVOICE,
            auth_headers(Some(&added.macaroon), None),
            Bytes::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_revoked_session_is_refused() {
    let harness = Harness::new();
    let added = add_session(&harness, SessionType::TypeMacaroonAdmin).await;
    let id = added.session.unwrap().id;

    let revoke = RevokeSessionRequest { id: id.clone() };
    harness
        .call(
            ListenerPort::Gateway,
            litrpc::REVOKE_SESSION,
            auth_headers(None, Some(UI_PASSWORD)),
            Bytes::from(revoke.encode_to_vec()),
        )
        .await
        .unwrap();

    let err = harness
        .call(
            ListenerPort::Core,
            looprpc::LIST_SWAPS,
            auth_headers(Some(&added.macaroon), None),
            Bytes::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert_eq!(err.to_string(), "verification failed: session revoked");

    let listed = list_sessions(&harness).await;
    assert_eq!(listed.sessions.len(), 1);
    assert_eq!(listed.sessions[0].id, id);
    assert_eq!(
        listed.sessions[0].session_state,
        SessionState::StateRevoked as i32
    );
}

#[tokio::test]
async fn test_past_expiry_is_rejected() {
    let harness = Harness::new();
    let request = AddSessionRequest {
        label: "stale".to_string(),
        session_type: SessionType::TypeMacaroonAdmin as i32,
        expiry_timestamp_seconds: (Utc::now() - Duration::hours(1)).timestamp() as u64,
    };
    let err = harness
        .call(
            ListenerPort::Gateway,
            litrpc::ADD_SESSION,
            auth_headers(None, Some(UI_PASSWORD)),
            Bytes::from(request.encode_to_vec()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(list_sessions(&harness).await.sessions.is_empty());
}

#[tokio::test]
async fn test_sessions_are_listed() {
    let harness = Harness::new();
    add_session(&harness, SessionType::TypeMacaroonAdmin).await;
    add_session(&harness, SessionType::TypeMacaroonReadonly).await;
    assert_eq!(list_sessions(&harness).await.sessions.len(), 2);
    assert_eq!(harness.gateway.sessions().len(), 2);
}
