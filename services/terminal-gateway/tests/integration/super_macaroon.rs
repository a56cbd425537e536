//! Super macaroons baked by the gateway, accepted by every daemon.

use bytes::Bytes;
use chrono::{Duration, Utc};

use terminal_gateway::auth::{Grant, ListenerPort};
use terminal_gateway::bakery::{BakeRequest, SuperMacaroon};
use terminal_gateway::endpoints::{BackendName, EndpointDescriptor};
use terminal_gateway::macaroon::time_before_caveat;
use terminal_gateway::proto::{frdrpc, lnrpc, looprpc};
use terminal_gateway::rootkey::RootKeyId;
use terminal_gateway::ErrorCode;

use crate::common::{auth_headers, Harness};

const SUFFIX: [u8; 4] = [0x0a, 0x0b, 0x0c, 0x0d];

async fn bake(harness: &Harness, request: BakeRequest) -> SuperMacaroon {
    harness.gateway.baker().bake(request).await.unwrap()
}

fn credential_methods(harness: &Harness) -> Vec<EndpointDescriptor> {
    harness
        .endpoints
        .descriptors()
        .filter(|d| d.backend != BackendName::Lit)
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_admin_super_macaroon_opens_every_credential_method() {
    let harness = Harness::new();
    let baked = bake(&harness, BakeRequest::new(RootKeyId::new_super(SUFFIX))).await;
    assert_eq!(baked.root_key_id(), Some(RootKeyId::new_super(SUFFIX)));
    let credential = baked.to_hex();

    for port in [ListenerPort::Gateway, ListenerPort::Core] {
        for descriptor in credential_methods(&harness) {
            let headers = auth_headers(Some(&credential), None);
            harness
                .call(port, descriptor.full_method, headers, Bytes::new())
                .await
                .unwrap_or_else(|e| panic!("{} on {port}: {e}", descriptor.full_method));

            match harness.daemon(descriptor.backend).last_grant() {
                Some(Grant::Credential(verified)) => assert!(verified.super_credential),
                other => panic!("unexpected grant {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_read_only_super_macaroon_opens_read_methods_only() {
    let harness = Harness::new();
    let baked = bake(
        &harness,
        BakeRequest::new(RootKeyId::new_super(SUFFIX)).read_only(true),
    )
    .await;
    assert!(baked.permissions().iter().all(|p| p.is_read_only()));
    let credential = baked.to_hex();

    for descriptor in credential_methods(&harness) {
        let headers = auth_headers(Some(&credential), None);
        let result = harness
            .call(ListenerPort::Core, descriptor.full_method, headers, Bytes::new())
            .await;
        let read_only = descriptor.permissions.iter().all(|p| p.is_read_only());
        match result {
            Ok(_) => assert!(read_only, "{} should be refused", descriptor.full_method),
            Err(err) => {
                assert!(!read_only, "{}: {err}", descriptor.full_method);
                assert_eq!(err.code(), ErrorCode::Unauthorized);
            }
        }
    }

    for method in [lnrpc::GET_INFO, looprpc::LIST_SWAPS, frdrpc::REVENUE_REPORT] {
        let headers = auth_headers(Some(&credential), None);
        harness
            .call(ListenerPort::Core, method, headers, Bytes::new())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_expired_caveat_is_refused() {
    let harness = Harness::new();
    let baked = bake(
        &harness,
        BakeRequest::new(RootKeyId::new_super(SUFFIX))
            .with_caveat(time_before_caveat(Utc::now() - Duration::minutes(5))),
    )
    .await;

    let headers = auth_headers(Some(&baked.to_hex()), None);
    let err = harness
        .call(ListenerPort::Core, lnrpc::GET_INFO, headers, Bytes::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn test_future_caveat_is_accepted() {
    let harness = Harness::new();
    let baked = bake(
        &harness,
        BakeRequest::new(RootKeyId::new_super(SUFFIX))
            .with_caveat(time_before_caveat(Utc::now() + Duration::hours(1))),
    )
    .await;

    let headers = auth_headers(Some(&baked.to_hex()), None);
    harness
        .call(ListenerPort::Core, looprpc::LIST_SWAPS, headers, Bytes::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_root_key_outside_super_namespace_is_refused() {
    let harness = Harness::new();
    let result = harness
        .gateway
        .baker()
        .bake(BakeRequest::new(RootKeyId::DEFAULT))
        .await;
    assert!(result.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_written_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let harness = Harness::new();
    let baked = bake(&harness, BakeRequest::new(RootKeyId::new_super(SUFFIX))).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("super.macaroon");
    baked.write_to_file(&path).unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), baked.to_hex());
}
