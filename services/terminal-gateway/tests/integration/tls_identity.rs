//! Both listeners present the same certificate over real TLS connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use terminal_gateway::auth::ListenerPort;
use terminal_gateway::server::{self, TlsIdentity};
use terminal_gateway::shutdown::ShutdownCoordinator;

use crate::common::{Harness, UI_MARKER};

fn identity() -> TlsIdentity {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    TlsIdentity::from_pem(
        certified.cert.pem().as_bytes(),
        certified.key_pair.serialize_pem().as_bytes(),
    )
    .unwrap()
}

fn client_config(trusted: &[u8]) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(trusted.to_vec())).unwrap();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

async fn connect(addr: SocketAddr, config: Arc<ClientConfig>) -> TlsStream<TcpStream> {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    TlsConnector::from(config).connect(name, tcp).await.unwrap()
}

fn peer_leaf(stream: &TlsStream<TcpStream>) -> Vec<u8> {
    let (_, session) = stream.get_ref();
    session.peer_certificates().unwrap()[0].as_ref().to_vec()
}

/// Bind both listeners on ephemeral ports and serve them.
async fn start(
    harness: &Harness,
    identity: &TlsIdentity,
) -> (ShutdownCoordinator, SocketAddr, SocketAddr) {
    let mut coordinator = ShutdownCoordinator::new();
    let mut addrs = Vec::new();
    for port in [ListenerPort::Gateway, ListenerPort::Core] {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addrs.push(listener.local_addr().unwrap());
        let acceptor = identity.acceptor().unwrap();
        let mux = harness.gateway.mux(port);
        coordinator.spawn("listener", move |signal| {
            server::serve(listener, acceptor, mux, signal)
        });
    }
    (coordinator, addrs[0], addrs[1])
}

#[tokio::test]
async fn test_both_ports_present_the_same_certificate() {
    let harness = Harness::new();
    let identity = identity();
    let (coordinator, gateway_addr, core_addr) = start(&harness, &identity).await;
    let config = client_config(identity.leaf_der());

    let gateway = connect(gateway_addr, config.clone()).await;
    let core = connect(core_addr, config).await;

    assert_eq!(peer_leaf(&gateway), identity.leaf_der());
    assert_eq!(peer_leaf(&core), peer_leaf(&gateway));

    coordinator.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_ui_is_served_over_tls() {
    let harness = Harness::new();
    let identity = identity();
    let (coordinator, gateway_addr, _) = start(&harness, &identity).await;

    let mut stream = connect(gateway_addr, client_config(identity.leaf_der())).await;
    let (_, session) = stream.get_ref();
    assert_eq!(session.alpn_protocol(), Some(&b"http/1.1"[..]));

    stream
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut received = Vec::new();
    let read = async {
        let mut chunk = [0u8; 4096];
        while !String::from_utf8_lossy(&received).contains(UI_MARKER) {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&chunk[..n]),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .unwrap();

    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200"), "{text}");
    assert!(text.contains(UI_MARKER));

    coordinator.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_untrusted_client_fails_handshake() {
    let harness = Harness::new();
    let identity = identity();
    let (coordinator, gateway_addr, _) = start(&harness, &identity).await;

    let other = self::identity();
    let tcp = TcpStream::connect(gateway_addr).await.unwrap();
    let name = ServerName::try_from("localhost").unwrap();
    let result = TlsConnector::from(client_config(other.leaf_der()))
        .connect(name, tcp)
        .await;
    assert!(result.is_err());

    coordinator.shutdown(Duration::from_secs(1)).await;
}
