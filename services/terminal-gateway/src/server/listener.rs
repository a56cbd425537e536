//! TLS accept loop shared by both ports.

use std::net::SocketAddr;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use super::mux::Mux;
use crate::call::PeerAddr;
use crate::shutdown::ShutdownSignal;

/// Deadline for completing a TLS handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// First pause after a failed accept.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(100);

/// Longest pause between accept attempts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause after a failed accept, doubling per consecutive failure up to a cap.
/// Accept errors such as descriptor exhaustion last until connections close.
#[derive(Debug)]
pub(crate) struct AcceptBackoff {
    next: Duration,
}

impl AcceptBackoff {
    pub(crate) fn new() -> Self {
        Self {
            next: ACCEPT_BACKOFF_INITIAL,
        }
    }

    /// Pause to take after another failure.
    pub(crate) fn failed(&mut self) -> Duration {
        let pause = self.next;
        self.next = (self.next * 2).min(ACCEPT_BACKOFF_MAX);
        pause
    }

    pub(crate) fn reset(&mut self) {
        self.next = ACCEPT_BACKOFF_INITIAL;
    }
}

/// Accept TLS connections on `listener` and serve them with `mux` until
/// shutdown. Open connections are asked to finish their in-flight requests.
pub async fn serve(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    mux: Mux,
    shutdown: ShutdownSignal,
) -> std::io::Result<()> {
    let port = mux.port();
    info!(port = %port, addr = %listener.local_addr()?, "Listener started");

    let stop = shutdown.resubscribe();
    let accept = async move {
        let mut backoff = AcceptBackoff::new();
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => {
                    backoff.reset();
                    accepted
                }
                Err(e) => {
                    let pause = backoff.failed();
                    warn!(port = %port, error = %e, retry_in = ?pause, "Accept failed");
                    tokio::time::sleep(pause).await;
                    continue;
                }
            };
            tokio::spawn(serve_connection(
                stream,
                peer,
                acceptor.clone(),
                mux.clone(),
                shutdown.resubscribe(),
            ));
        }
    };

    tokio::select! {
        () = accept => Ok(()),
        () = stop.recv() => {
            info!(port = %port, "Listener stopped accepting");
            Ok(())
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    mux: Mux,
    shutdown: ShutdownSignal,
) {
    let port = mux.port();
    let tls = match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => {
            debug!(port = %port, peer = %peer, error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            debug!(port = %port, peer = %peer, "TLS handshake timed out");
            return;
        }
    };

    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(PeerAddr(peer));
        mux.clone().handle(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(tls), service);
    tokio::pin!(connection);

    let stop = shutdown.recv();
    tokio::pin!(stop);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        () = &mut stop => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };
    if let Err(e) = result {
        debug!(port = %port, peer = %peer, error = %e, "Connection closed with error");
    }
}
