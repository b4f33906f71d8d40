// ────────────────────────────────
// src/proxy/proxy.rs
// Routes one accepted connection: select, dial, forward.
// ────────────────────────────────

use super::backend::Backend;
use super::forward::{forward, ForwardSession};
use super::pool::BackendPool;
use crate::load_balancer::{BackendSelector, SelectError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

pub struct Proxy {
    pool: Arc<BackendPool>,
    selector: BackendSelector,
    connect_timeout: Duration,
}

impl Proxy {
    pub fn new(pool: Arc<BackendPool>, connect_timeout: Duration) -> Self {
        Self {
            selector: BackendSelector::new(pool.clone()),
            pool,
            connect_timeout,
        }
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    /// Pick a backend for `client`, dial it and start forwarding.
    ///
    /// On error the client socket is dropped, which closes it.
    pub async fn handle(
        &self,
        client: TcpStream,
        peer: SocketAddr,
    ) -> Result<ForwardSession, ProxyError> {
        let selection = self.selector.select().await?;
        let backend = selection.backend;

        let remote = match timeout(self.connect_timeout, TcpStream::connect(backend.addr())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.pool.remove_healthy(&backend).await;
                return Err(ProxyError::Dial { backend, source });
            }
            Err(_) => {
                self.pool.remove_healthy(&backend).await;
                return Err(ProxyError::DialTimeout {
                    backend,
                    timeout: self.connect_timeout,
                });
            }
        };

        debug!(
            "Forwarding {} to {} (healthy: {})",
            peer, backend, selection.healthy
        );
        if let Err(err) = remote.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY towards {}: {}", backend, err);
        }

        Ok(forward(client, remote))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    NoBackend(#[from] SelectError),

    #[error("failed to dial backend {backend}: {source}")]
    Dial {
        backend: Backend,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {timeout:?} dialing backend {backend}")]
    DialTimeout { backend: Backend, timeout: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn accepted_client() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (accepted, peer) = accepted.unwrap();
        (connected.unwrap(), accepted, peer)
    }

    /// An address nothing listens on.
    async fn dead_addr() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    #[tokio::test]
    async fn test_dial_failure_prunes_backend() {
        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_addr = live.local_addr().unwrap().to_string();
        let dead = dead_addr().await;

        let pool = Arc::new(BackendPool::new([dead.clone(), live_addr.clone()]));
        pool.replace(vec![dead.clone().into(), live_addr.clone().into()]).await;
        let proxy = Proxy::new(pool.clone(), Duration::from_secs(2));

        let (_client, accepted, peer) = accepted_client().await;
        let err = proxy.handle(accepted, peer).await.err().unwrap();
        assert!(matches!(err, ProxyError::Dial { ref backend, .. } if *backend == Backend::from(dead.clone())));

        let snapshot = pool.snapshot().await;
        assert_eq!(snapshot.backends(), &[Backend::from(live_addr.clone())]);

        // The next selection only sees the remaining backend.
        for _ in 0..3 {
            assert_eq!(
                proxy.selector().select_healthy().await.unwrap(),
                Backend::from(live_addr.clone())
            );
        }
    }

    #[tokio::test]
    async fn test_forwards_to_selected_backend() {
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap().to_string();

        let pool = Arc::new(BackendPool::new([backend_addr.clone()]));
        pool.replace(vec![backend_addr.into()]).await;
        let proxy = Proxy::new(pool, Duration::from_secs(2));

        let (mut client, accepted, peer) = accepted_client().await;
        let _session = proxy.handle(accepted, peer).await.unwrap();
        let (mut remote, _) = backend.accept().await.unwrap();

        client.write_all(b"GET /version").await.unwrap();
        let mut buf = [0u8; 12];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"GET /version");
    }

    #[tokio::test]
    async fn test_no_backends_configured() {
        let pool = Arc::new(BackendPool::new(Vec::<String>::new()));
        let proxy = Proxy::new(pool, Duration::from_secs(1));

        let (_client, accepted, peer) = accepted_client().await;
        let err = proxy.handle(accepted, peer).await.err().unwrap();
        assert!(matches!(err, ProxyError::NoBackend(SelectError::NoBackendsConfigured)));
    }
}
