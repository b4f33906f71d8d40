// src/server/handler.rs
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::Instrument;
use uuid::Uuid;

use crate::proxy::Proxy;

/// Hands each accepted connection to the proxy on its own task.
#[derive(Clone)]
pub struct ConnectionHandler {
    proxy: Arc<Proxy>,
}

impl ConnectionHandler {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    pub fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        let proxy = self.proxy.clone();
        let span = tracing::info_span!("conn", id = %Uuid::new_v4(), %peer);

        tokio::spawn(
            async move {
                // The forwarding tasks run detached; nothing to wait on here.
                if let Err(err) = proxy.handle(stream, peer).await {
                    tracing::warn!("Error trying to forward {}: {}", peer, err);
                }
            }
            .instrument(span),
        );
    }
}
