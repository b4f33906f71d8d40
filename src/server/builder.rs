// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::handler::ConnectionHandler;
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// Builder for the accept loop, so the instance can inject its handler and
/// stop signal.
pub struct ServerBuilder {
    bind: Bind,
    handler: Option<ConnectionHandler>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ServerBuilder {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            bind: Bind::Addr(addr.into()),
            handler: None,
            shutdown: None,
        }
    }

    /// Serve on a listener that is already bound.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self {
            bind: Bind::Listener(listener),
            handler: None,
            shutdown: None,
        }
    }

    pub fn with_handler(mut self, handler: ConnectionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The loop returns `Ok(())` once `shutdown` turns `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Bind if needed, then accept until shutdown or an accept error.
    pub async fn serve(self) -> Result<()> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        let listener = match self.bind {
            Bind::Addr(addr) => bind_tcp(&addr).await?,
            Bind::Listener(listener) => listener,
        };
        let local = listener.local_addr().context("listener has no local address")?;
        tracing::info!("Load balancer listening on {}", local);

        // Without a stop signal the loop only ends on an accept error.
        let (_keep_open, idle) = watch::channel(false);
        let mut shutdown = self.shutdown.unwrap_or(idle);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.map_err(|err| {
                        tracing::error!("Error accepting connections in lb : {}", err);
                        anyhow::Error::new(err).context("accept failed")
                    })?;
                    handler.handle(stream, peer);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Load balancer on {} stopped accepting", local);
        Ok(())
    }
}
