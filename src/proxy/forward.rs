// src/proxy/forward.rs
//
// Two copy tasks per connection pair. Whichever direction finishes first
// fires the shared close signal so the other one stops as well.
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument};

/// Idempotent "close the whole pair" signal shared by both directions.
struct PairCloser {
    tx: watch::Sender<bool>,
}

impl PairCloser {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    fn close(&self) {
        self.tx.send_replace(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Handles to the two directions of a forwarded pair.
///
/// Dropping it detaches both tasks; the pair still cleans up on its own.
pub struct ForwardSession {
    upstream: JoinHandle<u64>,
    downstream: JoinHandle<u64>,
}

impl ForwardSession {
    /// Wait for both directions and return `(client_to_backend, backend_to_client)`
    /// byte counts.
    pub async fn finished(self) -> (u64, u64) {
        let upstream = self.upstream.await.unwrap_or_default();
        let downstream = self.downstream.await.unwrap_or_default();
        (upstream, downstream)
    }
}

/// Relay bytes between `client` and `backend` until either side is done.
pub fn forward(client: TcpStream, backend: TcpStream) -> ForwardSession {
    let closer = Arc::new(PairCloser::new());
    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let upstream = tokio::spawn(
        pump("client->backend", client_read, backend_write, closer.clone()).in_current_span(),
    );
    let downstream = tokio::spawn(
        pump("backend->client", backend_read, client_write, closer).in_current_span(),
    );

    ForwardSession { upstream, downstream }
}

async fn pump(
    direction: &'static str,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    closer: Arc<PairCloser>,
) -> u64 {
    let mut closed = closer.subscribe();

    let copied = tokio::select! {
        result = tokio::io::copy(&mut reader, &mut writer) => Some(result),
        _ = wait_closed(&mut closed) => None,
    };

    let bytes = match copied {
        Some(Ok(n)) => {
            debug!("{}: end of stream after {} bytes", direction, n);
            n
        }
        Some(Err(err)) => {
            warn!("{}: io copy error: {}", direction, err);
            0
        }
        None => {
            debug!("{}: peer direction closed the pair", direction);
            0
        }
    };

    close_and_log(direction, &mut writer).await;
    closer.close();
    bytes
}

async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn close_and_log(direction: &'static str, writer: &mut OwnedWriteHalf) {
    if let Err(err) = writer.shutdown().await {
        // The peer may already have torn the socket down.
        if err.kind() != io::ErrorKind::NotConnected {
            warn!("{}: error closing socket: {}", direction, err);
        }
    }
}
