// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind so the accept loop stays protocol-agnostic.
// ────────────────────────────────
use anyhow::{Context, Result};
use tokio::net::TcpListener;

pub async fn bind_tcp(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listen address {}", addr))?;
    Ok(listener)
}
