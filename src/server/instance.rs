// src/server/instance.rs
use crate::config::Config;
use crate::health::{HealthChecker, HealthProbe, HttpProbe};
use crate::proxy::{BackendPool, Proxy};
use crate::server::{ConnectionHandler, ServerBuilder};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// One load balancer instance: health checker, store, selector and accept
/// loop. After `start` returns the instance is spent; build a fresh one to
/// restart.
pub struct Balancer {
    config: Config,
    pool: Arc<BackendPool>,
    probe: Arc<dyn HealthProbe>,
    shutdown_tx: watch::Sender<bool>,
}

impl Balancer {
    pub fn new(config: Config) -> Result<Self> {
        let probe = HttpProbe::new(&config.health_check).context("failed to build health probe")?;
        Ok(Self::with_probe(config, Arc::new(probe)))
    }

    pub fn with_probe(config: Config, probe: Arc<dyn HealthProbe>) -> Self {
        let pool = Arc::new(BackendPool::new(config.backends.iter().map(String::as_str)));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            pool,
            probe,
            shutdown_tx,
        }
    }

    pub fn pool(&self) -> Arc<BackendPool> {
        self.pool.clone()
    }

    /// Stop accepting; `start`/`serve` then return `Ok(())`.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Bind the configured listen address and serve until an accept-layer
    /// failure (returned as `Err`) or [`Balancer::shutdown`].
    pub async fn start(&self) -> Result<()> {
        let listener = crate::server::listener::bind_tcp(&self.config.bind_addr()).await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let checker = Arc::new(HealthChecker::new(
            self.config.health_check.clone(),
            self.pool.clone(),
            self.probe.clone(),
        ));
        let checker_task = tokio::spawn(checker.clone().start());

        let proxy = Arc::new(Proxy::new(self.pool.clone(), self.config.connect_timeout()));
        tracing::info!(
            "Balancing across {} backends ({})",
            self.pool.all_backends().len(),
            proxy.selector().name()
        );
        let result = ServerBuilder::from_listener(listener)
            .with_handler(ConnectionHandler::new(proxy))
            .with_shutdown(self.shutdown_tx.subscribe())
            .serve()
            .await;

        // A restarted instance brings its own checker.
        checker.shutdown();
        if let Err(err) = checker_task.await {
            tracing::warn!("Health checker task failed: {}", err);
        }

        result
    }
}
