// src/health/checker.rs
use crate::config::HealthCheckConfig;
use crate::health::HealthProbe;
use crate::proxy::{Backend, BackendPool};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Probes every configured backend once per tick and publishes the healthy
/// subset, replacing the previous set.
pub struct HealthChecker {
    config: HealthCheckConfig,
    pool: Arc<BackendPool>,
    probe: Arc<dyn HealthProbe>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct HealthCheckResult {
    pub backend: Backend,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl HealthChecker {
    pub fn new(
        config: HealthCheckConfig,
        pool: Arc<BackendPool>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Self {
            config,
            pool,
            probe,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Run until [`HealthChecker::shutdown`] is called. The first tick runs
    /// immediately.
    pub async fn start(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting health checker with period: {:?}",
            self.config.period()
        );

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            // A stop request abandons the in-flight tick.
            tokio::select! {
                _ = self.check_all_backends() => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = sleep(self.config.period()) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Health checker shutting down");
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One tick: probe every backend and publish the result. Returns the
    /// generation of the published set.
    pub async fn check_all_backends(&self) -> u64 {
        let backends = self.pool.all_backends();

        // join_all keeps the configured order.
        let results =
            futures::future::join_all(backends.iter().map(|b| self.check_backend(b))).await;

        let mut healthy = Vec::with_capacity(results.len());
        for result in results {
            if result.healthy {
                debug!(
                    "Backend {} is healthy ({} ms)",
                    result.backend, result.response_time_ms
                );
                healthy.push(result.backend);
            } else {
                warn!(
                    "Backend {} is not healthy : {}",
                    result.backend,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        let healthy_count = healthy.len();
        let generation = self.pool.replace(healthy).await;

        debug!(
            "Health check complete: {} healthy, {} unhealthy",
            healthy_count,
            backends.len() - healthy_count
        );
        generation
    }

    async fn check_backend(&self, backend: &Backend) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let outcome = self.probe.probe(backend).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        HealthCheckResult {
            backend: backend.clone(),
            healthy: outcome.is_ok(),
            response_time_ms,
            error: outcome.err().map(|e| e.to_string()),
        }
    }
}
