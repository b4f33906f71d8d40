// src/load_balancer/mod.rs
mod algorithm;
mod round_robin;

pub use algorithm::LoadBalancer; // trait
pub use round_robin::RoundRobinBalancer;

use crate::proxy::{Backend, BackendPool};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no remote servers are healthy")]
    NoHealthyBackends,

    #[error("no remote servers are configured")]
    NoBackendsConfigured,
}

/// Outcome of [`BackendSelector::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub backend: Backend,
    /// `false` when the pick came from the degraded fallback over every
    /// configured backend.
    pub healthy: bool,
}

/// Chooses one backend per connection attempt.
///
/// Both the healthy path and the fallback share one cursor.
pub struct BackendSelector {
    pool: Arc<BackendPool>,
    balancer: RoundRobinBalancer,
}

impl BackendSelector {
    pub fn new(pool: Arc<BackendPool>) -> Self {
        Self {
            pool,
            balancer: RoundRobinBalancer::new(),
        }
    }

    pub async fn select_healthy(&self) -> Result<Backend, SelectError> {
        // Length and indexing both come from this one snapshot.
        let healthy = self.pool.snapshot().await;
        self.balancer
            .select_backend(healthy.backends())
            .ok_or(SelectError::NoHealthyBackends)
    }

    pub fn select_any(&self) -> Result<Backend, SelectError> {
        self.balancer
            .select_backend(self.pool.all_backends())
            .ok_or(SelectError::NoBackendsConfigured)
    }

    /// Prefer a healthy backend; otherwise try any configured one.
    pub async fn select(&self) -> Result<Selection, SelectError> {
        match self.select_healthy().await {
            Ok(backend) => Ok(Selection { backend, healthy: true }),
            Err(err) => {
                let backend = self.select_any()?;
                tracing::warn!("{}, falling back to {}", err, backend);
                Ok(Selection { backend, healthy: false })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.balancer.name()
    }
}
