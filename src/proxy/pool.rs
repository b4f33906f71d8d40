// src/proxy/pool.rs
use super::backend::Backend;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The backends believed healthy at one point in time.
///
/// Never mutated after construction; a new set is published instead.
#[derive(Debug)]
pub struct HealthySet {
    backends: Vec<Backend>,
    generation: u64,
    refreshed_at: DateTime<Utc>,
}

impl HealthySet {
    fn new(backends: Vec<Backend>, generation: u64) -> Self {
        Self {
            backends,
            generation,
            refreshed_at: Utc::now(),
        }
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn contains(&self, backend: &Backend) -> bool {
        self.backends.contains(backend)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }
}

/// The configured backend list plus the current healthy subset.
///
/// The healthy set is written by the health checker (and by dial-failure
/// pruning) and read by every selection.
pub struct BackendPool {
    backends: Arc<[Backend]>,
    healthy_backends: RwLock<Arc<HealthySet>>,
    generation: AtomicU64,
}

impl BackendPool {
    pub fn new<I, B>(configs: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Backend>,
    {
        let backends: Arc<[Backend]> = configs.into_iter().map(Into::<Backend>::into).collect();

        Self {
            backends,
            healthy_backends: RwLock::new(Arc::new(HealthySet::new(Vec::new(), 0))),
            generation: AtomicU64::new(0),
        }
    }

    pub fn all_backends(&self) -> &[Backend] {
        &self.backends
    }

    pub async fn snapshot(&self) -> Arc<HealthySet> {
        self.healthy_backends.read().await.clone()
    }

    /// Install `healthy` as the new healthy set and return its generation.
    /// Addresses that are not configured are dropped.
    pub async fn replace(&self, mut healthy: Vec<Backend>) -> u64 {
        healthy.retain(|backend| {
            let known = self.backends.contains(backend);
            if !known {
                tracing::warn!("Ignoring unknown backend {} in healthy set", backend);
            }
            known
        });

        let mut current = self.healthy_backends.write().await;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *current = Arc::new(HealthySet::new(healthy, generation));

        tracing::debug!(
            "Updated healthy backends: {}/{} available (generation {})",
            current.len(),
            self.backends.len(),
            generation
        );
        generation
    }

    /// Drop `backend` from the live healthy set without waiting for the next
    /// health-check tick. Returns whether it was present.
    pub async fn remove_healthy(&self, backend: &Backend) -> bool {
        let mut current = self.healthy_backends.write().await;
        if !current.contains(backend) {
            return false;
        }

        let remaining = current
            .backends()
            .iter()
            .filter(|b| *b != backend)
            .cloned()
            .collect();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *current = Arc::new(HealthySet::new(remaining, generation));

        tracing::info!(
            "Removed backend {} from healthy set: {}/{} available",
            backend,
            current.len(),
            self.backends.len()
        );
        true
    }
}
