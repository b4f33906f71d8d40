// src/load_balancer/algorithm.rs
use crate::proxy::Backend;

pub trait LoadBalancer: Send + Sync {
    /// Pick one backend from `backends`, or `None` if the slice is empty.
    fn select_backend(&self, backends: &[Backend]) -> Option<Backend>;

    fn name(&self) -> &'static str;
}
