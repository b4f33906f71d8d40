// src/proxy/mod.rs
mod backend;
mod forward;
mod pool;
mod proxy;

pub use backend::Backend;
pub use forward::{forward, ForwardSession};
pub use pool::{BackendPool, HealthySet};
pub use proxy::{Proxy, ProxyError};
