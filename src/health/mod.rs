// src/health/mod.rs
mod checker;
mod probe;

pub use checker::{HealthCheckResult, HealthChecker};
pub use probe::{HealthProbe, HttpProbe, ProbeError};
