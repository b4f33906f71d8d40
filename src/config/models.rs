// src/config/models.rs
use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen_addr: String,

    #[serde(alias = "kube_apiservers")]
    pub backends: Vec<String>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    /// Seconds to sleep between two health-check ticks.
    #[serde(default = "default_check_period")]
    pub check_period: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_health_path")]
    pub path: String,

    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_check_period() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_health_path() -> String {
    "/healthz".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_restart_delay_secs() -> u64 {
    1
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_period: default_check_period(),
            timeout_secs: default_timeout_secs(),
            path: default_health_path(),
            scheme: default_scheme(),
        }
    }
}

impl HealthCheckConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.check_period)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Address handed to the listener. An empty host (`:6443`) binds every
    /// IPv4 interface (`0.0.0.0`); set `[::]:6443` explicitly for a dual-stack
    /// listener where the host allows it.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            bail!("listen_addr must not be empty");
        }

        if self.backends.is_empty() {
            bail!("at least one backend must be configured");
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            validate_host_port(backend)?;
            if !seen.insert(backend.as_str()) {
                bail!("duplicate backend address: {}", backend);
            }
        }

        let hc = &self.health_check;
        if hc.check_period == 0 {
            bail!("health_check.check_period must be greater than zero");
        }
        if hc.timeout_secs == 0 {
            bail!("health_check.timeout_secs must be greater than zero");
        }
        if !hc.path.starts_with('/') {
            bail!("health_check.path must start with '/': {}", hc.path);
        }
        if hc.scheme != "http" && hc.scheme != "https" {
            bail!("health_check.scheme must be http or https, got {}", hc.scheme);
        }

        if self.connect_timeout_secs == 0 {
            bail!("connect_timeout_secs must be greater than zero");
        }

        Ok(())
    }
}

fn validate_host_port(addr: &str) -> Result<()> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        bail!("backend address must be host:port, got {}", addr);
    };

    if host.is_empty() {
        bail!("backend address has an empty host: {}", addr);
    }

    if port.parse::<u16>().is_err() {
        bail!("backend address has an invalid port: {}", addr);
    }

    Ok(())
}
