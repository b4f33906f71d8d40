// src/proxy/backend.rs
use std::fmt;
use std::sync::Arc;
use url::Url;

/// One candidate server, identified by its `host:port` address.
///
/// Cheap to clone; the address is shared and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Backend {
    addr: Arc<str>,
}

impl Backend {
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// URL of the health endpoint on this backend, e.g. `https://10.0.0.1:6443/healthz`.
    pub fn health_url(&self, scheme: &str, path: &str) -> Result<Url, url::ParseError> {
        let base = Url::parse(&format!("{}://{}", scheme, self.addr))?;
        base.join(path)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

impl From<&str> for Backend {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

impl From<String> for Backend {
    fn from(addr: String) -> Self {
        Self::new(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        let backend = Backend::from("10.0.0.1:6443");
        let url = backend.health_url("https", "/healthz").unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.1:6443/healthz");

        let backend = Backend::from("api.internal:8443");
        let url = backend.health_url("http", "/readyz").unwrap();
        assert_eq!(url.as_str(), "http://api.internal:8443/readyz");
    }

    #[test]
    fn test_equality_is_by_address() {
        assert_eq!(Backend::from("a:1"), Backend::from(String::from("a:1")));
        assert_ne!(Backend::from("a:1"), Backend::from("a:2"));
    }
}
