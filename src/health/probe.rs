// src/health/probe.rs
use crate::config::HealthCheckConfig;
use crate::proxy::Backend;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("HTTP status code : {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid health check URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A single bounded check against one backend.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, backend: &Backend) -> Result<(), ProbeError>;
}

/// `GET {scheme}://{backend}{path}`; healthy means exactly `200 OK`.
///
/// Certificates are not validated: the backends serve self-signed
/// control-plane certificates.
pub struct HttpProbe {
    client: Client,
    scheme: String,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(config: &HealthCheckConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            path: config.path.clone(),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, backend: &Backend) -> Result<(), ProbeError> {
        let url = backend.health_url(&self.scheme, &self.path)?;

        // The client carries the per-request timeout.
        let response = self.client.get(url).send().await.map_err(|err| {
            if err.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Request(err)
            }
        })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config(path: &str) -> HealthCheckConfig {
        HealthCheckConfig {
            check_period: 1,
            timeout_secs: 2,
            path: path.to_string(),
            scheme: "http".to_string(),
        }
    }

    #[tokio::test]
    async fn test_ok_is_healthy() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/healthz")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let probe = HttpProbe::new(&http_config("/healthz")).unwrap();
        let backend = Backend::from(server.host_with_port());

        assert!(probe.probe(&backend).await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_only_200_counts_as_healthy() {
        let mut server = mockito::Server::new_async().await;
        let _unavailable = server
            .mock("GET", "/healthz")
            .with_status(503)
            .create_async()
            .await;
        let _no_content = server
            .mock("GET", "/livez")
            .with_status(204)
            .create_async()
            .await;

        let backend = Backend::from(server.host_with_port());

        let probe = HttpProbe::new(&http_config("/healthz")).unwrap();
        let err = probe.probe(&backend).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status(StatusCode::SERVICE_UNAVAILABLE)));

        let probe = HttpProbe::new(&http_config("/livez")).unwrap();
        let err = probe.probe(&backend).await.unwrap_err();
        assert!(matches!(err, ProbeError::Status(StatusCode::NO_CONTENT)));
    }

    #[tokio::test]
    async fn test_silent_backend_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = http_config("/healthz");
        config.timeout_secs = 1;
        let probe = HttpProbe::new(&config).unwrap();

        let started = std::time::Instant::now();
        let err = probe.probe(&Backend::from(addr.to_string())).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(d) if d == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(&http_config("/healthz")).unwrap();
        let err = probe.probe(&Backend::from(addr.to_string())).await.unwrap_err();
        assert!(matches!(err, ProbeError::Request(_)));
    }
}
