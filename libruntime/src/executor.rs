use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::Instant;
use tracing::debug;

use libtargets::{Method, RequestTemplate};

use crate::metrics::epoch_millis;
use crate::runtime_error::RuntimeError;

/// What one attempt produced. `status` 0 marks a transport-level failure
/// (connect error, timeout, TLS) with no HTTP status to report.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub at_epoch_ms: u64,
    pub elapsed: Duration,
    pub status: u16,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Seam between the worker pool and the wire.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, template: &RequestTemplate) -> Outcome;
}

#[derive(Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// TLS verification is off unless asked for; the targets are routinely
    /// self-signed staging hosts.
    pub fn new(
        timeout: Duration,
        insecure_tls: bool,
        headers: &[(String, String)],
    ) -> Result<Self, RuntimeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(30))
            .default_headers(header_map(headers)?)
            .build()?;
        Ok(Self { client })
    }

    async fn roundtrip(&self, template: &RequestTemplate) -> reqwest::Result<u16> {
        let response = self
            .client
            .request(method_of(template.method), &template.url)
            .body(template.body.clone())
            .send()
            .await?;
        let status = response.status().as_u16();
        // drain the body so elapsed covers the full response
        response.bytes().await?;
        Ok(status)
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, template: &RequestTemplate) -> Outcome {
        let started = Instant::now();
        let status = match self.roundtrip(template).await {
            Ok(status) => status,
            Err(err) => {
                debug!(url = %template.url, error = %err, "request failed");
                0
            }
        };
        Outcome {
            at_epoch_ms: epoch_millis(),
            elapsed: started.elapsed(),
            status,
        }
    }
}

fn method_of(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, RuntimeError> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name: HeaderName = key
            .parse()
            .map_err(|_| RuntimeError::Header(key.clone()))?;
        let value: HeaderValue = value
            .parse()
            .map_err(|_| RuntimeError::Header(key.clone()))?;
        map.append(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_splits_success_from_failure_on_the_status() {
        let outcome = |status| Outcome {
            at_epoch_ms: 0,
            elapsed: Duration::from_millis(1),
            status,
        };
        assert!(outcome(200).is_success());
        assert!(outcome(204).is_success());
        assert!(!outcome(301).is_success());
        assert!(!outcome(404).is_success());
        assert!(!outcome(0).is_success());
    }

    #[test]
    fn it_rejects_headers_reqwest_cannot_carry() {
        let headers = vec![("bad header name".to_string(), "x".to_string())];
        let err = HttpExecutor::new(Duration::from_secs(1), true, &headers).unwrap_err();
        assert!(matches!(err, RuntimeError::Header(_)));
    }
}
