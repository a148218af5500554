//! Public IP lookup against a plain-text echo service.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;

use crate::error::ProbeError;

/// Looks up the address the host appears as on the public internet.
#[async_trait::async_trait]
pub trait PublicIpLookup: Send + Sync {
    async fn lookup(&self) -> Result<String, ProbeError>;
}

/// Plain-text IP echo service over HTTPS (ipify by default).
pub struct HttpIpLookup {
    client: Client,
    url: String,
}

impl HttpIpLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ProbeError::Network {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl PublicIpLookup for HttpIpLookup {
    async fn lookup(&self) -> Result<String, ProbeError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| ProbeError::Network {
                url: self.url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(ProbeError::Http {
                url: self.url.clone(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| ProbeError::Network {
            url: self.url.clone(),
            source,
        })?;

        parse_ip(&body).ok_or_else(|| ProbeError::BadResponse {
            url: self.url.clone(),
            reason: format!("'{}' is not an IP address", body.trim()),
        })
    }
}

fn parse_ip(body: &str) -> Option<String> {
    let trimmed = body.trim();
    trimmed.parse::<IpAddr>().ok().map(|_| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_ip_accepts_v4_and_v6() {
        assert_eq!(parse_ip("203.0.113.7\n").as_deref(), Some("203.0.113.7"));
        assert_eq!(parse_ip("2001:db8::1").as_deref(), Some("2001:db8::1"));
        assert_eq!(parse_ip("<html>nope</html>"), None);
    }

    #[tokio::test]
    async fn test_lookup_returns_echoed_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.23"))
            .mount(&server)
            .await;

        let lookup = HttpIpLookup::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert_eq!(lookup.lookup().await.unwrap(), "198.51.100.23");
    }

    #[tokio::test]
    async fn test_lookup_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let lookup = HttpIpLookup::new(server.uri(), Duration::from_secs(5)).unwrap();
        match lookup.lookup().await.unwrap_err() {
            ProbeError::Http { status, .. } => assert_eq!(status, 503),
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lookup_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("captive portal"))
            .mount(&server)
            .await;

        let lookup = HttpIpLookup::new(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            lookup.lookup().await.unwrap_err(),
            ProbeError::BadResponse { .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let lookup = HttpIpLookup::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            lookup.lookup().await.unwrap_err(),
            ProbeError::Network { .. }
        ));
    }

    #[tokio::test]
    #[ignore = "requires internet access"]
    async fn test_live_ipify_lookup() {
        let lookup = HttpIpLookup::new("https://api.ipify.org", Duration::from_secs(10)).unwrap();
        let ip = lookup.lookup().await.unwrap();
        assert!(ip.parse::<IpAddr>().is_ok());
    }
}
