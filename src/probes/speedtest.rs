//! Three-phase bandwidth measurement: server discovery, download, upload.
//!
//! The default meter talks to Cloudflare's speed endpoints
//! (`__down?bytes=N` and `__up`). Throughput is reported in Mbps with
//! 1 Mb = 1024 * 1024 bits, so figures stay comparable with earlier runs.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info};

use crate::config::SpeedtestConfig;
use crate::error::ProbeError;

/// Server picked during discovery, with its measured round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub host: String,
    pub latency_ms: f64,
}

/// The bandwidth probe's three phases. They are called in order by the
/// orchestrator, which advances progress after each one.
#[async_trait::async_trait]
pub trait BandwidthMeter: Send + Sync {
    async fn discover_server(&self) -> Result<ServerInfo, ProbeError>;

    /// Download throughput in Mbps.
    async fn download(&self) -> Result<f64, ProbeError>;

    /// Upload throughput in Mbps.
    async fn upload(&self) -> Result<f64, ProbeError>;
}

pub struct HttpBandwidthMeter {
    client: Client,
    cfg: SpeedtestConfig,
}

impl HttpBandwidthMeter {
    pub fn new(cfg: SpeedtestConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("netdiag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ProbeError::Network {
                url: cfg.latency_url.clone(),
                source,
            })?;
        Ok(Self { client, cfg })
    }

    fn network_err(url: &str) -> impl FnOnce(reqwest::Error) -> ProbeError + '_ {
        move |source| ProbeError::Network {
            url: url.to_string(),
            source,
        }
    }

    fn check_status(url: &str, resp: &reqwest::Response) -> Result<(), ProbeError> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Http {
                url: url.to_string(),
                status: resp.status().as_u16(),
            })
        }
    }
}

#[async_trait::async_trait]
impl BandwidthMeter for HttpBandwidthMeter {
    async fn discover_server(&self) -> Result<ServerInfo, ProbeError> {
        let url = self.cfg.latency_url.as_str();
        let mut best: Option<f64> = None;

        for sample in 0..self.cfg.latency_samples.max(1) {
            let start = Instant::now();
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(Self::network_err(url))?;
            Self::check_status(url, &resp)?;
            resp.bytes().await.map_err(Self::network_err(url))?;
            let rtt = start.elapsed().as_secs_f64() * 1000.0;
            debug!(sample, rtt_ms = rtt, "latency sample");
            best = Some(best.map_or(rtt, |b: f64| b.min(rtt)));
        }

        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        let latency_ms = best.unwrap_or_default();
        info!(%host, latency_ms, "speedtest server selected");

        Ok(ServerInfo { host, latency_ms })
    }

    async fn download(&self) -> Result<f64, ProbeError> {
        let url = format!("{}?bytes={}", self.cfg.download_url, self.cfg.download_bytes);
        let start = Instant::now();

        let mut resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::network_err(&url))?;
        Self::check_status(&url, &resp)?;

        let mut received: u64 = 0;
        while let Some(chunk) = resp.chunk().await.map_err(Self::network_err(&url))? {
            received += chunk.len() as u64;
        }

        if received == 0 {
            return Err(ProbeError::BadResponse {
                url,
                reason: "download returned no data".to_string(),
            });
        }

        let mbps = megabits_per_second(received, start.elapsed());
        info!(bytes = received, mbps, "download phase complete");
        Ok(mbps)
    }

    async fn upload(&self) -> Result<f64, ProbeError> {
        let url = self.cfg.upload_url.as_str();
        let payload = vec![0u8; self.cfg.upload_bytes];
        let sent = payload.len() as u64;
        let start = Instant::now();

        let resp = self
            .client
            .post(url)
            .body(payload)
            .send()
            .await
            .map_err(Self::network_err(url))?;
        Self::check_status(url, &resp)?;
        resp.bytes().await.map_err(Self::network_err(url))?;

        let mbps = megabits_per_second(sent, start.elapsed());
        info!(bytes = sent, mbps, "upload phase complete");
        Ok(mbps)
    }
}

const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Convert a byte count over an interval into Mbps.
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / BITS_PER_MEGABIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SpeedtestConfig {
        SpeedtestConfig {
            latency_url: format!("{}/__down?bytes=0", server.uri()),
            download_url: format!("{}/__down", server.uri()),
            upload_url: format!("{}/__up", server.uri()),
            download_bytes: 4096,
            upload_bytes: 2048,
            latency_samples: 2,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_megabits_per_second() {
        assert_eq!(megabits_per_second(1_310_720, Duration::from_secs(1)), 10.0);
        assert_eq!(megabits_per_second(1_310_720, Duration::from_secs(2)), 5.0);
        // 10^6-bit megabits would read about 4.9% higher.
        assert!(megabits_per_second(1_250_000, Duration::from_secs(1)) < 9.6);
        assert_eq!(megabits_per_second(1_000, Duration::ZERO), 0.0);
    }

    #[tokio::test]
    async fn test_three_phases_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .and(query_param("bytes", "0"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .and(query_param("bytes", "4096"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/__up"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let meter = HttpBandwidthMeter::new(config_for(&server)).unwrap();

        let info = meter.discover_server().await.unwrap();
        assert_eq!(info.host, "127.0.0.1");
        assert!(info.latency_ms >= 0.0);

        assert!(meter.download().await.unwrap() > 0.0);
        assert!(meter.upload().await.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_download_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/__down"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let meter = HttpBandwidthMeter::new(config_for(&server)).unwrap();
        match meter.download().await.unwrap_err() {
            ProbeError::Http { status, .. } => assert_eq!(status, 429),
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }
}
