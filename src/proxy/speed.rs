//! Download throughput measurement through a proxy

use crate::proxy::models::{ProbeFailure, ProxyEndpoint, SpeedResult};
use crate::proxy::parser::ProxyParser;
use crate::proxy::scanner::Probe;
use crate::proxy::transport::{Transport, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default timeout for the whole download in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default payload size in bytes
pub const DEFAULT_PAYLOAD_BYTES: u64 = 1_000_000;

/// Default payload URL, serving exactly [`DEFAULT_PAYLOAD_BYTES`]
pub const DEFAULT_PAYLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=1000000";

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_048_576.0;

/// Configuration for the speed test
#[derive(Debug, Clone)]
pub struct SpeedConfig {
    /// Timeout for the whole download
    pub timeout: Duration,
    /// Payload to download
    pub url: String,
    /// Bytes the payload is expected to contain
    pub expected_bytes: u64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            url: DEFAULT_PAYLOAD_URL.to_string(),
            expected_bytes: DEFAULT_PAYLOAD_BYTES,
        }
    }
}

impl SpeedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_payload(mut self, url: String, expected_bytes: u64) -> Self {
        self.url = url;
        self.expected_bytes = expected_bytes;
        self
    }
}

/// Megabits per second (binary mega) for `bytes` received in `elapsed`
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> f64 {
    bytes as f64 * BITS_PER_BYTE / elapsed.as_secs_f64() / BITS_PER_MEGABIT
}

/// Measures download throughput through proxies
pub struct SpeedProbe<T: Transport> {
    config: SpeedConfig,
    transport: Arc<T>,
}

impl<T: Transport> SpeedProbe<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, SpeedConfig::default())
    }

    pub fn with_config(transport: Arc<T>, config: SpeedConfig) -> Self {
        Self { config, transport }
    }

    /// Count the bytes of a streamed download; returns the total and the elapsed time
    async fn download(&self, endpoint: &ProxyEndpoint) -> Result<(u64, Duration), TransportError> {
        let start = Instant::now();
        let mut chunks = self
            .transport
            .download(endpoint, &self.config.url, self.config.timeout)
            .await?;

        let mut received: u64 = 0;
        while let Some(chunk) = chunks.next().await {
            received += chunk? as u64;
        }
        Ok((received, start.elapsed()))
    }

    /// Download the payload once and compute throughput.
    ///
    /// A short or interrupted download is a failure; it is never extrapolated.
    pub async fn measure_speed(&self, order: usize, raw: &str) -> SpeedResult {
        let endpoint = match ProxyParser::parse_endpoint(raw) {
            Ok(endpoint) => endpoint,
            Err(e) => return SpeedResult::failed(order, raw, None, e.into()),
        };

        let expected = self.config.expected_bytes;
        let outcome = tokio::time::timeout(self.config.timeout, self.download(&endpoint)).await;
        let failure = match outcome {
            Ok(Ok((received, elapsed))) if received >= expected && !elapsed.is_zero() => {
                let mbps = throughput_mbps(expected, elapsed);
                debug!(proxy = %endpoint, mbps, "speed test finished");
                return SpeedResult::measured(order, endpoint, mbps);
            }
            Ok(Ok((received, _))) if received < expected => {
                ProbeFailure::ShortDownload { received, expected }
            }
            Ok(Ok(_)) => ProbeFailure::UnexpectedResponse("download took no measurable time".to_string()),
            Ok(Err(e)) => ProbeFailure::Network(e),
            Err(_) => ProbeFailure::Network(TransportError::Timeout),
        };

        debug!(proxy = %endpoint, reason = %failure, "speed test failed");
        SpeedResult::failed(order, raw, Some(endpoint), failure)
    }
}

#[async_trait]
impl<T: Transport> Probe for SpeedProbe<T> {
    type Output = SpeedResult;

    async fn run(&self, order: usize, raw: &str) -> SpeedResult {
        self.measure_speed(order, raw).await
    }

    fn abandoned(&self, order: usize, raw: &str, reason: String) -> SpeedResult {
        let endpoint = ProxyParser::parse_endpoint(raw).ok();
        SpeedResult::failed(order, raw, endpoint, ProbeFailure::Aborted(reason))
    }
}
