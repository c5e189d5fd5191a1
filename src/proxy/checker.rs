//! Proxy checker module: soft, hard and anonymity probes

use crate::config::ScanConfig;
use crate::proxy::models::{
    AnonymityGrade, CheckKind, ProbeFailure, ProbeResult, ProxyEndpoint,
};
use crate::proxy::parser::ProxyParser;
use crate::proxy::scanner::Probe;
use crate::proxy::transport::{HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default timeout for the soft check and the anonymity probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default timeout for each hard check target in seconds
const DEFAULT_HARD_TIMEOUT_SECS: u64 = 15;

/// Default canary URL for the soft check
pub const DEFAULT_CANARY_URL: &str = "https://www.example.com";

/// Text the canary page must contain
pub const DEFAULT_CANARY_MARKER: &str = "Example Domain";

/// Default header-echo page used to grade anonymity
pub const DEFAULT_ANONYMITY_URL: &str = "http://azenv.net/";

const FORWARDED_FOR_MARKER: &str = "HTTP_X_FORWARDED_FOR";
const VIA_MARKER: &str = "HTTP_VIA";

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for the canary request
    pub soft_timeout: Duration,
    /// Timeout for each hard check target
    pub hard_timeout: Duration,
    /// Timeout for the anonymity probe
    pub anonymity_timeout: Duration,
    /// URL the soft check fetches
    pub canary_url: String,
    /// Substring the canary body must contain
    pub canary_marker: String,
    /// Header-echo page for anonymity grading
    pub anonymity_url: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            soft_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            hard_timeout: Duration::from_secs(DEFAULT_HARD_TIMEOUT_SECS),
            anonymity_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            canary_url: DEFAULT_CANARY_URL.to_string(),
            canary_marker: DEFAULT_CANARY_MARKER.to_string(),
            anonymity_url: DEFAULT_ANONYMITY_URL.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_soft_timeout(mut self, timeout: Duration) -> Self {
        self.soft_timeout = timeout;
        self
    }

    pub fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = timeout;
        self
    }

    pub fn with_anonymity_timeout(mut self, timeout: Duration) -> Self {
        self.anonymity_timeout = timeout;
        self
    }

    pub fn with_canary(mut self, url: String, marker: String) -> Self {
        self.canary_url = url;
        self.canary_marker = marker;
        self
    }

    pub fn with_anonymity_url(mut self, url: String) -> Self {
        self.anonymity_url = url;
        self
    }
}

/// Which validation a scan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckMode {
    /// Canary page only
    Soft,
    /// Every target must answer, in order
    Hard { targets: Vec<String> },
}

impl CheckMode {
    /// Hard mode with the targets captured from a configuration snapshot
    pub fn hard_from(config: &ScanConfig) -> Self {
        CheckMode::Hard {
            targets: config.hard_check_sites.clone(),
        }
    }

    pub fn kind(&self) -> CheckKind {
        match self {
            CheckMode::Soft => CheckKind::Soft,
            CheckMode::Hard { .. } => CheckKind::Hard,
        }
    }
}

/// Grade anonymity from the body of a header-echo page
pub fn classify_body(body: &str) -> AnonymityGrade {
    if body.contains(FORWARDED_FOR_MARKER) {
        AnonymityGrade::Transparent
    } else if body.contains(VIA_MARKER) {
        AnonymityGrade::Anonymous
    } else {
        AnonymityGrade::Elite
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Proxy checker for validating proxies
pub struct ProxyChecker<T: Transport> {
    config: CheckerConfig,
    transport: Arc<T>,
}

impl<T: Transport> ProxyChecker<T> {
    /// Create a new proxy checker with default configuration
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(transport: Arc<T>, config: CheckerConfig) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// GET through the proxy, bounded by `timeout` even if the transport ignores it
    async fn fetch(
        &self,
        endpoint: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        match tokio::time::timeout(timeout, self.transport.get(endpoint, url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Grade how much the proxy leaks about the client.
    ///
    /// Returns `Unknown` if the header-echo page cannot be fetched.
    pub async fn classify_anonymity(&self, endpoint: &ProxyEndpoint) -> AnonymityGrade {
        match self
            .fetch(endpoint, &self.config.anonymity_url, self.config.anonymity_timeout)
            .await
        {
            Ok(response) if response.is_success() => classify_body(&response.body),
            Ok(response) => {
                debug!(proxy = %endpoint, status = response.status, "anonymity probe rejected");
                AnonymityGrade::Unknown
            }
            Err(e) => {
                debug!(proxy = %endpoint, error = %e, "anonymity probe failed");
                AnonymityGrade::Unknown
            }
        }
    }

    /// Single canary request; the page must come back 200 with the marker text
    pub async fn soft_check(&self, order: usize, raw: &str) -> ProbeResult {
        let endpoint = match ProxyParser::parse_endpoint(raw) {
            Ok(endpoint) => endpoint,
            Err(e) => return ProbeResult::failed(order, raw, None, CheckKind::Soft, e.into()),
        };

        let start = Instant::now();
        let failure = match self
            .fetch(&endpoint, &self.config.canary_url, self.config.soft_timeout)
            .await
        {
            Ok(response) if response.status == 200 && response.body.contains(&self.config.canary_marker) => {
                let latency = elapsed_ms(start);
                let anonymity = self.classify_anonymity(&endpoint).await;
                debug!(proxy = %endpoint, latency_ms = latency, %anonymity, "soft check passed");
                return ProbeResult::working(order, endpoint, CheckKind::Soft, latency, anonymity);
            }
            Ok(response) if response.status != 200 => {
                ProbeFailure::UnexpectedResponse(format!("HTTP status: {}", response.status))
            }
            Ok(_) => ProbeFailure::UnexpectedResponse("canary marker missing".to_string()),
            Err(e) => ProbeFailure::Network(e),
        };

        debug!(proxy = %endpoint, reason = %failure, "soft check failed");
        ProbeResult::failed(order, raw, Some(endpoint), CheckKind::Soft, failure)
    }

    /// Fetch every target in order; the first failure fails the proxy
    pub async fn hard_check(&self, order: usize, raw: &str, targets: &[String]) -> ProbeResult {
        let endpoint = match ProxyParser::parse_endpoint(raw) {
            Ok(endpoint) => endpoint,
            Err(e) => return ProbeResult::failed(order, raw, None, CheckKind::Hard, e.into()),
        };

        let start = Instant::now();
        for target in targets {
            let reason = match self.fetch(&endpoint, target, self.config.hard_timeout).await {
                Ok(response) if response.is_success() && !response.body.is_empty() => continue,
                Ok(response) if !response.is_success() => format!("HTTP status: {}", response.status),
                Ok(_) => "empty body".to_string(),
                Err(e) => e.to_string(),
            };

            debug!(proxy = %endpoint, %target, %reason, "hard check failed");
            let failure = ProbeFailure::StrictTarget {
                target: target.clone(),
                reason,
            };
            return ProbeResult::failed(order, raw, Some(endpoint), CheckKind::Hard, failure);
        }

        let latency = elapsed_ms(start);
        let anonymity = self.classify_anonymity(&endpoint).await;
        debug!(proxy = %endpoint, latency_ms = latency, %anonymity, "hard check passed");
        ProbeResult::working(order, endpoint, CheckKind::Hard, latency, anonymity)
    }

    /// Run whichever check `mode` selects
    pub async fn check(&self, order: usize, raw: &str, mode: &CheckMode) -> ProbeResult {
        match mode {
            CheckMode::Soft => self.soft_check(order, raw).await,
            CheckMode::Hard { targets } => self.hard_check(order, raw, targets).await,
        }
    }
}

impl<T: Transport> Clone for ProxyChecker<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

/// Soft or hard check packaged for the scanner
pub struct ValidationProbe<T: Transport> {
    checker: ProxyChecker<T>,
    mode: CheckMode,
}

impl<T: Transport> ValidationProbe<T> {
    pub fn new(checker: ProxyChecker<T>, mode: CheckMode) -> Self {
        Self { checker, mode }
    }

    pub fn mode(&self) -> &CheckMode {
        &self.mode
    }
}

#[async_trait]
impl<T: Transport> Probe for ValidationProbe<T> {
    type Output = ProbeResult;

    async fn run(&self, order: usize, raw: &str) -> ProbeResult {
        self.checker.check(order, raw, &self.mode).await
    }

    fn abandoned(&self, order: usize, raw: &str, reason: String) -> ProbeResult {
        let endpoint = ProxyParser::parse_endpoint(raw).ok();
        ProbeResult::failed(order, raw, endpoint, self.mode.kind(), ProbeFailure::Aborted(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::transport::ReqwestTransport;

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.soft_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.hard_timeout, Duration::from_secs(DEFAULT_HARD_TIMEOUT_SECS));
        assert_eq!(config.anonymity_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.canary_url, DEFAULT_CANARY_URL);
        assert_eq!(config.canary_marker, DEFAULT_CANARY_MARKER);
        assert_eq!(config.anonymity_url, DEFAULT_ANONYMITY_URL);
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_soft_timeout(Duration::from_secs(3))
            .with_hard_timeout(Duration::from_secs(30))
            .with_anonymity_timeout(Duration::from_secs(5))
            .with_canary("http://canary.test".to_string(), "tweet".to_string())
            .with_anonymity_url("http://echo.test".to_string());

        assert_eq!(config.soft_timeout, Duration::from_secs(3));
        assert_eq!(config.hard_timeout, Duration::from_secs(30));
        assert_eq!(config.anonymity_timeout, Duration::from_secs(5));
        assert_eq!(config.canary_url, "http://canary.test");
        assert_eq!(config.canary_marker, "tweet");
        assert_eq!(config.anonymity_url, "http://echo.test");
    }

    #[test]
    fn test_classify_body_rules() {
        let transparent = "HTTP_VIA = 1.1 squid\nHTTP_X_FORWARDED_FOR = 203.0.113.9";
        assert_eq!(classify_body(transparent), AnonymityGrade::Transparent);
        assert_eq!(classify_body("HTTP_VIA = 1.1 squid"), AnonymityGrade::Anonymous);
        assert_eq!(classify_body("REMOTE_ADDR = 198.51.100.7"), AnonymityGrade::Elite);
    }

    #[test]
    fn test_check_mode_from_config() {
        let config = ScanConfig::default();
        let mode = CheckMode::hard_from(&config);
        assert_eq!(mode.kind(), CheckKind::Hard);
        assert_eq!(
            mode,
            CheckMode::Hard {
                targets: config.hard_check_sites.clone()
            }
        );
        assert_eq!(CheckMode::Soft.kind(), CheckKind::Soft);
    }

    #[tokio::test]
    async fn test_malformed_endpoint_never_reaches_network() {
        let checker = ProxyChecker::new(Arc::new(ReqwestTransport::new()));
        let result = checker.soft_check(4, "not-a-proxy").await;
        assert!(!result.is_working());
        assert_eq!(result.order, 4);
        assert!(result.endpoint.is_none());
        assert!(matches!(result.failure, Some(ProbeFailure::MalformedEndpoint(_))));

        let result = checker
            .hard_check(0, "gopher://1.2.3.4:70", &["https://www.github.com".to_string()])
            .await;
        assert_eq!(result.kind, CheckKind::Hard);
        assert_eq!(result.anonymity, AnonymityGrade::Unknown);
    }

    #[test]
    fn test_abandoned_result_keeps_kind() {
        let probe = ValidationProbe::new(
            ProxyChecker::new(Arc::new(ReqwestTransport::new())),
            CheckMode::Hard {
                targets: vec!["https://www.github.com".to_string()],
            },
        );
        let result = probe.abandoned(2, "http://1.2.3.4:80", "panicked".to_string());
        assert_eq!(result.kind, CheckKind::Hard);
        assert!(result.endpoint.is_some());
        assert_eq!(result.failure, Some(ProbeFailure::Aborted("panicked".to_string())));
    }
}
