//! Proxy data models

use crate::proxy::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Proxy scheme enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    /// Case-insensitive lookup of a scheme name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            "socks4" => Some(ProxyScheme::Socks4),
            "socks5" => Some(ProxyScheme::Socks5),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyScheme::Http => write!(f, "http"),
            ProxyScheme::Https => write!(f, "https"),
            ProxyScheme::Socks4 => write!(f, "socks4"),
            ProxyScheme::Socks5 => write!(f, "socks5"),
        }
    }
}

/// A parsed `scheme://host:port` proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEndpoint {
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    /// The string the endpoint was parsed from
    pub raw: String,
}

impl ProxyEndpoint {
    pub fn new(scheme: ProxyScheme, host: String, port: u16, raw: String) -> Self {
        Self {
            scheme,
            host,
            port,
            raw,
        }
    }

    /// Normalized proxy URL, with the scheme lowercased
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Get the proxy string in HOST:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// How much a proxy reveals about the client behind it.
///
/// The ordering only exists so results can be grouped for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnonymityGrade {
    Transparent,
    Anonymous,
    Elite,
    Unknown,
}

impl AnonymityGrade {
    /// Rating on the 0-10 scale, `None` when the grade could not be measured
    pub fn score(&self) -> Option<u8> {
        match self {
            AnonymityGrade::Transparent => Some(0),
            AnonymityGrade::Anonymous => Some(5),
            AnonymityGrade::Elite => Some(10),
            AnonymityGrade::Unknown => None,
        }
    }
}

impl fmt::Display for AnonymityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.score() {
            Some(score) => write!(f, "{}/10", score),
            None => write!(f, "Unknown"),
        }
    }
}

/// Which validation strategy produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    Soft,
    Hard,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Soft => write!(f, "soft"),
            CheckKind::Hard => write!(f, "hard"),
        }
    }
}

/// Why a proxy string could not be turned into a [`ProxyEndpoint`]
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum EndpointError {
    #[error("missing `://` separator")]
    MissingSchemeSeparator,
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("missing port separator")]
    MissingPort,
    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

/// Reason attached to a failed probe result
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum ProbeFailure {
    #[error("malformed endpoint: {0}")]
    MalformedEndpoint(#[from] EndpointError),
    #[error("network failure: {0}")]
    Network(#[from] TransportError),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("strict target {target} failed: {reason}")]
    StrictTarget { target: String, reason: String },
    #[error("download stopped after {received} of {expected} bytes")]
    ShortDownload { received: u64, expected: u64 },
    #[error("worker aborted: {0}")]
    Aborted(String),
}

/// Outcome of a soft or hard check for one submitted proxy string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Position of the proxy in the submitted list
    pub order: usize,
    pub raw: String,
    pub endpoint: Option<ProxyEndpoint>,
    pub success: bool,
    pub latency_ms: Option<f64>,
    pub anonymity: AnonymityGrade,
    pub kind: CheckKind,
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn working(
        order: usize,
        endpoint: ProxyEndpoint,
        kind: CheckKind,
        latency_ms: f64,
        anonymity: AnonymityGrade,
    ) -> Self {
        Self {
            order,
            raw: endpoint.raw.clone(),
            endpoint: Some(endpoint),
            success: true,
            latency_ms: Some(latency_ms),
            anonymity,
            kind,
            failure: None,
        }
    }

    /// The canonical failure outcome: no latency, `Unknown` anonymity
    pub fn failed(
        order: usize,
        raw: &str,
        endpoint: Option<ProxyEndpoint>,
        kind: CheckKind,
        failure: ProbeFailure,
    ) -> Self {
        Self {
            order,
            raw: raw.to_string(),
            endpoint,
            success: false,
            latency_ms: None,
            anonymity: AnonymityGrade::Unknown,
            kind,
            failure: Some(failure),
        }
    }

    pub fn is_working(&self) -> bool {
        self.success
    }
}

/// Outcome of a download speed measurement for one proxy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedResult {
    pub order: usize,
    pub raw: String,
    pub endpoint: Option<ProxyEndpoint>,
    pub throughput_mbps: Option<f64>,
    pub failure: Option<ProbeFailure>,
}

impl SpeedResult {
    pub fn measured(order: usize, endpoint: ProxyEndpoint, throughput_mbps: f64) -> Self {
        Self {
            order,
            raw: endpoint.raw.clone(),
            endpoint: Some(endpoint),
            throughput_mbps: Some(throughput_mbps),
            failure: None,
        }
    }

    pub fn failed(
        order: usize,
        raw: &str,
        endpoint: Option<ProxyEndpoint>,
        failure: ProbeFailure,
    ) -> Self {
        Self {
            order,
            raw: raw.to_string(),
            endpoint,
            throughput_mbps: None,
            failure: Some(failure),
        }
    }

    pub fn is_measured(&self) -> bool {
        self.throughput_mbps.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ProxyEndpoint {
        ProxyEndpoint::new(
            ProxyScheme::Socks5,
            "192.168.1.1".to_string(),
            1080,
            "SOCKS5://192.168.1.1:1080".to_string(),
        )
    }

    #[test]
    fn test_scheme_from_name() {
        assert_eq!(ProxyScheme::from_name("HTTP"), Some(ProxyScheme::Http));
        assert_eq!(ProxyScheme::from_name("socks4"), Some(ProxyScheme::Socks4));
        assert_eq!(ProxyScheme::from_name("ftp"), None);
    }

    #[test]
    fn test_endpoint_url_is_normalized() {
        let endpoint = endpoint();
        assert_eq!(endpoint.url(), "socks5://192.168.1.1:1080");
        assert_eq!(endpoint.to_simple_string(), "192.168.1.1:1080");
        assert_eq!(endpoint.raw, "SOCKS5://192.168.1.1:1080");
    }

    #[test]
    fn test_anonymity_scores() {
        assert_eq!(AnonymityGrade::Transparent.score(), Some(0));
        assert_eq!(AnonymityGrade::Anonymous.score(), Some(5));
        assert_eq!(AnonymityGrade::Elite.score(), Some(10));
        assert_eq!(AnonymityGrade::Unknown.score(), None);
        assert_eq!(AnonymityGrade::Elite.to_string(), "10/10");
        assert_eq!(AnonymityGrade::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_probe_result_constructors() {
        let result =
            ProbeResult::working(3, endpoint(), CheckKind::Hard, 120.5, AnonymityGrade::Elite);
        assert!(result.is_working());
        assert_eq!(result.latency_ms, Some(120.5));
        assert_eq!(result.raw, "SOCKS5://192.168.1.1:1080");

        let result = ProbeResult::failed(
            0,
            "not-a-proxy",
            None,
            CheckKind::Soft,
            ProbeFailure::MalformedEndpoint(EndpointError::MissingSchemeSeparator),
        );
        assert!(!result.is_working());
        assert_eq!(result.latency_ms, None);
        assert_eq!(result.anonymity, AnonymityGrade::Unknown);
    }

    #[test]
    fn test_speed_result_constructors() {
        assert!(SpeedResult::measured(0, endpoint(), 3.2).is_measured());
        let failed = SpeedResult::failed(
            1,
            "http://1.2.3.4:80",
            None,
            ProbeFailure::ShortDownload {
                received: 10,
                expected: 100,
            },
        );
        assert!(!failed.is_measured());
    }
}
