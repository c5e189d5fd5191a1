//! Proxy module for parsing, probing and ranking proxies
//!
//! This module provides functionality for:
//! - Parsing `scheme://host:port` proxy strings
//! - Soft, hard, anonymity and speed probes behind a swappable transport
//! - Scanning whole lists with a bounded worker pool and cancellation
//! - Ordering finished scans for display
//! - Refreshing and storing the proxy list

pub mod aggregate;
pub mod checker;
pub mod models;
pub mod parser;
pub mod scanner;
pub mod source;
pub mod speed;
pub mod transport;

pub use aggregate::{rank_by_latency, rank_by_throughput, SpeedReport, ValidationReport};
pub use checker::{CheckMode, CheckerConfig, ProxyChecker, ValidationProbe};
pub use models::{
    AnonymityGrade, CheckKind, EndpointError, ProbeFailure, ProbeResult, ProxyEndpoint,
    ProxyScheme, SpeedResult,
};
pub use parser::ProxyParser;
pub use scanner::{cancel_on, ConcurrentScanner, Probe, ScanOutcome, ScanStream, ScanUpdate};
pub use source::{ProxyListFile, ProxySource, SourceConfig};
pub use speed::{SpeedConfig, SpeedProbe};
pub use transport::{ChunkStream, HttpResponse, ReqwestTransport, Transport, TransportError};
