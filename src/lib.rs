//! Proxy Vet - concurrent proxy validator
//!
//! Checks proxy lists for liveness, anonymity grade and download speed
//! using a bounded pool of concurrent probes.

pub mod config;
pub mod proxy;
pub mod report;
pub mod tui;

pub use config::{ConfigError, ConfigStore, ScanConfig};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
