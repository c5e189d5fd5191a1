//! HTTP transport used by the probes.
//!
//! Probes never talk to `reqwest` directly; they go through [`Transport`] so the
//! network can be replaced by an in-process fake in tests.

use crate::proxy::models::ProxyEndpoint;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Stream of received chunk sizes, in bytes
pub type ChunkStream = BoxStream<'static, Result<usize, TransportError>>;

/// Failure to complete an HTTP exchange through a proxy
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum TransportError {
    #[error("proxy rejected: {0}")]
    InvalidProxy(String),
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// A fully buffered response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET requests routed through a proxy
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fetch `url` through `proxy` and buffer the whole body
    async fn get(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    /// Start a streamed download of `url` through `proxy`.
    ///
    /// Non-2xx responses are reported as [`TransportError::Status`].
    async fn download(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<ChunkStream, TransportError>;
}

/// [`Transport`] backed by a per-proxy `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    /// Create a reqwest client that sends every request through the proxy
    fn create_client(&self, proxy: &ProxyEndpoint, timeout: Duration) -> Result<Client, TransportError> {
        let reqwest_proxy = ReqwestProxy::all(proxy.url())
            .map_err(|e| TransportError::InvalidProxy(e.to_string()))?;

        Client::builder()
            .proxy(reqwest_proxy)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidProxy(e.to_string()))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let client = self.create_client(proxy, timeout)?;
        let response = client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    async fn download(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        timeout: Duration,
    ) -> Result<ChunkStream, TransportError> {
        let client = self.create_client(proxy, timeout)?;
        let response = client.get(url).send().await?.error_for_status()?;
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.len()).map_err(TransportError::from));
        Ok(chunks.boxed())
    }
}
