//! In-process transport fake shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use proxy_vet::{ChunkStream, HttpResponse, ProxyEndpoint, Transport, TransportError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub const CANARY_BODY: &str = "<html><h1>Example Domain</h1></html>";

pub const ELITE_BODY: &str = "REMOTE_ADDR = 203.0.113.7\nHTTP_USER_AGENT = test";
pub const ANONYMOUS_BODY: &str = "REMOTE_ADDR = 203.0.113.7\nHTTP_VIA = 1.1 squid";
pub const TRANSPARENT_BODY: &str =
    "REMOTE_ADDR = 203.0.113.7\nHTTP_X_FORWARDED_FOR = 198.51.100.1\nHTTP_VIA = 1.1 squid";

/// Canned download: `bytes` delivered in one chunk after `delay`
#[derive(Debug, Clone, Copy)]
pub struct Payload {
    pub bytes: usize,
    pub delay: Duration,
}

/// Answers by URL, with per-host overrides for failures, hangs and bodies
#[derive(Default)]
pub struct MockTransport {
    routes: HashMap<String, HttpResponse>,
    host_routes: HashMap<(String, String), HttpResponse>,
    failing: HashMap<String, TransportError>,
    hanging: HashSet<String>,
    payloads: HashMap<String, Payload>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every proxy gets `status`/`body` for `url`
    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), HttpResponse::new(status, body));
        self
    }

    /// Only requests through `host` get `status`/`body` for `url`
    pub fn host_route(mut self, host: &str, url: &str, status: u16, body: &str) -> Self {
        self.host_routes.insert(
            (host.to_string(), url.to_string()),
            HttpResponse::new(status, body),
        );
        self
    }

    pub fn fail_host(mut self, host: &str, error: TransportError) -> Self {
        self.failing.insert(host.to_string(), error);
        self
    }

    /// Requests through `host` never complete
    pub fn hang_host(mut self, host: &str) -> Self {
        self.hanging.insert(host.to_string());
        self
    }

    pub fn payload(mut self, host: &str, bytes: usize, delay: Duration) -> Self {
        self.payloads
            .insert(host.to_string(), Payload { bytes, delay });
        self
    }

    /// Answers for `url` arrive after `delay`
    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Number of requests made for `url` through any proxy
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, called)| called == url)
            .count()
    }

    /// Number of requests made through `host`
    pub fn calls_through(&self, host: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(via, _)| via == host)
            .count()
    }

    async fn enter(&self, proxy: &ProxyEndpoint, url: &str) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((proxy.host.clone(), url.to_string()));

        if self.hanging.contains(&proxy.host) {
            std::future::pending::<()>().await;
        }
        match self.failing.get(&proxy.host) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.enter(proxy, url).await?;
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        let key = (proxy.host.clone(), url.to_string());
        let response = self
            .host_routes
            .get(&key)
            .or_else(|| self.routes.get(url))
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404, ""));
        Ok(response)
    }

    async fn download(
        &self,
        proxy: &ProxyEndpoint,
        url: &str,
        _timeout: Duration,
    ) -> Result<ChunkStream, TransportError> {
        self.enter(proxy, url).await?;

        let payload = self
            .payloads
            .get(&proxy.host)
            .copied()
            .ok_or(TransportError::Status(404))?;
        let chunks = stream::once(async move {
            tokio::time::sleep(payload.delay).await;
            Ok(payload.bytes)
        });
        Ok(chunks.boxed())
    }
}
