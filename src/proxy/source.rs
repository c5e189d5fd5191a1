//! Proxy list source: remote refresh and the local list file

use crate::proxy::parser::ProxyParser;
use crate::Result;
use anyhow::Context;
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default timeout for the list download in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Public list in `protocol://ip:port` text format
pub const DEFAULT_SOURCE_URL: &str = "https://api.proxyscrape.com/v4/free-proxy-list/get?request=display_proxies&proxy_format=protocolipport&format=text";

/// Default location of the local proxy list
pub const DEFAULT_LIST_PATH: &str = "proxies.txt";

/// Configuration for the proxy source
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Timeout for the download
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// URL to fetch the list from
    pub url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            url: DEFAULT_SOURCE_URL.to_string(),
        }
    }
}

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }
}

/// Downloads fresh proxy lists
pub struct ProxySource {
    config: SourceConfig,
    client: Client,
}

impl ProxySource {
    pub fn new() -> Result<Self> {
        Self::with_config(SourceConfig::default())
    }

    pub fn with_config(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { config, client })
    }

    /// Fetch the list and return its non-empty trimmed lines
    pub async fn fetch(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await?
            .error_for_status()?;
        let content = response.text().await?;
        let lines = Self::clean_lines(&content);
        info!(count = lines.len(), url = %self.config.url, "proxy list fetched");
        Ok(lines)
    }

    fn clean_lines(content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// The proxy list persisted between runs, one URI per line
#[derive(Debug, Clone)]
pub struct ProxyListFile {
    path: PathBuf,
}

impl ProxyListFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Current list: every line that looks like a proxy URI
    pub fn load(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading proxy list {}", self.path.display()))?;
        Ok(ProxyParser::parse_list(&content))
    }

    /// Replace the stored list
    pub fn save(&self, proxies: &[String]) -> Result<()> {
        let mut content = proxies.join("\n");
        content.push('\n');
        fs::write(&self.path, content)
            .with_context(|| format!("writing proxy list {}", self.path.display()))?;
        Ok(())
    }
}

impl Default for ProxyListFile {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_PATH)
    }
}
