//! HTTP fetcher for the prefixes announced by an ASN.
//!
//! The lookup service answers `GET {base}/asn/{asn}/prefixes` with
//! `{status, status_message, data: {ipv4_prefixes: [{ip, cidr}, ...]}}`.
//! Only `data.ipv4_prefixes` is used.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::fs_abstraction::FileSystem;
use crate::utils::format_count;
use crate::validation::ipv4_prefix;

#[cfg(test)]
use mockall::automock;

/// Default lookup service
pub const DEFAULT_API_URL: &str = "https://api.bgpview.io";

/// Default request timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Maximum accepted response size (10 MB)
/// The largest announcing networks publish a few thousand prefixes, well below this
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct PrefixesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_message: Option<String>,
    data: Option<PrefixesData>,
}

#[derive(Debug, Deserialize)]
struct PrefixesData {
    #[serde(default)]
    ipv4_prefixes: Vec<Ipv4Prefix>,
}

#[derive(Debug, Deserialize)]
struct Ipv4Prefix {
    ip: String,
    cidr: i64,
}

/// Source of the desired prefix list for an ASN
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PrefixSource: Send + Sync {
    /// Current IPv4 prefixes for `asn` as `ip/cidr` strings, in service order
    async fn fetch(&self, asn: &str) -> Result<Vec<String>>;
}

/// Fetch the prefixes for `asn` and atomically rewrite its cache file.
///
/// Nothing is written unless the whole fetch succeeded.
pub async fn refresh<S, F>(source: &S, asn: &str, cache: &CacheStore<F>) -> Result<usize>
where
    S: PrefixSource + ?Sized,
    F: FileSystem,
{
    let prefixes = source.fetch(asn).await?;
    cache.store(asn, &prefixes)?;
    Ok(prefixes.len())
}

/// HTTP client for the prefix lookup service
pub struct PrefixFetcher {
    client: Client,
    base_url: String,
}

impl PrefixFetcher {
    /// Create a fetcher from the run configuration
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_url, config.fetch_timeout())
    }

    /// Create a fetcher for a specific service URL
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("asnlist/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, asn: &str) -> String {
        format!("{}/asn/{}/prefixes", self.base_url, asn)
    }

    /// Fetch and rewrite the cache file for `asn`
    pub async fn refresh<F: FileSystem>(&self, asn: &str, cache: &CacheStore<F>) -> Result<usize> {
        refresh(self, asn, cache).await
    }

    /// Fetch the response body, bounded in size
    async fn fetch_body(&self, asn: &str, url: &str) -> Result<(reqwest::StatusCode, String)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::fetch(asn, describe_transport_error(&e)))?;

        let status = response.status();

        // Check Content-Length header if available
        if let Some(content_length) = response.content_length() {
            if content_length as usize > MAX_RESPONSE_SIZE {
                return Err(SyncError::fetch(
                    asn,
                    format!(
                        "response too large: {} bytes (max: {} bytes)",
                        content_length, MAX_RESPONSE_SIZE
                    ),
                ));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::fetch(asn, format!("failed to read response body: {}", e)))?;

        // Double-check actual size after download
        if body.len() > MAX_RESPONSE_SIZE {
            return Err(SyncError::fetch(
                asn,
                format!(
                    "response too large: {} bytes (max: {} bytes)",
                    body.len(),
                    MAX_RESPONSE_SIZE
                ),
            ));
        }

        Ok((status, body))
    }
}

#[async_trait]
impl PrefixSource for PrefixFetcher {
    async fn fetch(&self, asn: &str) -> Result<Vec<String>> {
        let url = self.url_for(asn);
        info!("ASN {}: fetching prefixes from {}", asn, url);

        let (status, body) = self.fetch_body(asn, &url).await?;

        if !status.is_success() {
            let detail = serde_json::from_str::<PrefixesResponse>(&body)
                .ok()
                .and_then(|r| r.status_message)
                .filter(|m| !m.is_empty());
            let reason = match detail {
                Some(message) => format!("HTTP {}: {}", status, message),
                None => format!("HTTP {}", status),
            };
            return Err(SyncError::fetch(asn, reason));
        }

        let prefixes = parse_prefixes(asn, &body)?;
        info!(
            "ASN {}: {} IPv4 prefixes announced",
            asn,
            format_count(prefixes.len())
        );
        Ok(prefixes)
    }
}

/// Parse a lookup service response into `ip/cidr` strings.
///
/// Service order and duplicates are kept. Records that are not valid IPv4
/// prefixes are skipped.
pub fn parse_prefixes(asn: &str, body: &str) -> Result<Vec<String>> {
    let response: PrefixesResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::fetch(asn, format!("malformed response: {}", e)))?;

    let Some(data) = response.data else {
        let reason = match (response.status, response.status_message) {
            (Some(status), Some(message)) => {
                format!("no data in response (status {}: {})", status, message)
            }
            (Some(status), None) => format!("no data in response (status {})", status),
            _ => "no data in response".to_string(),
        };
        return Err(SyncError::fetch(asn, reason));
    };

    let total = data.ipv4_prefixes.len();
    let prefixes: Vec<String> = data
        .ipv4_prefixes
        .into_iter()
        .filter_map(|p| match ipv4_prefix(&p.ip, p.cidr) {
            Some(net) => Some(net.to_string()),
            None => {
                debug!("ASN {}: skipping invalid prefix {}/{}", asn, p.ip, p.cidr);
                None
            }
        })
        .collect();

    if prefixes.len() != total {
        debug!(
            "ASN {}: kept {} of {} prefix records",
            asn,
            prefixes.len(),
            total
        );
    }

    Ok(prefixes)
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
