//! HTTP crawl collaborator.
//!
//! Fetches the subject's homepage and extracts structured business data from
//! it. Ordinary failures (bad URL, blocked host, network error, non-2xx) are
//! reported through [`CrawlOutcome`], never as `Err`.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use entitygraph_shared::{CrawlOutcome, CrawlSettingsConfig, EntityGraphError, Result};

use crate::SiteCrawler;
use crate::extract::extract_source_data;

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("Entitygraph/", env!("CARGO_PKG_VERSION"));

/// Pages larger than this are cut before parsing.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// ---------------------------------------------------------------------------
// HttpSiteCrawler
// ---------------------------------------------------------------------------

/// Single-page crawler for business homepages.
pub struct HttpSiteCrawler {
    client: Client,
    /// Refuse loopback/private hosts. Off only for tests against mock servers.
    block_private_hosts: bool,
}

impl HttpSiteCrawler {
    /// Create a crawler from the `[crawl]` config section.
    pub fn new(settings: &CrawlSettingsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EntityGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            block_private_hosts: settings.block_private_hosts,
        })
    }

    /// Allow crawling localhost/private IPs (for tests with mock servers).
    pub fn allow_localhost(mut self) -> Self {
        self.block_private_hosts = false;
        self
    }

    /// GET `url`, reading at most [`MAX_BODY_BYTES`] of the body.
    async fn fetch(&self, url: &Url) -> Result<(Url, String)> {
        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| EntityGraphError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EntityGraphError::Network(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        if self.block_private_hosts && is_ssrf_target(&final_url) {
            return Err(EntityGraphError::Network(format!(
                "{url}: redirected to blocked host {final_url}"
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| EntityGraphError::Network(format!("{url}: failed to read body: {e}")))?
        {
            let room = MAX_BODY_BYTES - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                debug!(limit = MAX_BODY_BYTES, "body cap reached, dropping the rest");
                break;
            }
            body.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&body).into_owned();

        Ok((final_url, body))
    }
}

#[async_trait]
impl SiteCrawler for HttpSiteCrawler {
    #[instrument(skip_all, fields(url = %url))]
    async fn crawl(&self, url: &str) -> CrawlOutcome {
        let start = Instant::now();

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return CrawlOutcome::failure(format!("invalid URL {url}: {e}")),
        };

        if self.block_private_hosts && is_ssrf_target(&parsed) {
            warn!("SSRF protection: blocked crawl target");
            return CrawlOutcome::failure(format!("blocked private or non-HTTP target: {url}"));
        }

        match self.fetch(&parsed).await {
            Ok((final_url, body)) => {
                debug!(bytes = body.len(), %final_url, "page fetched");
                let data = extract_source_data(&body, &final_url);
                info!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    name = data.name.as_deref().unwrap_or("-"),
                    "crawl complete"
                );
                CrawlOutcome::success(data)
            }
            Err(e) => {
                warn!(error = %e, "crawl failed");
                CrawlOutcome::failure(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
