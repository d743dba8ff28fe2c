//! Reference-search collaborator and its Google Custom Search implementation.

use std::time::Duration;

use async_trait::async_trait;
use entitygraph_shared::{AppConfig, EntityGraphError, Reference, Result, resolve_secret};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Custom Search returns at most this many results per request.
const GOOGLE_MAX_NUM: u32 = 10;

/// Finds third-party pages about a subject.
///
/// Zero results is `Ok(vec![])`, never an error.
#[async_trait]
pub trait ReferenceSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Reference>>;
}

// ---------------------------------------------------------------------------
// GoogleSearchClient
// ---------------------------------------------------------------------------

/// Google Custom Search JSON API client.
#[derive(Clone)]
pub struct GoogleSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    pub fn new(
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("Entitygraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| EntityGraphError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        })
    }

    /// Build from `[search]`, reading the key and engine id from the env vars it names.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.search.api_key_env, "Search API key")?;
        let engine_id = resolve_secret(&config.search.engine_id_env, "Search engine id")?;
        Self::new(api_key, engine_id, config.search.base_url.clone())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl ReferenceSearch for GoogleSearchClient {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Reference>> {
        let num = max_results.clamp(1, GOOGLE_MAX_NUM).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EntityGraphError::Network(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EntityGraphError::Network(format!(
                "search API returned HTTP {status}: {body}"
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| EntityGraphError::parse(format!("search response: {e}")))?;

        debug!(results = parsed.items.len(), "search results received");
        Ok(parsed
            .items
            .into_iter()
            .map(|item| Reference::new(item.link, item.title, item.snippet))
            .collect())
    }
}
