use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use common::BackendConfig;

use crate::article::Article;

/// Default number of search results requested.
pub const DEFAULT_SEARCH_LIMIT: usize = 15;

/// Query parameters for the headlines endpoint. Unset fields are not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlinesQuery {
    pub country: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl Default for HeadlinesQuery {
    fn default() -> Self {
        Self {
            country: Some("us".to_string()),
            category: Some("technology".to_string()),
            limit: Some(6),
        }
    }
}

impl HeadlinesQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(country) = &self.country {
            params.push(("country", country.clone()));
        }
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Source of article snapshots. News fetching and ranking live in the backend;
/// implementations only forward requests.
#[async_trait::async_trait]
pub trait NewsBackend: Send + Sync {
    async fn get_headlines(&self, query: &HeadlinesQuery) -> Result<Vec<Article>>;

    async fn search_news(&self, query: &str, limit: Option<usize>) -> Result<Vec<Article>>;

    async fn fetch_article(&self, id: &str) -> Result<Article>;

    /// `true` when the backend answers its health endpoint with a 2xx.
    async fn health_check(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct NewsSearchResponse {
    #[serde(default)]
    results: Vec<Article>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct FetchRequest<'a> {
    ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct FetchArticleResponse {
    success: Option<bool>,
    records: Option<BTreeMap<String, ArticleRecord>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleRecord {
    id: String,
    metadata: Option<Map<String, Value>>,
}

/// HTTP client for the TechPulse news backend
pub struct HttpNewsBackend {
    config: BackendConfig,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpNewsBackend {
    pub fn new(config: BackendConfig, token: Option<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    /// Build from config, reading the bearer token from the configured env var.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(config.clone(), config.credential())
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API Error: {} - {}", status.as_u16(), body);
        }
        response
            .json()
            .await
            .context("Failed to parse backend response")
    }
}

#[async_trait::async_trait]
impl NewsBackend for HttpNewsBackend {
    async fn get_headlines(&self, query: &HeadlinesQuery) -> Result<Vec<Article>> {
        let url = self.config.endpoint("api/v1/news/headlines")?;
        let params = query.params();
        debug!(?params, "fetching headlines");

        let response = self
            .authorized(self.client.get(url).query(&params))
            .send()
            .await
            .context("Headlines request failed")?;

        let body: NewsSearchResponse = Self::handle_response(response).await?;
        Ok(body.results)
    }

    async fn search_news(&self, query: &str, limit: Option<usize>) -> Result<Vec<Article>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.config.endpoint("api/v1/news/search")?;
        let response = self
            .authorized(self.client.post(url).json(&SearchRequest {
                query,
                limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            }))
            .send()
            .await
            .context("Search request failed")?;

        let body: NewsSearchResponse = Self::handle_response(response).await?;
        Ok(body.results)
    }

    async fn fetch_article(&self, id: &str) -> Result<Article> {
        let url = self.config.endpoint("api/v1/news/fetch")?;
        let response = self
            .authorized(self.client.post(url).json(&FetchRequest { ids: [id] }))
            .send()
            .await
            .context("Article fetch request failed")?;

        let body: FetchArticleResponse = Self::handle_response(response).await?;
        article_from_fetch(body, id)
    }

    async fn health_check(&self) -> bool {
        let url = match self.config.endpoint("health") {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build health check url");
                return false;
            }
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "backend health check failed");
                false
            }
        }
    }
}

fn article_from_fetch(body: FetchArticleResponse, id: &str) -> Result<Article> {
    if body.success == Some(false) {
        anyhow::bail!(body.error.unwrap_or_else(|| "API request failed".to_string()));
    }

    let records = body
        .records
        .context("Invalid response format: missing records")?;

    let Some(record) = find_record(&records, id) else {
        if records.is_empty() {
            anyhow::bail!("Article not found. No articles returned from API.");
        }
        let available: Vec<&str> = records.keys().map(String::as_str).collect();
        anyhow::bail!("Article not found. Available IDs: {}", available.join(", "));
    };

    let metadata = record
        .metadata
        .as_ref()
        .context("Invalid article format: missing metadata")?;

    Ok(Article {
        id: record.id.clone(),
        title: meta_text(metadata, "title").unwrap_or_else(|| "Untitled".to_string()),
        url: meta_text(metadata, "url").unwrap_or_default(),
        summary: meta_text(metadata, "description")
            .or_else(|| meta_text(metadata, "text"))
            .unwrap_or_else(|| "No summary available".to_string()),
        published_at: meta_text(metadata, "published_at")
            .unwrap_or_else(|| Utc::now().to_rfc3339()),
    })
}

/// Record lookup: exact key, then case-insensitive key, then containment either way.
/// Backend keys sometimes carry prefixes or suffixes around the requested id.
fn find_record<'a>(
    records: &'a BTreeMap<String, ArticleRecord>,
    id: &str,
) -> Option<&'a ArticleRecord> {
    if let Some(record) = records.get(id) {
        return Some(record);
    }
    let lowered = id.to_lowercase();
    records
        .iter()
        .find(|(key, _)| key.to_lowercase() == lowered)
        .or_else(|| {
            records
                .iter()
                .find(|(key, _)| key.contains(id) || id.contains(key.as_str()))
        })
        .map(|(_, record)| record)
}

/// Metadata values may be strings, numbers or booleans; null and "" count as missing.
fn meta_text(metadata: &Map<String, Value>, key: &str) -> Option<String> {
    match metadata.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
