// src/tavily.rs
use std::num::NonZeroU32;

use anyhow::Result;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{ConfigError, SearchError};

/// Coarse recency hint sent with every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange { Week, Month, Year }

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub search_depth: String,
    pub include_domains: Vec<String>,
    pub include_answer: bool,
    pub include_raw_content: bool,
    pub max_results: usize,
    pub topic: String,
    pub time_range: TimeRange,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, time_range: TimeRange, cfg: &SearchConfig) -> Self {
        Self {
            query: query.into(),
            search_depth: cfg.search_depth.clone(),
            include_domains: cfg.include_domains.clone(),
            include_answer: cfg.include_answer,
            include_raw_content: cfg.include_raw_content,
            max_results: cfg.max_results,
            topic: cfg.topic.clone(),
            time_range,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResp {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Web-search capability. One call is one attempt; retrying is the caller's job.
#[async_trait::async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;
}

pub struct TavilyClient {
    http: Client,
    endpoint: String,
    key: String,
    limiter: DefaultDirectRateLimiter,
}

impl TavilyClient {
    pub fn new(cfg: &SearchConfig) -> Result<Self> {
        let key = cfg.api_key.clone().ok_or(ConfigError::Missing("TAVILY_API_KEY"))?;
        let http = Client::builder().timeout(cfg.attempt_timeout).build()?;
        let qps = NonZeroU32::new(cfg.requests_per_second).unwrap_or(nonzero!(5u32));
        let limiter = RateLimiter::direct(Quota::per_second(qps));
        Ok(Self { http, endpoint: cfg.endpoint.clone(), key, limiter })
    }
}

#[async_trait::async_trait]
impl Searcher for TavilyClient {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.limiter.until_ready().await;
        let resp = self.http
            .post(&self.endpoint)
            .bearer_auth(&self.key)
            .json(req)
            .send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        let body = resp.error_for_status()?.json::<TavilyResp>().await?;
        Ok(body.results.into_iter().take(req.max_results).collect())
    }
}
