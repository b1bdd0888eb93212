use std::time::Duration;

use crate::error::ConfigError;

/// Reputable news and finance outlets the search capability is restricted to.
pub const DEFAULT_NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "ft.com",
    "wsj.com",
    "nytimes.com",
    "apnews.com",
    "bbc.com",
    "cnbc.com",
    "theguardian.com",
    "washingtonpost.com",
    "economist.com",
    "marketwatch.com",
    "coindesk.com",
    "politico.com",
    "news.google.com",
];

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub extract_model: String,
    pub analysis_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            extract_model: "gpt-4o-mini".into(),
            analysis_model: "gpt-4o".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub max_results: usize,
    pub search_depth: String,
    pub topic: String,
    pub include_answer: bool,
    pub include_raw_content: bool,
    pub include_domains: Vec<String>,
    pub requests_per_second: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.tavily.com/search".into(),
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            max_results: 15,
            search_depth: "advanced".into(),
            topic: "news".into(),
            include_answer: true,
            include_raw_content: true,
            include_domains: DEFAULT_NEWS_DOMAINS.iter().map(|d| d.to_string()).collect(),
            requests_per_second: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: 5, chunk_pause: Duration::from_secs(2) }
    }
}

/// Everything the pipeline needs, built once by the caller and handed to each stage.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub batch: BatchConfig,
}

impl VerifierConfig {
    /// Checks that the settings needed to reach the real services are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !has_key(self.llm.api_key.as_deref()) {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        if !has_key(self.search.api_key.as_deref()) {
            return Err(ConfigError::Missing("TAVILY_API_KEY"));
        }
        Ok(())
    }
}

// Rejects blanks and copy-pasted placeholders like "sk-...".
fn has_key(key: Option<&str>) -> bool {
    match key.map(str::trim) {
        Some(k) => !k.is_empty() && !k.contains("..."),
        None => false,
    }
}
