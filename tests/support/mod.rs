#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_openai::types::ChatCompletionRequestMessage;
use async_trait::async_trait;
use prediction_verifier::llm::{Llm, OutputSchema};
use prediction_verifier::tavily::{SearchHit, SearchRequest, Searcher};
use prediction_verifier::{PredictionVerifier, SearchError, VerifierConfig};
use tokio::time::{sleep, Duration, Instant};

pub struct FakeLlm {
    // maps each prompt to the raw model answer
    pub handler: Box<dyn Fn(&[ChatCompletionRequestMessage]) -> Result<String> + Send + Sync>,
    pub delay_ms: u64,
    pub calls: Mutex<Vec<Instant>>,
}

impl FakeLlm {
    pub fn new(handler: impl Fn(&[ChatCompletionRequestMessage]) -> Result<String> + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), delay_ms: 0, calls: Mutex::new(Vec::new()) }
    }

    pub fn answering(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::new(move |_| Ok(answer.clone()))
    }

    pub fn failing(msg: &'static str) -> Self {
        Self::new(move |_| Err(anyhow::anyhow!(msg)))
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Llm for FakeLlm {
    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>, _schema: Option<&OutputSchema>) -> Result<String> {
        self.calls.lock().unwrap().push(Instant::now());
        if self.delay_ms > 0 { sleep(Duration::from_millis(self.delay_ms)).await; }
        (self.handler)(&messages)
    }
}

pub struct FakeSearcher {
    pub results: Vec<SearchHit>,
    pub error: Option<SearchError>,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSearcher {
    pub fn with_results(results: Vec<SearchHit>) -> Self {
        Self { results, error: None, requests: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: SearchError) -> Self {
        Self { results: Vec::new(), error: Some(error), requests: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Searcher for FakeSearcher {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchHit>, SearchError> {
        self.requests.lock().unwrap().push(req.clone());
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(self.results.clone()),
        }
    }
}

pub fn hit(url: &str, score: Option<f64>, published: Option<&str>) -> SearchHit {
    SearchHit {
        title: format!("Report {url}"),
        url: url.to_string(),
        content: "Bitcoin traded above $100,000 for the first time.".to_string(),
        score,
        raw_content: None,
        published_date: published.map(str::to_string),
    }
}

pub fn verdict_json(outcome: &str, confidence: f64) -> String {
    serde_json::json!({
        "matured": true,
        "outcome": outcome,
        "confidence_score": confidence,
        "evidence_text": "Bitcoin crossed $100k in December 2024.",
        "reasoning": "Reputable outlets report the price level.",
        "key_facts": ["BTC above $100k on 2024-12-05"],
        "counter_evidence": [],
        "timeline_analysis": "Happened within the stated window.",
        "sources_quality": "High"
    })
    .to_string()
}

pub fn verifier(extract: Arc<FakeLlm>, analyze: Arc<FakeLlm>, searcher: Arc<FakeSearcher>) -> PredictionVerifier {
    PredictionVerifier::new(extract, analyze, searcher, VerifierConfig::default())
}

/// Text of the user turn, for fakes that answer by prompt content.
pub fn user_text(messages: &[ChatCompletionRequestMessage]) -> String {
    use async_openai::types::ChatCompletionRequestUserMessageContent;
    messages
        .iter()
        .filter_map(|m| match m {
            ChatCompletionRequestMessage::User(u) => match &u.content {
                ChatCompletionRequestUserMessageContent::Text(t) => Some(t.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
