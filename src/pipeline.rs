use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::VerifierConfig;
use crate::extraction::extract_claims;
use crate::llm::{openai::LlmClient, Llm};
use crate::retrieve::search_evidence;
use crate::tavily::{Searcher, TavilyClient};
use crate::types::{PredictionInput, PredictionVerification};
use crate::verification::analyze_evidence;

/// Outcome of one pipeline run plus what happened along the way.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub verification: PredictionVerification,
    pub claims: Vec<String>,
    pub evidence_count: usize,
    /// `stage: reason` for every stage that fell back to a safe default.
    pub degraded: Vec<String>,
}

impl VerificationReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Runs extraction, search and analysis for predictions.
#[derive(Clone)]
pub struct PredictionVerifier {
    llm_extract: Arc<dyn Llm>,
    llm_analyze: Arc<dyn Llm>,
    searcher: Arc<dyn Searcher>,
    config: Arc<VerifierConfig>,
}

impl PredictionVerifier {
    pub fn new(
        llm_extract: Arc<dyn Llm>,
        llm_analyze: Arc<dyn Llm>,
        searcher: Arc<dyn Searcher>,
        config: VerifierConfig,
    ) -> Self {
        Self { llm_extract, llm_analyze, searcher, config: Arc::new(config) }
    }

    /// Wires the real OpenAI-compatible and Tavily clients.
    pub fn from_config(config: VerifierConfig) -> Result<Self> {
        config.validate()?;
        let llm = &config.llm;
        let extract = LlmClient::new(llm.extract_model.clone(), llm.base_url.clone(), llm.api_key.clone());
        let analyze = LlmClient::new(llm.analysis_model.clone(), llm.base_url.clone(), llm.api_key.clone());
        let searcher = TavilyClient::new(&config.search)?;
        Ok(Self::new(Arc::new(extract), Arc::new(analyze), Arc::new(searcher), config))
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub async fn verify(&self, input: &PredictionInput) -> PredictionVerification {
        self.verify_detailed(input).await.verification
    }

    pub async fn verify_detailed(&self, input: &PredictionInput) -> VerificationReport {
        info!(prediction = %input.prediction_text, "verifying prediction");
        let mut degraded = Vec::new();

        let (claims, reason) = extract_claims(self.llm_extract.as_ref(), &input.prediction_text)
            .await
            .into_parts();
        if let Some(r) = reason { degraded.push(format!("extraction: {r}")); }

        let (evidence, reason) = search_evidence(
            self.searcher.as_ref(),
            &self.config.search,
            &claims,
            &input.prediction_date,
        )
        .await
        .into_parts();
        if let Some(r) = reason { degraded.push(format!("search: {r}")); }
        let evidence_count = evidence.len();

        let (verification, reason) = analyze_evidence(
            self.llm_analyze.as_ref(),
            &input.prediction_text,
            &input.prediction_date,
            evidence,
        )
        .await
        .into_parts();
        if let Some(r) = reason { degraded.push(format!("analysis: {r}")); }

        let verification = finalize(verification, input, evidence_count);
        if !degraded.is_empty() {
            warn!(stages = ?degraded, "verification used fallbacks");
        }
        info!(outcome = verification.outcome.as_str(), confidence = verification.confidence_score, "verification complete");
        VerificationReport { verification, claims, evidence_count, degraded }
    }

    /// Verifies predictions in fixed-size chunks, pausing between chunks to stay
    /// under upstream rate limits. Output order matches input order.
    pub async fn verify_batch(&self, inputs: &[PredictionInput]) -> Vec<PredictionVerification> {
        let batch = &self.config.batch;
        let chunk_size = batch.chunk_size.max(1);
        info!(total = inputs.len(), chunk_size, "batch verifying predictions");

        let mut results = Vec::with_capacity(inputs.len());
        for (i, chunk) in inputs.chunks(chunk_size).enumerate() {
            if i > 0 {
                sleep(batch.chunk_pause).await;
            }
            info!(chunk = i + 1, size = chunk.len(), "processing chunk");
            results.extend(join_all(chunk.iter().map(|p| self.verify(p))).await);
        }

        let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
        for r in &results {
            *tally.entry(r.outcome.as_str()).or_default() += 1;
        }
        info!(?tally, "batch complete");
        results
    }
}

// The caller's text and date always win, and the record is stamped when it leaves the pipeline.
fn finalize(
    mut v: PredictionVerification,
    input: &PredictionInput,
    evidence_count: usize,
) -> PredictionVerification {
    v.source_text = input.prediction_text.clone();
    v.prediction_date = input.prediction_date.clone();
    v.verification_date = Utc::now();
    if v.evidence_text.trim().is_empty() {
        v.evidence_text = "No evidence provided".into();
    }
    if !v.confidence_score.is_finite() {
        v.confidence_score = 0.0;
    }
    v.confidence_score = v.confidence_score.clamp(0.0, 1.0);
    if evidence_count == 0 {
        v.confidence_score = 0.0;
    }
    v
}
