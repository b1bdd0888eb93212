use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::llm::{strip_code_fences, system_user, Llm, OutputSchema};
use crate::retrieve::parse_reference_date;
use crate::types::{Evidence, Outcome, PredictionVerification, StageResult};

pub const NO_EVIDENCE_TEXT: &str = "No relevant evidence found to verify this prediction.";

const ANALYSIS_SYSTEM: &str = "You are an expert at verifying predictions based on evidence.

Analyze the prediction and the provided evidence to determine:
1. Has the prediction matured (enough time has passed that we can say if it was right or wrong)?
2. What was the outcome (correct, partially_correct, incorrect, unverifiable, or pending)?
3. How confident are we in this verification (a fraction from 0 to 1, not a percentage)?

Consider the specificity of the prediction, the credibility of the evidence sources, \
the timeframe of the prediction and any contradictory evidence.

Only mark a prediction as \"correct\" or \"incorrect\" if there is clear evidence.
If the evidence is mixed, use \"partially_correct\".
If there's insufficient evidence, use \"unverifiable\".
If more time is needed for the prediction to mature, use \"pending\".

Summarize how the evidence supports your conclusion in evidence_text, list the decisive \
facts in key_facts and anything that cuts the other way in counter_evidence.";

fn deadline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bwithin\s+(\d+)\s+(day|week|month|year)s?\b").expect("static regex")
    })
}

/// Longest deadline taken at face value; anything beyond is treated as no deadline.
const MAX_DEADLINE_DAYS: i64 = 100 * 365;

/// Deadline stated in the prediction, in days. Only "within N days/weeks/months/years"
/// is recognised; months and years are approximated as 30 and 365 days.
pub fn deadline_days(prediction: &str) -> Option<i64> {
    let caps = deadline_re().captures(prediction)?;
    let n: i64 = caps[1].parse().ok()?;
    let unit = match caps[2].to_ascii_lowercase().as_str() {
        "day" => 1,
        "week" => 7,
        "month" => 30,
        _ => 365,
    };
    n.checked_mul(unit).filter(|d| *d <= MAX_DEADLINE_DAYS)
}

/// Time facts handed to the model alongside the evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalContext {
    pub now: DateTime<Utc>,
    pub days_elapsed: Option<i64>,
    pub deadline_days: Option<i64>,
}

impl TemporalContext {
    pub fn derive(prediction: &str, prediction_date: &str, now: DateTime<Utc>) -> Self {
        let days_elapsed = parse_reference_date(prediction_date)
            .map(|d| (now - d).num_seconds().div_euclid(86_400));
        Self { now, days_elapsed, deadline_days: deadline_days(prediction) }
    }

    pub fn days_remaining(&self) -> Option<i64> {
        self.deadline_days?.checked_sub(self.days_elapsed?)
    }

    pub fn render(&self) -> String {
        let mut lines = vec![format!("Current Date: {}", self.now.to_rfc3339())];
        match self.days_elapsed {
            Some(d) => lines.push(format!("Days Since Prediction: {d}")),
            None => lines.push("Days Since Prediction: unknown".into()),
        }
        if let Some(deadline) = self.deadline_days {
            lines.push(format!("Stated Deadline: {deadline} days after the prediction"));
            if let Some(left) = self.days_remaining() {
                if left > 0 {
                    lines.push(format!("Deadline Status: {left} days remaining"));
                } else {
                    lines.push(format!("Deadline Status: passed {} days ago", left.unsigned_abs()));
                }
            }
        }
        lines.join("\n")
    }
}

/// Most relevant first; equally relevant items newest first.
pub fn rank_evidence(mut evidence: Vec<Evidence>) -> Vec<Evidence> {
    evidence.sort_by(|a, b| {
        b.relevance()
            .total_cmp(&a.relevance())
            .then_with(|| b.date.cmp(&a.date))
    });
    evidence
}

pub fn format_evidence(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}. [{}] {}\nURL: {}\nDate: {}\nRelevance: {:.2}\n{}",
                i + 1,
                e.source,
                e.title,
                e.url,
                e.date.format("%Y-%m-%d"),
                e.relevance(),
                e.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn analysis_prompt(prediction: &str, prediction_date: &str, temporal: &TemporalContext, evidence_text: &str) -> String {
    format!(
        "Prediction: \"{prediction}\"\nPrediction Date: {prediction_date}\n{}\n\nEvidence:\n{evidence_text}\n\n\
Please verify this prediction based on the evidence provided.",
        temporal.render()
    )
}

pub fn analysis_schema() -> OutputSchema {
    let strings = json!({"type": "array", "items": {"type": "string"}});
    OutputSchema {
        name: "prediction_verification".into(),
        description: "Verdict on whether a prediction came true, with supporting analysis".into(),
        schema: json!({
            "type": "object",
            "properties": {
                "matured": {"type": "boolean"},
                "outcome": {"type": "string", "enum": Outcome::ALL.map(|o| o.as_str())},
                "confidence_score": {
                    "type": "number",
                    "description": "Confidence in the verdict as a fraction between 0 and 1 (not a percentage)"
                },
                "evidence_text": {"type": "string"},
                "reasoning": {"type": "string"},
                "key_facts": strings.clone(),
                "counter_evidence": strings,
                "timeline_analysis": {"type": "string"},
                "sources_quality": {"type": "string"}
            },
            "required": [
                "matured", "outcome", "confidence_score", "evidence_text", "reasoning",
                "key_facts", "counter_evidence", "timeline_analysis", "sources_quality"
            ],
            "additionalProperties": false
        }),
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    matured: bool,
    outcome: Outcome,
    confidence_score: f64,
    #[serde(default)]
    evidence_text: String,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    key_facts: Vec<String>,
    #[serde(default)]
    counter_evidence: Vec<String>,
    #[serde(default)]
    timeline_analysis: Option<String>,
    #[serde(default)]
    sources_quality: Option<String>,
}

// Models sometimes answer in percent; values in (1, 100] are read that way.
fn normalize_score(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let v = if v > 1.0 && v <= 100.0 { v / 100.0 } else { v };
    v.clamp(0.0, 1.0)
}

async fn request_verdict(
    llm: &dyn Llm,
    prediction: &str,
    prediction_date: &str,
    evidence: &[Evidence],
    now: DateTime<Utc>,
) -> Result<AnalysisResponse> {
    let temporal = TemporalContext::derive(prediction, prediction_date, now);
    let prompt = analysis_prompt(prediction, prediction_date, &temporal, &format_evidence(evidence));
    let messages = system_user(ANALYSIS_SYSTEM, prompt)?;
    let raw = llm.complete(messages, Some(&analysis_schema())).await?;
    serde_json::from_str(&strip_code_fences(&raw)).context("malformed analysis response")
}

/// Judges a prediction against gathered evidence.
pub async fn analyze_evidence(
    llm: &dyn Llm,
    prediction: &str,
    prediction_date: &str,
    evidence: Vec<Evidence>,
) -> StageResult<PredictionVerification> {
    analyze_evidence_at(llm, prediction, prediction_date, evidence, Utc::now()).await
}

pub async fn analyze_evidence_at(
    llm: &dyn Llm,
    prediction: &str,
    prediction_date: &str,
    evidence: Vec<Evidence>,
    now: DateTime<Utc>,
) -> StageResult<PredictionVerification> {
    if evidence.is_empty() {
        return StageResult::degraded(
            PredictionVerification::fallback(prediction, prediction_date, Outcome::Pending, NO_EVIDENCE_TEXT),
            "no evidence found",
        );
    }

    let evidence = rank_evidence(evidence);
    info!(items = evidence.len(), "analyzing evidence");

    match request_verdict(llm, prediction, prediction_date, &evidence, now).await {
        Ok(resp) => {
            info!(outcome = resp.outcome.as_str(), confidence = resp.confidence_score, "verdict received");
            StageResult::Success(PredictionVerification {
                source_text: prediction.to_string(),
                prediction_date: prediction_date.to_string(),
                verification_date: Utc::now(),
                matured: resp.matured,
                outcome: resp.outcome,
                confidence_score: normalize_score(resp.confidence_score),
                evidence_urls: evidence.iter().map(|e| e.url.clone()).collect(),
                evidence_text: resp.evidence_text,
                reasoning: resp.reasoning,
                key_facts: Some(resp.key_facts),
                counter_evidence: Some(resp.counter_evidence),
                timeline_analysis: resp.timeline_analysis,
                sources_quality: resp.sources_quality,
            })
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(error = %reason, "evidence analysis failed");
            StageResult::degraded(
                PredictionVerification::fallback(
                    prediction,
                    prediction_date,
                    Outcome::Unverifiable,
                    format!("Error analyzing evidence: {reason}"),
                ),
                reason,
            )
        }
    }
}
