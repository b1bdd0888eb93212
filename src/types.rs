use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One prediction to verify, as accepted by both entry points and the JSONL batch format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    pub prediction_text: String,
    pub prediction_date: String, // free-form; must parse as a date for search to run
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: String,       // hostname of `url`
    pub title: String,
    pub url: String,          // de-dup key within one result set
    pub date: DateTime<Utc>,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
}

impl Evidence {
    /// Relevance used for ordering; a missing score ranks as zero.
    pub fn relevance(&self) -> f64 {
        self.relevance_score.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    PartiallyCorrect,
    Incorrect,
    Unverifiable,
    Pending,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::Correct,
        Outcome::PartiallyCorrect,
        Outcome::Incorrect,
        Outcome::Unverifiable,
        Outcome::Pending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Correct => "correct",
            Outcome::PartiallyCorrect => "partially_correct",
            Outcome::Incorrect => "incorrect",
            Outcome::Unverifiable => "unverifiable",
            Outcome::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionVerification {
    pub source_text: String,
    pub prediction_date: String,
    pub verification_date: DateTime<Utc>,
    pub matured: bool,
    pub outcome: Outcome,
    pub confidence_score: f64,
    pub evidence_urls: Vec<String>,
    pub evidence_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_facts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter_evidence: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_quality: Option<String>,
}

impl PredictionVerification {
    /// Conservative record used whenever a stage cannot produce a real verdict.
    pub fn fallback(
        source_text: &str,
        prediction_date: &str,
        outcome: Outcome,
        evidence_text: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.to_string(),
            prediction_date: prediction_date.to_string(),
            verification_date: Utc::now(),
            matured: false,
            outcome,
            confidence_score: 0.0,
            evidence_urls: Vec::new(),
            evidence_text: evidence_text.into(),
            reasoning: None,
            key_facts: None,
            counter_evidence: None,
            timeline_analysis: None,
            sources_quality: None,
        }
    }
}

/// Result of one pipeline stage. Stages never fail outright: when they cannot
/// produce a real answer they hand back a safe default tagged with the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<T> {
    Success(T),
    Degraded { value: T, reason: String },
}

impl<T> StageResult<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        StageResult::Degraded { value, reason: reason.into() }
    }

    pub fn value(&self) -> &T {
        match self {
            StageResult::Success(v) | StageResult::Degraded { value: v, .. } => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            StageResult::Success(v) | StageResult::Degraded { value: v, .. } => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageResult::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            StageResult::Success(_) => None,
            StageResult::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Splits into the value and the degradation reason, if any.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            StageResult::Success(v) => (v, None),
            StageResult::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_snake_case() {
        let s = serde_json::to_string(&Outcome::PartiallyCorrect).unwrap();
        assert_eq!(s, r#""partially_correct""#);
        let o: Outcome = serde_json::from_str(r#""unverifiable""#).unwrap();
        assert_eq!(o, Outcome::Unverifiable);
        for o in Outcome::ALL {
            assert_eq!(serde_json::to_string(&o).unwrap(), format!("\"{}\"", o.as_str()));
        }
    }

    #[test]
    fn fallback_is_conservative() {
        let v = PredictionVerification::fallback("p", "2024-01-01", Outcome::Unverifiable, "boom");
        assert!(!v.matured);
        assert_eq!(v.confidence_score, 0.0);
        assert!(v.evidence_urls.is_empty());
        let json = serde_json::to_value(&v).unwrap();
        assert!(json.get("key_facts").is_none());
    }

    #[test]
    fn stage_result_parts() {
        let ok: StageResult<u8> = StageResult::Success(1);
        assert!(!ok.is_degraded());
        assert_eq!(ok.into_parts(), (1, None));
        let bad = StageResult::degraded(0u8, "no luck");
        assert_eq!(bad.reason(), Some("no luck"));
        assert_eq!(*bad.value(), 0);
    }
}
