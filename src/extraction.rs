use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::llm::{strip_code_fences, system_user, Llm};
use crate::types::StageResult;

pub const NO_VALID_PREDICTION: &str = "No valid prediction provided";
const MIN_PREDICTION_CHARS: usize = 5;

const EXTRACTION_SYSTEM: &str = "You are an expert at extracting testable claims from predictions. \
Extract the key claims made in the prediction that could be verified with evidence. \
Focus on specific, measurable outcomes rather than vague statements. \
Return ONLY a JSON array of strings, with each string being a single claim.";

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(by|reach)\s+(\d)").expect("static regex"))
}

fn bracket_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]]*)\]").expect("static regex"))
}

/// Puts back the `$` an upstream feed strips from amounts, e.g. "reach 100k" -> "reach $100k".
pub fn normalize_prediction(text: &str) -> String {
    currency_re().replace_all(text, " ${1} $$${2}").into_owned()
}

/// Pulls a list of claims out of a loosely formatted model answer.
pub fn parse_claims(content: &str) -> Option<Vec<String>> {
    let content = content.trim();

    // First pass: take the first bracketed list verbatim and split it on commas.
    if content.contains('[') && content.contains(']') {
        if let Some(inner) = bracket_re().captures(content).and_then(|c| c.get(1)) {
            let claims: Vec<String> = inner
                .as_str()
                .split(',')
                .map(|item| strip_quotes(item.trim()).to_string())
                .filter(|item| !item.is_empty())
                .collect();
            if !claims.is_empty() {
                return Some(claims);
            }
        }
    }

    let cleaned = strip_code_fences(content).replace('\n', " ");
    let parsed: serde_json::Value = serde_json::from_str(cleaned.trim()).ok()?;
    let items = match &parsed {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(obj) => obj.get("claims")?.as_array()?,
        _ => return None,
    };
    let claims: Vec<String> = items
        .iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect();
    (!claims.is_empty()).then_some(claims)
}

fn strip_quotes(item: &str) -> &str {
    let item = item.strip_prefix('"').unwrap_or(item);
    item.strip_suffix('"').unwrap_or(item)
}

/// Splits one prediction into independently verifiable claims.
/// Always returns at least one claim.
pub async fn extract_claims(llm: &dyn Llm, prediction_text: &str) -> StageResult<Vec<String>> {
    if prediction_text.trim().chars().count() < MIN_PREDICTION_CHARS {
        warn!("prediction text is too short or empty");
        return StageResult::degraded(vec![NO_VALID_PREDICTION.to_string()], "prediction text too short");
    }

    let normalized = normalize_prediction(prediction_text);
    debug!(prediction = %normalized, "extracting claims");

    let messages = match system_user(EXTRACTION_SYSTEM, format!("Prediction: {normalized}")) {
        Ok(m) => m,
        Err(e) => return StageResult::degraded(vec![prediction_text.to_string()], format!("prompt build failed: {e}")),
    };

    let content = match llm.complete(messages, None).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "claim extraction call failed, using whole prediction");
            return StageResult::degraded(vec![prediction_text.to_string()], format!("claim extraction failed: {e}"));
        }
    };

    match parse_claims(&content) {
        Some(claims) => {
            info!(count = claims.len(), "extracted claims");
            StageResult::Success(claims)
        }
        None => {
            warn!("could not parse claims from model answer, using normalized prediction");
            StageResult::degraded(vec![normalized], "unparseable claim list")
        }
    }
}
