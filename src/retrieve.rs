use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::tavily::{SearchHit, SearchRequest, Searcher, TimeRange};
use crate::types::{Evidence, StageResult};

/// Source label for hits whose URL has no parseable host.
pub const UNKNOWN_SOURCE: &str = "Tavily Search";

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "will", "with", "that", "this", "from", "into", "than", "then",
    "are", "was", "were", "been", "being", "has", "have", "had", "does", "did", "not",
    "but", "its", "our", "your", "their", "they", "them", "these", "those", "there",
    "what", "which", "who", "whom", "when", "where", "why", "how", "would", "could",
    "should", "can", "may", "might", "must", "shall", "about", "over", "under", "before",
    "after", "during", "between", "more", "most", "less", "some", "any", "all", "each",
    "very", "just", "also", "only", "such", "own", "same", "other", "too", "out", "off",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y"];

/// Parses a caller-supplied reference date. Accepts RFC 3339, RFC 2822, timestamps
/// like `YYYY-MM-DD HH:MM[:SS]` and common calendar dates (`2024/01/01`, `01/15/2024`,
/// `Jan 1, 2024`, `1 January 2024`). Zone-less values are taken as UTC.
pub fn parse_reference_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Buckets the age of the reference date into the search capability's recency hint.
pub fn time_range_for(reference: DateTime<Utc>, now: DateTime<Utc>) -> TimeRange {
    match (now - reference).num_days() {
        d if d <= 7 => TimeRange::Week,
        d if d <= 30 => TimeRange::Month,
        _ => TimeRange::Year,
    }
}

/// Reduces a claim to at most five of its longest distinctive words. A word repeated
/// in the claim counts once, so the five slots always hold five different words.
pub fn keyword_query(claim: &str) -> Option<String> {
    let cleaned: String = claim
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    let mut seen = HashSet::new();
    let mut words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(*w))
        .collect();
    // stable: equal lengths keep first-seen order
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    words.truncate(5);

    (!words.is_empty()).then(|| words.join(" "))
}

/// Delay before retry number `attempt + 1`: 2s, 4s, 8s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Converts one ranked hit into evidence. Hits without a score are ranked by position.
pub fn hit_to_evidence(hit: SearchHit, rank: usize, count: usize, now: DateTime<Utc>) -> Evidence {
    let positional = 1.0 - rank as f64 / count.max(1) as f64;
    let relevance = hit.score.filter(|s| s.is_finite()).unwrap_or(positional).clamp(0.0, 1.0);
    let source = Url::parse(&hit.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
    // No publish date means "now"; downstream temporal reasoning inherits that imprecision.
    let date = hit.published_date.as_deref().and_then(parse_published_date).unwrap_or(now);

    Evidence {
        source,
        title: if hit.title.is_empty() { "No title".into() } else { hit.title },
        url: hit.url,
        date,
        snippet: if hit.content.is_empty() { "No content available".into() } else { hit.content },
        relevance_score: Some(relevance),
        raw_content: hit.raw_content,
    }
}

/// Runs one query with bounded retries. Every attempt is capped by the configured timeout.
pub async fn search_with_retry(
    searcher: &dyn Searcher,
    req: &SearchRequest,
    cfg: &SearchConfig,
) -> Result<Vec<SearchHit>, SearchError> {
    let attempts = cfg.max_attempts.max(1);
    let mut last_err = SearchError::Timeout;
    for attempt in 1..=attempts {
        let result = match timeout(cfg.attempt_timeout, searcher.search(req)).await {
            Ok(r) => r,
            Err(_) => Err(SearchError::Timeout),
        };
        match result {
            Ok(hits) => return Ok(hits),
            Err(e) => {
                if attempt < attempts {
                    let delay = backoff_delay(attempt);
                    if e.is_rate_limited() {
                        warn!(query = %req.query, attempt, delay_secs = delay.as_secs(), "rate limited, backing off");
                    } else {
                        warn!(query = %req.query, attempt, delay_secs = delay.as_secs(), error = %e, "search failed, retrying");
                    }
                    sleep(delay).await;
                }
                last_err = e;
            }
        }
    }
    error!(query = %req.query, attempts, error = %last_err, "search retries exhausted");
    Err(last_err)
}

async fn run_variant(
    searcher: &dyn Searcher,
    cfg: &SearchConfig,
    query: String,
    time_range: TimeRange,
    now: DateTime<Utc>,
) -> Result<Vec<Evidence>, SearchError> {
    let req = SearchRequest::new(query, time_range, cfg);
    let mut hits = search_with_retry(searcher, &req, cfg).await?;
    hits.retain(|h| !h.url.trim().is_empty());
    let count = hits.len();
    Ok(hits
        .into_iter()
        .enumerate()
        .map(|(rank, hit)| hit_to_evidence(hit, rank, count, now))
        .collect())
}

/// Concatenates lists, keeping the first item seen for each url.
pub fn merge_unique(lists: impl IntoIterator<Item = Vec<Evidence>>) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in lists.into_iter().flatten() {
        if seen.insert(item.url.clone()) {
            out.push(item);
        }
    }
    out
}

struct ClaimSearch {
    evidence: Vec<Evidence>,
    queries: usize,
    failed: usize,
}

async fn search_claim(
    searcher: &dyn Searcher,
    cfg: &SearchConfig,
    claim: &str,
    time_range: TimeRange,
    now: DateTime<Utc>,
) -> ClaimSearch {
    let keywords = keyword_query(claim);
    debug!(claim, keywords = keywords.as_deref().unwrap_or(""), "searching claim");

    let verbatim = run_variant(searcher, cfg, claim.to_string(), time_range, now);
    let reduced = async {
        match keywords {
            Some(q) => Some(run_variant(searcher, cfg, q, time_range, now).await),
            None => None,
        }
    };
    let (verbatim, reduced) = tokio::join!(verbatim, reduced);

    let mut lists = Vec::with_capacity(2);
    let mut queries = 0;
    let mut failed = 0;
    for result in std::iter::once(verbatim).chain(reduced) {
        queries += 1;
        match result {
            Ok(items) => lists.push(items),
            Err(_) => failed += 1, // already logged by the retry loop
        }
    }
    ClaimSearch { evidence: merge_unique(lists), queries, failed }
}

/// Gathers evidence for every claim, newest-relevant first.
pub async fn search_evidence(
    searcher: &dyn Searcher,
    cfg: &SearchConfig,
    claims: &[String],
    prediction_date: &str,
) -> StageResult<Vec<Evidence>> {
    search_evidence_at(searcher, cfg, claims, prediction_date, Utc::now()).await
}

pub async fn search_evidence_at(
    searcher: &dyn Searcher,
    cfg: &SearchConfig,
    claims: &[String],
    prediction_date: &str,
    now: DateTime<Utc>,
) -> StageResult<Vec<Evidence>> {
    let Some(reference) = parse_reference_date(prediction_date) else {
        warn!(prediction_date, "invalid prediction date, skipping search");
        return StageResult::degraded(Vec::new(), format!("invalid prediction date: {prediction_date}"));
    };
    let time_range = time_range_for(reference, now);
    info!(claims = claims.len(), ?time_range, "searching for evidence");

    let per_claim = join_all(
        claims.iter().map(|c| search_claim(searcher, cfg, c, time_range, now)),
    )
    .await;

    let queries: usize = per_claim.iter().map(|c| c.queries).sum();
    let failed: usize = per_claim.iter().map(|c| c.failed).sum();
    let mut all: Vec<Evidence> = per_claim.into_iter().flat_map(|c| c.evidence).collect();
    all.sort_by(|a, b| b.relevance().total_cmp(&a.relevance()));

    info!(items = all.len(), failed_queries = failed, "evidence search finished");
    if failed > 0 {
        StageResult::degraded(all, format!("{failed} of {queries} search queries failed"))
    } else {
        StageResult::Success(all)
    }
}
