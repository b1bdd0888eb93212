mod support;

use std::sync::Arc;

use prediction_verifier::{Outcome, PredictionInput, SearchError};
use support::*;
use tokio::time::{Duration, Instant};

fn input(text: &str, date: &str) -> PredictionInput {
    PredictionInput { prediction_text: text.into(), prediction_date: date.into() }
}

#[tokio::test]
async fn high_relevance_evidence_yields_a_confident_verdict() {
    let extract = Arc::new(FakeLlm::answering(r#"["Bitcoin will hit $100k by end of 2025"]"#));
    let analyze = Arc::new(FakeLlm::answering(&verdict_json("correct", 0.9)));
    let url = "https://www.reuters.com/markets/bitcoin-100k";
    let searcher = Arc::new(FakeSearcher::with_results(vec![hit(url, Some(0.97), Some("2024-12-05T10:00:00Z"))]));

    let v = verifier(extract, analyze.clone(), searcher.clone())
        .verify(&input("Bitcoin will hit $100k by end of 2025", "2024-01-01T00:00:00Z"))
        .await;

    assert!(v.evidence_urls.iter().any(|u| u == url));
    assert!(v.confidence_score > 0.0);
    assert_eq!(v.outcome, Outcome::Correct);
    assert_eq!(v.source_text, "Bitcoin will hit $100k by end of 2025");
    assert_eq!(v.prediction_date, "2024-01-01T00:00:00Z");
    assert_eq!(analyze.call_times().len(), 1);
    // verbatim claim plus the keyword-reduced variant
    assert_eq!(searcher.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn unparseable_date_short_circuits_to_pending() {
    let extract = Arc::new(FakeLlm::answering(r#"["Gold above $3000"]"#));
    let analyze = Arc::new(FakeLlm::answering(&verdict_json("correct", 0.9)));
    let searcher = Arc::new(FakeSearcher::with_results(vec![hit("https://ft.com/gold", Some(0.9), None)]));

    let report = verifier(extract, analyze.clone(), searcher.clone())
        .verify_detailed(&input("Gold will reach 3000 this year", "not-a-date"))
        .await;

    let v = &report.verification;
    assert_eq!(v.outcome, Outcome::Pending);
    assert_eq!(v.confidence_score, 0.0);
    assert!(v.evidence_urls.is_empty());
    assert_eq!(report.evidence_count, 0);
    assert!(searcher.requests.lock().unwrap().is_empty());
    assert!(analyze.call_times().is_empty());
    assert!(report.degraded.iter().any(|d| d.starts_with("search:")));
    assert!(report.degraded.iter().any(|d| d.starts_with("analysis:")));
}

#[tokio::test]
async fn genuine_answer_is_not_degraded() {
    let extract = Arc::new(FakeLlm::answering(r#"["ETH above $5k"]"#));
    let analyze = Arc::new(FakeLlm::answering(&verdict_json("incorrect", 0.7)));
    let searcher = Arc::new(FakeSearcher::with_results(vec![hit("https://wsj.com/eth", None, None)]));

    let report = verifier(extract, analyze, searcher)
        .verify_detailed(&input("ETH will reach 5000 by March", "2024-01-01"))
        .await;
    assert!(!report.is_degraded(), "{:?}", report.degraded);
    assert_eq!(report.claims, vec!["ETH above $5k"]);
    assert_eq!(report.verification.outcome, Outcome::Incorrect);
}

#[tokio::test(start_paused = true)]
async fn batch_of_seven_runs_in_chunks_of_five_and_two() {
    let extract = Arc::new(FakeLlm::answering(r#"["some claim"]"#));
    let analyze = Arc::new(FakeLlm::answering(&verdict_json("pending", 0.2)));
    let searcher = Arc::new(FakeSearcher::with_results(vec![hit("https://apnews.com/x", Some(0.5), None)]));
    let inputs: Vec<_> = (0..7).map(|i| input(&format!("prediction number {i}"), "2024-01-01")).collect();

    let start = Instant::now();
    let out = verifier(extract.clone(), analyze, searcher).verify_batch(&inputs).await;

    assert_eq!(out.len(), 7);
    for (i, v) in out.iter().enumerate() {
        assert_eq!(v.source_text, format!("prediction number {i}"));
    }
    let dispatched: Vec<Duration> = extract.call_times().iter().map(|t| *t - start).collect();
    assert_eq!(dispatched.len(), 7);
    assert_eq!(dispatched.iter().filter(|d| **d < Duration::from_millis(10)).count(), 5);
    assert_eq!(
        dispatched
            .iter()
            .filter(|d| **d >= Duration::from_secs(2) && **d < Duration::from_millis(2010))
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn one_failing_item_does_not_sink_its_siblings() {
    let extract = Arc::new(FakeLlm::new(|messages| {
        if user_text(messages).contains("explode") {
            anyhow::bail!("model overloaded");
        }
        Ok(r#"["claim"]"#.to_string())
    }));
    let analyze = Arc::new(FakeLlm::new(|messages| {
        if user_text(messages).contains("explode") {
            anyhow::bail!("model overloaded");
        }
        Ok(verdict_json("partially_correct", 0.6))
    }));
    let searcher = Arc::new(FakeSearcher::with_results(vec![hit("https://bbc.com/n", Some(0.8), None)]));
    let inputs = vec![
        input("Inflation falls below 3% within 6 months", "2024-01-01"),
        input("This one will explode the model", "2024-01-01"),
        input("Rates are cut twice this year", "2024-01-01"),
    ];

    let out = verifier(extract, analyze, searcher).verify_batch(&inputs).await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].outcome, Outcome::PartiallyCorrect);
    assert_eq!(out[1].outcome, Outcome::Unverifiable);
    assert_eq!(out[1].confidence_score, 0.0);
    assert!(out[1].evidence_text.contains("model overloaded"));
    assert_eq!(out[2].outcome, Outcome::PartiallyCorrect);
}

#[tokio::test(start_paused = true)]
async fn search_outage_degrades_to_pending() {
    let extract = Arc::new(FakeLlm::answering(r#"["claim one", "claim two"]"#));
    let analyze = Arc::new(FakeLlm::answering(&verdict_json("correct", 0.9)));
    let searcher = Arc::new(FakeSearcher::failing(SearchError::RateLimited));

    let start = Instant::now();
    let report = verifier(extract, analyze, searcher.clone())
        .verify_detailed(&input("Two claims in one prediction", "2024-01-01"))
        .await;

    assert_eq!(report.verification.outcome, Outcome::Pending);
    assert_eq!(report.verification.confidence_score, 0.0);
    // 2 claims x 2 query variants x 3 attempts, all variants backing off concurrently
    assert_eq!(searcher.requests.lock().unwrap().len(), 12);
    assert!(start.elapsed() < Duration::from_secs(7));
}
