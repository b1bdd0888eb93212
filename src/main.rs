use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prediction_verifier::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prediction-verifier", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,
    /// OpenAI-compatible endpoint; defaults to api.openai.com
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    openai_base_url: Option<String>,
    #[arg(long, env = "EXTRACT_MODEL", default_value = "gpt-4o-mini", global = true)]
    extract_model: String,
    #[arg(long, env = "ANALYSIS_MODEL", default_value = "gpt-4o", global = true)]
    analysis_model: String,
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true, global = true)]
    tavily_api_key: Option<String>,
    #[arg(long, env = "TAVILY_ENDPOINT", default_value = "https://api.tavily.com/search", global = true)]
    tavily_endpoint: String,
    /// Client-side cap on search requests per second
    #[arg(long, default_value_t = 5, global = true)]
    search_qps: u32,
    #[arg(long, default_value_t = 5, global = true)]
    batch_size: usize,
    #[arg(long, default_value_t = 2000, global = true)]
    batch_pause_ms: u64,
}

#[derive(Subcommand)]
enum Cmd {
    /// Verify one prediction and print the record as JSON
    Verify { #[arg(long)] text: String, #[arg(long)] date: String },
    /// Verify a JSONL file of {prediction_text, prediction_date} records
    Batch { #[arg(long)] input_file: String, #[arg(long)] output_file: Option<String> },
    /// Serve the HTTP API
    Serve { #[arg(long, default_value = "0.0.0.0:8080")] addr: String },
}

impl Cli {
    fn config(&self) -> VerifierConfig {
        VerifierConfig {
            llm: LlmConfig {
                api_key: self.openai_api_key.clone(),
                base_url: self.openai_base_url.clone(),
                extract_model: self.extract_model.clone(),
                analysis_model: self.analysis_model.clone(),
            },
            search: SearchConfig {
                api_key: self.tavily_api_key.clone(),
                endpoint: self.tavily_endpoint.clone(),
                requests_per_second: self.search_qps,
                ..SearchConfig::default()
            },
            batch: BatchConfig {
                chunk_size: self.batch_size,
                chunk_pause: Duration::from_millis(self.batch_pause_ms),
            },
        }
    }
}

fn read_inputs(raw: &str) -> Result<Vec<PredictionInput>> {
    raw.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| serde_json::from_str(l).with_context(|| format!("line {}: invalid record", i + 1)))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let verifier = PredictionVerifier::from_config(cli.config())?;

    match cli.cmd {
        Cmd::Verify { text, date } => {
            let input = PredictionInput { prediction_text: text, prediction_date: date };
            let out = verifier.verify(&input).await;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Cmd::Batch { input_file, output_file } => {
            let raw = tokio::fs::read_to_string(&input_file)
                .await
                .with_context(|| format!("reading {input_file}"))?;
            let inputs = read_inputs(&raw)?;
            let results = verifier.verify_batch(&inputs).await;
            let mut lines = Vec::with_capacity(results.len());
            for r in &results {
                lines.push(serde_json::to_string(r)?);
            }
            let body = lines.join("\n") + "\n";
            match output_file {
                Some(path) => tokio::fs::write(&path, body).await.with_context(|| format!("writing {path}"))?,
                None => print!("{body}"),
            }
        }
        Cmd::Serve { addr } => prediction_verifier::server::run_server(verifier, &addr).await?,
    }
    Ok(())
}
