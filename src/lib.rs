pub mod config;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod tavily;
pub mod types;
pub mod verification;

pub use config::{BatchConfig, LlmConfig, SearchConfig, VerifierConfig};
pub use error::{ConfigError, SearchError};
pub use pipeline::{PredictionVerifier, VerificationReport};
pub use types::{Evidence, Outcome, PredictionInput, PredictionVerification, StageResult};
